//! Block render pass over the signal graph.
//!
//! Renders interleaved stereo f32: per channel, mix playing sources into a
//! scratch buffer, run the node chain, then accumulate into the output under
//! the per-frame `volume × gate` level (zero while hard-muted). The master
//! volume applies per frame at the end. Reverb params are automation targets
//! only; the render pass carries no reverb tail.

use crate::graph::{ChannelId, SignalGraph, SourceHandle};
use ringbuf::traits::Producer as _;

/// Post-fade level measurement for one channel (or the master when `channel`
/// is `None`), taken over one rendered block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterFrame {
    pub channel: Option<ChannelId>,
    pub peak: f32,
    pub rms: f32,
}

/// Outcome of one rendered block.
#[derive(Debug, Default)]
pub struct MixResult {
    /// Most frames contributed by any single source this block
    pub frames_filled: usize,
    /// Sources that reached the end of a play-once pass and were released
    pub completed_sources: Vec<SourceHandle>,
    /// Sources that wrapped around this block, with their total loop count
    pub looped_sources: Vec<(SourceHandle, u32)>,
    /// Sources released because a stop fade finished
    pub stopped_sources: Vec<SourceHandle>,
}

/// Renders one block into `out` and advances the graph clock.
pub(crate) fn render_block(graph: &mut SignalGraph, out: &mut [f32]) -> MixResult {
    out.fill(0.0);
    let frames = out.len() / 2;
    if frames == 0 {
        return MixResult::default();
    }

    let SignalGraph {
        clock,
        channels,
        nodes,
        instances,
        scratch,
        master_volume,
        reverb_mix,
        reverb_absorption,
        meter_producer,
        ..
    } = graph;

    let block_start = clock.frame();
    let sample_rate = clock.sample_rate();
    scratch.resize(frames * 2, 0.0);

    let mut meters: Vec<MeterFrame> = Vec::with_capacity(channels.len() + 1);
    let mut frames_filled = 0usize;

    for channel in channels.iter_mut() {
        scratch.fill(0.0);
        for handle in &channel.sources {
            if let Some(instance) = instances.get_mut(handle) {
                let mixed = instance.mix_into(scratch, block_start);
                frames_filled = frames_filled.max(mixed);
            }
        }

        // The chain always runs so filter state keeps decaying over silence.
        for node_id in channel.active_chain() {
            if let Some(node) = nodes.get_mut(&node_id) {
                node.process(scratch, block_start, sample_rate);
            }
        }

        let mut peak = 0.0f32;
        let mut square_sum = 0.0f64;
        if !channel.muted {
            for frame_idx in 0..frames {
                let frame = block_start + frame_idx as u64;
                let level = channel.volume.value_at(frame) * channel.gate.value_at(frame);
                for side in 0..2 {
                    let idx = frame_idx * 2 + side;
                    let contribution = scratch[idx] * level;
                    out[idx] += contribution;
                    peak = peak.max(contribution.abs());
                    square_sum += f64::from(contribution) * f64::from(contribution);
                }
            }
        }
        meters.push(MeterFrame {
            channel: Some(channel.id),
            peak,
            rms: (square_sum / (frames * 2) as f64).sqrt() as f32,
        });
    }

    // Master stage
    let mut peak = 0.0f32;
    let mut square_sum = 0.0f64;
    for frame_idx in 0..frames {
        let level = master_volume.value_at(block_start + frame_idx as u64);
        for side in 0..2 {
            let idx = frame_idx * 2 + side;
            out[idx] *= level;
            peak = peak.max(out[idx].abs());
            square_sum += f64::from(out[idx]) * f64::from(out[idx]);
        }
    }
    meters.push(MeterFrame {
        channel: None,
        peak,
        rms: (square_sum / (frames * 2) as f64).sqrt() as f32,
    });

    if let Some(producer) = meter_producer.as_mut() {
        for meter in meters {
            // Dropped silently when full; the poll loop decides how often to drain.
            let _ = producer.try_push(meter);
        }
    }

    clock.advance(frames as u64);
    let now = clock.frame();

    master_volume.settle(now);
    reverb_mix.settle(now);
    reverb_absorption.settle(now);
    for node in nodes.values_mut() {
        node.settle(now);
    }
    for channel in channels.iter_mut() {
        channel.volume.settle(now);
        channel.gate.settle(now);
    }

    let mut completed_sources = Vec::new();
    let mut looped_sources = Vec::new();
    let mut stopped_sources = Vec::new();

    for (handle, instance) in instances.iter_mut() {
        instance.gain.settle(now);
        if instance.take_loop_flag() {
            looped_sources.push((*handle, instance.loop_count));
        }
    }

    instances.retain(|handle, instance| {
        if let Some(remove_at) = instance.remove_at_frame {
            if now >= remove_at {
                stopped_sources.push(*handle);
                return false;
            }
        }
        if instance.take_end_flag() {
            completed_sources.push(*handle);
            return false;
        }
        true
    });

    if !completed_sources.is_empty() || !stopped_sources.is_empty() {
        for channel in channels.iter_mut() {
            channel
                .sources
                .retain(|handle| instances.contains_key(handle));
        }
        log::debug!(
            "Render released {} completed, {} stopped sources",
            completed_sources.len(),
            stopped_sources.len()
        );
    }

    MixResult {
        frames_filled,
        completed_sources,
        looped_sources,
        stopped_sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_data::MeadowSonicAudioData;
    use crate::config::MixOptions;
    use crate::graph::{ChainSpec, ParamTarget};
    use crate::playback::LoopMode;
    use ringbuf::HeapRb;
    use ringbuf::traits::{Consumer as _, Split};
    use std::sync::Arc;

    const CENTER: f32 = std::f32::consts::FRAC_1_SQRT_2;

    fn ones(frames: usize) -> Arc<MeadowSonicAudioData> {
        MeadowSonicAudioData::from_mono(vec![1.0; frames], 48_000).unwrap()
    }

    #[test]
    fn test_channel_pipeline_levels() {
        let mut graph = SignalGraph::new(48_000, 8, 1.0).unwrap();
        let channel = graph.create_channel("music", ChainSpec::gain(0.5)).unwrap();
        graph.set_parameter(ParamTarget::ChannelVolume(channel), 0.8, 0.0);
        graph
            .connect_source(
                ones(1024),
                channel,
                MixOptions::default().with_loop(LoopMode::Infinite),
            )
            .unwrap();

        let mut out = vec![0.0f32; 64];
        graph.render_block(&mut out);

        // mono fan-out (equal power) × gain node × channel volume
        let expected = CENTER * 0.5 * 0.8;
        assert!((out[0] - expected).abs() < 1e-4);
        assert!((out[1] - expected).abs() < 1e-4);
    }

    #[test]
    fn test_mute_zeroes_contribution_and_restores_exactly() {
        let mut graph = SignalGraph::new(48_000, 8, 1.0).unwrap();
        let channel = graph.create_channel("music", ChainSpec::empty()).unwrap();
        graph.set_parameter(ParamTarget::ChannelVolume(channel), 0.6, 0.0);
        graph
            .connect_source(
                ones(48_000),
                channel,
                MixOptions::default().with_loop(LoopMode::Infinite),
            )
            .unwrap();

        let mut out = vec![0.0f32; 32];
        graph.render_block(&mut out);
        let before = out[0];
        assert!(before > 0.0);

        graph.mute(channel, true);
        graph.render_block(&mut out);
        assert!(out.iter().all(|sample| *sample == 0.0));

        graph.mute(channel, false);
        graph.render_block(&mut out);
        assert!((out[0] - before).abs() < 1e-6);
        assert_eq!(
            graph.parameter_value(ParamTarget::ChannelVolume(channel)),
            Some(0.6)
        );
    }

    #[test]
    fn test_master_volume_scales_output() {
        let mut graph = SignalGraph::new(48_000, 8, 0.5).unwrap();
        let channel = graph.create_channel("sfx", ChainSpec::empty()).unwrap();
        graph
            .connect_source(
                ones(1024),
                channel,
                MixOptions::default().with_loop(LoopMode::Infinite),
            )
            .unwrap();

        let mut out = vec![0.0f32; 16];
        graph.render_block(&mut out);
        assert!((out[0] - CENTER * 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_completed_source_reported_and_released() {
        let mut graph = SignalGraph::new(48_000, 8, 1.0).unwrap();
        let channel = graph.create_channel("voice", ChainSpec::empty()).unwrap();
        let handle = graph
            .connect_source(ones(10), channel, MixOptions::default())
            .unwrap();

        let mut out = vec![0.0f32; 64];
        let result = graph.render_block(&mut out);

        assert_eq!(result.frames_filled, 10);
        assert_eq!(result.completed_sources, vec![handle]);
        assert!(!graph.is_active(handle));
        assert!(!graph.channel(channel).unwrap().has_sources());
    }

    #[test]
    fn test_looped_source_reported_with_count() {
        let mut graph = SignalGraph::new(48_000, 8, 1.0).unwrap();
        let channel = graph.create_channel("music", ChainSpec::empty()).unwrap();
        let handle = graph
            .connect_source(
                ones(3),
                channel,
                MixOptions::default().with_loop(LoopMode::Infinite),
            )
            .unwrap();

        let mut out = vec![0.0f32; 16]; // 8 frames: wraps twice
        let result = graph.render_block(&mut out);
        assert_eq!(result.looped_sources, vec![(handle, 2)]);
        assert!(graph.is_active(handle));
    }

    #[test]
    fn test_meter_frames_after_rendering() {
        let mut graph = SignalGraph::new(48_000, 8, 1.0).unwrap();
        let channel = graph.create_channel("music", ChainSpec::empty()).unwrap();
        graph
            .connect_source(
                ones(1024),
                channel,
                MixOptions::default().with_loop(LoopMode::Infinite),
            )
            .unwrap();

        let ring = HeapRb::<MeterFrame>::new(64);
        let (producer, mut consumer) = ring.split();
        graph.set_meter_producer(producer);

        let mut out = vec![0.0f32; 128];
        graph.render_block(&mut out);

        let frames: Vec<MeterFrame> = std::iter::from_fn(|| consumer.try_pop()).collect();
        // one per channel plus the master
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].channel, Some(channel));
        assert!(frames[0].peak > 0.0);
        assert!(frames[0].rms > 0.0);
        assert_eq!(frames[1].channel, None);
        assert!(frames[1].peak > 0.0);
    }

    #[test]
    fn test_effects_toggle_keeps_sources_playing() {
        let mut graph = SignalGraph::new(48_000, 8, 1.0).unwrap();
        let channel = graph
            .create_channel("music", ChainSpec::empty().with_standard_effects())
            .unwrap();
        let handle = graph
            .connect_source(
                ones(48_000),
                channel,
                MixOptions::default().with_loop(LoopMode::Infinite),
            )
            .unwrap();

        let mut out = vec![0.0f32; 32];
        graph.render_block(&mut out);
        graph.set_effects_enabled(channel, false);
        graph.render_block(&mut out);

        assert!(graph.is_active(handle));
        assert!(out[0] > 0.0);
    }
}
