//! Playback state for connected sources.
//!
//! A [`PlaybackInstance`] is the render-side record of one source connected to
//! a channel: the shared audio buffer, a frame cursor, the per-source gain
//! [`Param`] and the spatial gain/pan the scene last pushed. Instances live
//! inside the [`SignalGraph`](crate::graph::SignalGraph) and are only touched
//! from the render path.

use crate::audio_data::MeadowSonicAudioData;
use crate::config::MixOptions;
use crate::graph::node::Param;
use crate::graph::{ChannelId, SourceHandle};
use std::sync::Arc;

/// Loop mode for audio playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Play once, then complete
    Once,
    /// Restart from the beginning at the end of each pass
    Infinite,
}

impl Default for LoopMode {
    fn default() -> Self {
        Self::Once
    }
}

/// Current playback state of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Stopped,
}

/// One playing source: buffer, cursor, gain and spatial contribution.
#[derive(Debug)]
pub struct PlaybackInstance {
    pub handle: SourceHandle,
    pub channel: ChannelId,
    pub audio_data: Arc<MeadowSonicAudioData>,
    /// Per-source gain; fade-ins and stop fades ramp this param.
    pub gain: Param,
    pub loop_mode: LoopMode,
    pub state: PlayState,
    /// Frame cursor into the buffer
    pub cursor: usize,
    pub loop_count: u32,
    /// Whether the spatial scene positions this source
    pub spatial: bool,
    /// Distance gain last pushed by the spatial scene (1.0 when non-spatial)
    pub spatial_gain: f32,
    /// Lateral pan in `[-1, 1]`; 0 is center
    pub spatial_pan: f32,
    /// Frame at which a stop fade completes and the instance is released
    pub(crate) remove_at_frame: Option<u64>,
    pub(crate) reached_end: bool,
    pub(crate) looped_this_block: bool,
}

impl PlaybackInstance {
    pub fn new(
        handle: SourceHandle,
        channel: ChannelId,
        audio_data: Arc<MeadowSonicAudioData>,
        options: &MixOptions,
        now_frame: u64,
        sample_rate: u32,
    ) -> Self {
        let mut gain = Param::new(options.volume);
        if options.fade_in > 0.0 {
            let fade_frames = (options.fade_in * sample_rate as f64).round() as u64;
            gain.set(0.0);
            gain.ramp_to(options.volume, now_frame, now_frame + fade_frames);
        }

        Self {
            handle,
            channel,
            audio_data,
            gain,
            loop_mode: options.loop_mode,
            state: PlayState::Playing,
            cursor: 0,
            loop_count: 0,
            spatial: options.spatial,
            spatial_gain: 1.0,
            spatial_pan: 0.0,
            remove_at_frame: None,
            reached_end: false,
            looped_this_block: false,
        }
    }

    /// Mixes this source into an interleaved stereo buffer.
    ///
    /// `block_start` is the audio-clock frame of the first output frame, used
    /// to evaluate the gain param per frame. Mono buffers fan out through an
    /// equal-power pan; stereo buffers pass through with pan ignored.
    ///
    /// Returns the number of frames mixed.
    pub fn mix_into(&mut self, out: &mut [f32], block_start: u64) -> usize {
        if self.state != PlayState::Playing {
            return 0;
        }

        let samples = self.audio_data.samples();
        let total_frames = self.audio_data.total_frames();
        if total_frames == 0 {
            self.state = PlayState::Stopped;
            self.reached_end = true;
            return 0;
        }

        let src_channels = self.audio_data.channels() as usize;
        let frame_count = out.len() / 2;
        let (pan_left, pan_right) = equal_power_pan(self.spatial_pan);
        let mut frames_mixed = 0;

        for frame_idx in 0..frame_count {
            if self.cursor >= total_frames {
                match self.loop_mode {
                    LoopMode::Infinite => {
                        self.cursor = 0;
                        self.loop_count += 1;
                        self.looped_this_block = true;
                    }
                    LoopMode::Once => {
                        self.reached_end = true;
                        self.state = PlayState::Stopped;
                        break;
                    }
                }
            }

            let gain = self.gain.value_at(block_start + frame_idx as u64) * self.spatial_gain;
            let base = self.cursor * src_channels;
            let (left, right) = if src_channels == 1 {
                let sample = samples[base];
                (sample * pan_left, sample * pan_right)
            } else {
                (samples[base], samples[base + 1])
            };

            out[frame_idx * 2] += left * gain;
            out[frame_idx * 2 + 1] += right * gain;

            self.cursor += 1;
            frames_mixed += 1;
        }

        // A pass that lands exactly on the end flags completion now rather
        // than on the next (empty) mix.
        if self.cursor >= total_frames && self.loop_mode == LoopMode::Once {
            self.reached_end = true;
            self.state = PlayState::Stopped;
        }

        frames_mixed
    }

    /// Returns and clears the end-of-buffer flag (set once per completion).
    pub fn take_end_flag(&mut self) -> bool {
        std::mem::take(&mut self.reached_end)
    }

    /// Returns and clears the looped-this-block flag.
    pub fn take_loop_flag(&mut self) -> bool {
        std::mem::take(&mut self.looped_this_block)
    }

    pub fn is_finished(&self) -> bool {
        self.state == PlayState::Stopped
    }
}

/// Equal-power pan law: `pan` in `[-1, 1]` maps to left/right gains whose
/// squares sum to one.
pub fn equal_power_pan(pan: f32) -> (f32, f32) {
    let pan = pan.clamp(-1.0, 1.0);
    let angle = (pan + 1.0) * std::f32::consts::FRAC_PI_4;
    (angle.cos(), angle.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ChannelId, SourceHandle};

    fn mono_instance(samples: Vec<f32>, options: MixOptions) -> PlaybackInstance {
        let audio = MeadowSonicAudioData::from_mono(samples, 48_000).unwrap();
        PlaybackInstance::new(
            SourceHandle::from_raw(1),
            ChannelId::from_raw(0),
            audio,
            &options,
            0,
            48_000,
        )
    }

    #[test]
    fn test_mono_fans_out_equal_power() {
        let mut instance = mono_instance(vec![1.0; 4], MixOptions::default());
        let mut out = vec![0.0f32; 8];
        let mixed = instance.mix_into(&mut out, 0);

        assert_eq!(mixed, 4);
        let center = std::f32::consts::FRAC_1_SQRT_2;
        assert!((out[0] - center).abs() < 1e-6);
        assert!((out[1] - center).abs() < 1e-6);
    }

    #[test]
    fn test_once_mode_completes_at_end() {
        let mut instance = mono_instance(vec![0.5; 3], MixOptions::default());
        let mut out = vec![0.0f32; 16];
        let mixed = instance.mix_into(&mut out, 0);

        assert_eq!(mixed, 3);
        assert!(instance.is_finished());
        assert!(instance.take_end_flag());
        assert!(!instance.take_end_flag());
    }

    #[test]
    fn test_infinite_mode_wraps_and_counts() {
        let mut instance =
            mono_instance(vec![0.5; 3], MixOptions::default().with_loop(LoopMode::Infinite));
        let mut out = vec![0.0f32; 16]; // 8 frames over a 3-frame buffer
        let mixed = instance.mix_into(&mut out, 0);

        assert_eq!(mixed, 8);
        assert!(!instance.is_finished());
        assert_eq!(instance.loop_count, 2);
        assert!(instance.take_loop_flag());
    }

    #[test]
    fn test_fade_in_starts_silent() {
        let options = MixOptions::default().with_fade_in(1.0);
        let instance = mono_instance(vec![1.0; 48_000], options);
        assert_eq!(instance.gain.value_at(0), 0.0);
        assert!((instance.gain.value_at(48_000) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_pan_extremes() {
        let (left, right) = equal_power_pan(-1.0);
        assert!((left - 1.0).abs() < 1e-6);
        assert!(right.abs() < 1e-6);

        let (left, right) = equal_power_pan(1.0);
        assert!(left.abs() < 1e-6);
        assert!((right - 1.0).abs() < 1e-6);
    }
}
