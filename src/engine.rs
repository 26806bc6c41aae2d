//! Engine facade.
//!
//! [`MeadowSonicEngine`] owns the signal graph behind an `Arc<Mutex<_>>`
//! shared with the audio callback, plus the spatial scene, the music
//! director, the encoding controller and the event bus. The callback only
//! ever try-locks the graph and emits silence when it loses the race; every
//! other component runs on the caller's thread through
//! [`update`](MeadowSonicEngine::update).

use crate::audio_data::MeadowSonicAudioData;
use crate::config::{MeadowSonicEngineDesc, MixOptions};
use crate::director::{
    ContextEvent, ContextUpdate, MusicDirector, MusicLayer, MusicState, MusicStateSnapshot,
};
use crate::encoder::{
    EncodeOptions, EncodeTicket, EncodingController, EncodingStats, NetworkConditions,
};
use crate::error::{MeadowSonicError, Result};
use crate::events::{EventBus, EventTopic, MeadowSonicEvent};
use crate::graph::{ChainSpec, ChannelId, ParamTarget, SignalGraph, SourceHandle};
use crate::math::{Pose, Vec3};
use crate::mixer::{MeterFrame, MixResult};
use crate::spatial::{EnvironmentPreset, SpatialScene, SpatialSourceId};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::Receiver;
use ringbuf::traits::{Consumer as _, Split};
use ringbuf::{HeapCons, HeapRb};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Capacity of the meter ring shared with the render path. Frames beyond
/// this are dropped until the poll loop drains.
const METER_RING_CAPACITY: usize = 256;

/// Channel ids of the lanes every engine creates at construction.
///
/// The six music layer lanes are bound to the director and reachable by
/// name (`music-ambient` through `music-traditional`).
#[derive(Debug, Clone, Copy)]
pub struct StandardChannels {
    pub music: ChannelId,
    pub sfx: ChannelId,
    pub voice: ChannelId,
    pub ambient: ChannelId,
}

pub struct MeadowSonicEngine {
    desc: MeadowSonicEngineDesc,
    graph: Arc<Mutex<SignalGraph>>,
    scene: SpatialScene,
    director: MusicDirector,
    encoder: EncodingController,
    events: Arc<EventBus>,
    /// Engine-owned playback subscription; drives spatial scene cleanup
    playback_rx: Receiver<MeadowSonicEvent>,
    meter_consumer: HeapCons<MeterFrame>,
    /// Latest level per channel (`None` keys the master bus)
    meters: HashMap<Option<ChannelId>, MeterFrame>,
    channels: StandardChannels,
    stream: Option<cpal::Stream>,
    is_running: Arc<AtomicBool>,
    shut_down: bool,
}

impl MeadowSonicEngine {
    /// Builds an engine from a validated descriptor and creates the
    /// standard channels: `music`, one lane per music layer, `sfx`, `voice`
    /// and `ambient`.
    pub fn new(desc: MeadowSonicEngineDesc) -> Result<Self> {
        desc.validate()?;

        let events = Arc::new(EventBus::new());
        let mut graph = SignalGraph::new(desc.sample_rate, desc.max_sources, desc.master_volume)?;

        let music = graph.create_channel("music", ChainSpec::empty().with_standard_effects())?;
        let mut director = MusicDirector::new(&desc.adaptation, events.clone());
        for layer in MusicLayer::ALL {
            let channel = graph.create_channel(layer.channel_name(), ChainSpec::empty())?;
            director.bind_layer_channel(layer, channel);
        }
        director.sync_layer_volumes(&mut graph);
        let sfx = graph.create_channel("sfx", ChainSpec::empty())?;
        let voice = graph.create_channel("voice", ChainSpec::empty())?;
        let ambient = graph.create_channel("ambient", ChainSpec::empty())?;

        let ring = HeapRb::<MeterFrame>::new(METER_RING_CAPACITY);
        let (producer, consumer) = ring.split();
        graph.set_meter_producer(producer);

        let scene = SpatialScene::new(desc.attenuation);
        let encoder = EncodingController::new(&desc.encoding, events.clone());
        let playback_rx = events.subscribe(EventTopic::Playback);

        log::info!(
            "Engine created: {} Hz, block size {}, {} channels",
            desc.sample_rate,
            desc.block_size,
            graph.channel_count()
        );

        Ok(Self {
            desc,
            graph: Arc::new(Mutex::new(graph)),
            scene,
            director,
            encoder,
            events,
            playback_rx,
            meter_consumer: consumer,
            meters: HashMap::new(),
            channels: StandardChannels {
                music,
                sfx,
                voice,
                ambient,
            },
            stream: None,
            is_running: Arc::new(AtomicBool::new(false)),
            shut_down: false,
        })
    }

    pub fn config(&self) -> &MeadowSonicEngineDesc {
        &self.desc
    }

    pub fn standard_channels(&self) -> StandardChannels {
        self.channels
    }

    /// Registers a subscriber for one event topic.
    pub fn subscribe(&self, topic: EventTopic) -> Receiver<MeadowSonicEvent> {
        self.events.subscribe(topic)
    }

    /// Opens the default output device and starts the render stream.
    /// Idempotent while running.
    pub fn start(&mut self) -> Result<()> {
        if self.shut_down {
            return Err(MeadowSonicError::Engine(
                "Engine has been shut down".to_string(),
            ));
        }
        if self.is_running.load(Ordering::Relaxed) {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            MeadowSonicError::AudioDevice("No default output device available".to_string())
        })?;

        let config = cpal::StreamConfig {
            channels: self.desc.channels,
            sample_rate: cpal::SampleRate(self.desc.sample_rate),
            buffer_size: cpal::BufferSize::Fixed(self.desc.block_size as u32),
        };

        let default_config = device.default_output_config().map_err(|e| {
            MeadowSonicError::AudioDevice(format!("Failed to get default config: {}", e))
        })?;

        let stream = match default_config.sample_format() {
            cpal::SampleFormat::F32 => self.create_stream::<f32>(&device, &config)?,
            cpal::SampleFormat::I16 => self.create_stream::<i16>(&device, &config)?,
            cpal::SampleFormat::U16 => self.create_stream::<u16>(&device, &config)?,
            _ => {
                return Err(MeadowSonicError::AudioFormat(
                    "Unsupported sample format".to_string(),
                ));
            }
        };

        stream.play().map_err(|e| {
            MeadowSonicError::AudioDevice(format!("Failed to start stream: {}", e))
        })?;

        self.stream = Some(stream);
        self.is_running.store(true, Ordering::Relaxed);
        log::info!("Audio stream started at {} Hz", self.desc.sample_rate);
        self.events.publish(MeadowSonicEvent::EngineStarted);
        Ok(())
    }

    /// Stops and drops the render stream, if one is running.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            self.is_running.store(false, Ordering::Relaxed);
            drop(stream);
            log::info!("Audio stream stopped");
            self.events.publish(MeadowSonicEvent::EngineStopped);
        }
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }

    /// Stops the stream, clears the graph, and abandons pending encoding
    /// work. Safe to call more than once; later calls are no-ops.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        if let Some(stream) = self.stream.take() {
            self.is_running.store(false, Ordering::Relaxed);
            drop(stream);
        }
        self.graph.lock().unwrap().clear();
        self.encoder.disable();
        self.events.publish(MeadowSonicEvent::EngineStopped);
        log::info!("Engine shut down");
    }

    /// Renders one block of interleaved stereo without a device stream.
    /// Same path as the callback, including lifecycle events.
    pub fn render_block(&mut self, out: &mut [f32]) -> MixResult {
        let result = self.graph.lock().unwrap().render_block(out);
        publish_mix_events(&self.events, &result);
        result
    }

    /// The per-frame poll step: settles music transitions, materializes
    /// spatial motion, drains worker responses and meter frames, and drops
    /// scene entries whose playback has ended.
    pub fn update(&mut self) {
        let mut graph = self.graph.lock().unwrap();
        let now = graph.now();
        self.director.tick(now, &mut graph);
        self.scene.tick(now, &mut graph);
        drop(graph);

        self.encoder.poll();

        while let Ok(event) = self.playback_rx.try_recv() {
            match event {
                MeadowSonicEvent::SourceCompleted { handle }
                | MeadowSonicEvent::SourceStopped { handle } => self.scene.release(handle),
                _ => {}
            }
        }

        while let Some(frame) = self.meter_consumer.try_pop() {
            self.meters.insert(frame.channel, frame);
        }
    }

    /// Latest post-fade levels, refreshed by [`update`](Self::update).
    pub fn meters(&self) -> &HashMap<Option<ChannelId>, MeterFrame> {
        &self.meters
    }

    // --- graph surface ---

    pub fn create_channel(&mut self, name: &str, spec: ChainSpec) -> Result<ChannelId> {
        self.graph.lock().unwrap().create_channel(name, spec)
    }

    pub fn channel_by_name(&self, name: &str) -> Option<ChannelId> {
        self.graph.lock().unwrap().channel_by_name(name)
    }

    /// Connects a buffer to a channel and starts it playing. Buffers at a
    /// foreign sample rate are resampled once to the engine rate. `None`
    /// mirrors the graph's no-op cases (unknown channel, source limit).
    pub fn play(
        &mut self,
        audio: Arc<MeadowSonicAudioData>,
        channel: ChannelId,
        options: MixOptions,
    ) -> Option<SourceHandle> {
        let audio = match self.match_engine_rate(audio) {
            Ok(audio) => audio,
            Err(err) => {
                log::warn!("Ignoring play: {}", err);
                return None;
            }
        };
        let handle = self.graph.lock().unwrap().connect_source(audio, channel, options);
        if let Some(handle) = handle {
            self.events.publish(MeadowSonicEvent::SourceStarted { handle });
        }
        handle
    }

    /// Converts a registered buffer to the engine rate, once, before it ever
    /// reaches the render path. Buffers already at the engine rate pass
    /// through untouched.
    fn match_engine_rate(
        &self,
        audio: Arc<MeadowSonicAudioData>,
    ) -> Result<Arc<MeadowSonicAudioData>> {
        if audio.sample_rate() == self.desc.sample_rate {
            return Ok(audio);
        }
        log::debug!(
            "Resampling {} Hz buffer to engine rate {} Hz",
            audio.sample_rate(),
            self.desc.sample_rate
        );
        Ok(Arc::new(audio.resample(self.desc.sample_rate)?))
    }

    pub fn stop_source(&mut self, handle: SourceHandle, fade_seconds: f64) {
        self.graph.lock().unwrap().stop(handle, fade_seconds);
    }

    pub fn is_source_active(&self, handle: SourceHandle) -> bool {
        self.graph.lock().unwrap().is_active(handle)
    }

    pub fn active_source_count(&self) -> usize {
        self.graph.lock().unwrap().active_source_count()
    }

    pub fn set_parameter(&mut self, target: ParamTarget, value: f32, ramp_seconds: f64) {
        self.graph.lock().unwrap().set_parameter(target, value, ramp_seconds);
    }

    pub fn schedule_parameter(
        &mut self,
        target: ParamTarget,
        value: f32,
        start_seconds: f64,
        ramp_seconds: f64,
    ) {
        self.graph
            .lock()
            .unwrap()
            .schedule_parameter(target, value, start_seconds, ramp_seconds);
    }

    pub fn parameter_value(&self, target: ParamTarget) -> Option<f32> {
        self.graph.lock().unwrap().parameter_value(target)
    }

    pub fn mute(&mut self, channel: ChannelId, muted: bool) {
        self.graph.lock().unwrap().mute(channel, muted);
    }

    pub fn solo(&mut self, channel: ChannelId, solo: bool) {
        self.graph.lock().unwrap().solo(channel, solo);
    }

    pub fn set_effects_enabled(&mut self, channel: ChannelId, enabled: bool) {
        self.graph.lock().unwrap().set_effects_enabled(channel, enabled);
    }

    // --- spatial surface ---

    /// Plays a positioned buffer on the `ambient` lane and registers it with
    /// the spatial scene. The source starts with its distance gain and pan
    /// already applied.
    pub fn create_spatial_source(
        &mut self,
        audio: Arc<MeadowSonicAudioData>,
        position: Vec3,
    ) -> Result<(SourceHandle, SpatialSourceId)> {
        let audio = self.match_engine_rate(audio)?;
        let mut graph = self.graph.lock().unwrap();
        let handle = graph
            .connect_source(audio, self.channels.ambient, MixOptions::spatial(position))
            .ok_or_else(|| {
                MeadowSonicError::Engine("Cannot start spatial source: limit reached".to_string())
            })?;
        let id = match self.scene.create_source(handle, position) {
            Ok(id) => id,
            Err(err) => {
                graph.stop(handle, 0.0);
                return Err(err);
            }
        };
        let now = graph.now();
        self.scene.tick(now, &mut graph);
        drop(graph);

        self.events.publish(MeadowSonicEvent::SourceStarted { handle });
        Ok((handle, id))
    }

    /// Moves a spatial source, snapping or interpolating over `ramp_seconds`
    /// of audio-clock time.
    pub fn move_spatial_source(&mut self, id: SpatialSourceId, position: Vec3, ramp_seconds: f64) {
        let now = self.graph.lock().unwrap().now();
        self.scene.move_source(id, position, ramp_seconds, now);
    }

    pub fn update_listener(&mut self, pose: Pose) {
        let now = self.graph.lock().unwrap().now();
        self.scene.update_listener(pose, now);
    }

    pub fn listener(&self) -> Pose {
        self.scene.listener()
    }

    /// Switches the acoustic environment; `true` when the preset exists.
    pub fn set_environment(&mut self, name: &str) -> bool {
        let mut graph = self.graph.lock().unwrap();
        let switched = self.scene.set_environment(name, &mut graph);
        drop(graph);
        if switched {
            self.events.publish(MeadowSonicEvent::EnvironmentChanged {
                name: name.to_string(),
            });
        }
        switched
    }

    pub fn register_environment(&mut self, name: &str, preset: EnvironmentPreset) {
        self.scene.register_environment(name, preset);
    }

    pub fn environment(&self) -> &str {
        self.scene.environment()
    }

    // --- director surface ---

    /// Merges a context update and lets the director adapt the music.
    pub fn adapt_to_context(&mut self, update: ContextUpdate) {
        let mut graph = self.graph.lock().unwrap();
        let now = graph.now();
        self.director.adapt_to_context(update, now, &mut graph);
    }

    /// Typed context event inlet; equivalent to the update it lowers to.
    pub fn handle_context_event(&mut self, event: ContextEvent) {
        let mut graph = self.graph.lock().unwrap();
        let now = graph.now();
        self.director.handle_context_event(event, now, &mut graph);
    }

    pub fn current_music_state(&self) -> MusicStateSnapshot {
        self.director.current_state()
    }

    pub fn register_music_state(&mut self, state: MusicState) {
        self.director.register_state(state);
    }

    // --- encoder surface ---

    /// Schedules a compression task; see
    /// [`EncodingController::compress`](crate::encoder::EncodingController::compress).
    pub fn compress(
        &mut self,
        audio: Arc<MeadowSonicAudioData>,
        options: EncodeOptions,
    ) -> EncodeTicket {
        self.encoder.compress(audio, options)
    }

    pub fn encoding_stats(&self) -> EncodingStats {
        self.encoder.stats()
    }

    pub fn set_network_conditions(&mut self, conditions: NetworkConditions) {
        self.encoder.set_conditions(conditions);
    }

    fn create_stream<T>(
        &self,
        device: &cpal::Device,
        config: &cpal::StreamConfig,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let graph = self.graph.clone();
        let events = self.events.clone();
        let is_running = self.is_running.clone();
        let mut scratch: Vec<f32> = Vec::new();

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if !is_running.load(Ordering::Relaxed) {
                        for sample in data.iter_mut() {
                            *sample = T::from_sample(0.0f32);
                        }
                        return;
                    }

                    scratch.resize(data.len(), 0.0);
                    match graph.try_lock() {
                        Ok(mut graph) => {
                            let result = graph.render_block(&mut scratch);
                            drop(graph);
                            publish_mix_events(&events, &result);
                            for (sample, value) in data.iter_mut().zip(scratch.iter()) {
                                *sample = T::from_sample(*value);
                            }
                        }
                        Err(_) => {
                            // never wait on the control thread
                            for sample in data.iter_mut() {
                                *sample = T::from_sample(0.0f32);
                            }
                            log::warn!("Render callback missed the graph lock, emitting silence");
                            events.publish(MeadowSonicEvent::RenderContention);
                        }
                    }
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| {
                MeadowSonicError::AudioDevice(format!("Failed to build stream: {}", e))
            })?;

        Ok(stream)
    }
}

impl Drop for MeadowSonicEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Publishes per-source lifecycle events for one rendered block.
fn publish_mix_events(events: &EventBus, result: &MixResult) {
    for handle in &result.completed_sources {
        events.publish(MeadowSonicEvent::SourceCompleted { handle: *handle });
    }
    for (handle, loop_count) in &result.looped_sources {
        events.publish(MeadowSonicEvent::SourceLooped {
            handle: *handle,
            loop_count: *loop_count,
        });
    }
    for handle in &result.stopped_sources {
        events.publish(MeadowSonicEvent::SourceStopped { handle: *handle });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncodingDesc;
    use crate::encoder::EncodeOutcome;
    use crate::playback::LoopMode;

    fn test_desc() -> MeadowSonicEngineDesc {
        MeadowSonicEngineDesc {
            encoding: EncodingDesc {
                enabled: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn engine() -> MeadowSonicEngine {
        MeadowSonicEngine::new(test_desc()).unwrap()
    }

    fn ones(frames: usize) -> Arc<MeadowSonicAudioData> {
        MeadowSonicAudioData::from_mono(vec![1.0; frames], 48_000).unwrap()
    }

    fn render_seconds(engine: &mut MeadowSonicEngine, seconds: f64) {
        let mut out = vec![0.0f32; 4_800 * 2];
        let blocks = (seconds * 48_000.0 / 4_800.0).round() as usize;
        for _ in 0..blocks {
            engine.render_block(&mut out);
        }
    }

    #[test]
    fn test_new_creates_standard_channels() {
        let engine = engine();
        for name in [
            "music",
            "music-ambient",
            "music-melody",
            "music-rhythm",
            "music-harmony",
            "music-percussion",
            "music-traditional",
            "sfx",
            "voice",
            "ambient",
        ] {
            assert!(engine.channel_by_name(name).is_some(), "missing {}", name);
        }
        assert_eq!(
            engine.channel_by_name("ambient"),
            Some(engine.standard_channels().ambient)
        );

        // layer volumes start synced to the initial music state
        let lane = engine.channel_by_name("music-ambient").unwrap();
        assert_eq!(
            engine.parameter_value(ParamTarget::ChannelVolume(lane)),
            Some(0.55)
        );
        let silent = engine.channel_by_name("music-percussion").unwrap();
        assert_eq!(
            engine.parameter_value(ParamTarget::ChannelVolume(silent)),
            Some(0.0)
        );
    }

    #[test]
    fn test_new_rejects_invalid_desc() {
        let desc = MeadowSonicEngineDesc {
            sample_rate: 0,
            ..test_desc()
        };
        assert!(MeadowSonicEngine::new(desc).is_err());
    }

    #[test]
    fn test_play_and_render_publishes_lifecycle_events() {
        let mut engine = engine();
        let playback_rx = engine.subscribe(EventTopic::Playback);
        let sfx = engine.standard_channels().sfx;

        let handle = engine.play(ones(10), sfx, MixOptions::default()).unwrap();
        assert_eq!(
            playback_rx.try_recv().ok(),
            Some(MeadowSonicEvent::SourceStarted { handle })
        );

        let mut out = vec![0.0f32; 128];
        let result = engine.render_block(&mut out);
        assert_eq!(result.completed_sources, vec![handle]);
        assert_eq!(
            playback_rx.try_recv().ok(),
            Some(MeadowSonicEvent::SourceCompleted { handle })
        );
        assert!(!engine.is_source_active(handle));
    }

    #[test]
    fn test_play_resamples_foreign_rate_buffers() {
        let mut engine = engine();
        let sfx = engine.standard_channels().sfx;

        // 0.1 s at 24 kHz stays 0.1 s at the engine rate
        let audio = MeadowSonicAudioData::from_mono(vec![1.0; 2_400], 24_000).unwrap();
        let handle = engine.play(audio, sfx, MixOptions::default()).unwrap();

        let mut out = vec![0.0f32; 4_800 * 2];
        let result = engine.render_block(&mut out);
        assert_eq!(result.frames_filled, 4_800);
        assert_eq!(result.completed_sources, vec![handle]);
    }

    #[test]
    fn test_spatial_source_levels_follow_listener() {
        let mut engine = engine();
        let (handle, id) = engine
            .create_spatial_source(ones(48_000), Vec3::new(0.0, 0.0, -20.0))
            .unwrap();

        {
            let graph = engine.graph.lock().unwrap();
            let instance = graph.instances.get(&handle).unwrap();
            assert!((instance.spatial_gain - 0.612).abs() < 1e-3);
            assert!(instance.spatial_pan.abs() < 1e-6);
        }

        // one step inside the near distance: full gain
        engine.update_listener(Pose::from_position(Vec3::new(0.0, 0.0, -19.0)));
        engine.update();
        {
            let graph = engine.graph.lock().unwrap();
            let instance = graph.instances.get(&handle).unwrap();
            assert_eq!(instance.spatial_gain, 1.0);
        }

        engine.move_spatial_source(id, Vec3::new(0.0, 0.0, -30.0), 0.0);
        engine.update();
        let graph = engine.graph.lock().unwrap();
        let instance = graph.instances.get(&handle).unwrap();
        assert!(instance.spatial_gain < 1.0);
    }

    #[test]
    fn test_spatial_source_rejects_non_finite_position() {
        let mut engine = engine();
        let result = engine.create_spatial_source(ones(64), Vec3::new(f32::NAN, 0.0, 0.0));
        assert!(result.is_err());

        // the unwound graph source is released on the next rendered block
        let mut out = vec![0.0f32; 64];
        engine.render_block(&mut out);
        assert_eq!(engine.active_source_count(), 0);
        assert_eq!(engine.scene.source_count(), 0);
    }

    #[test]
    fn test_update_releases_scene_entries_for_finished_sources() {
        let mut engine = engine();
        engine
            .create_spatial_source(ones(10), Vec3::new(1.0, 0.0, 0.0))
            .unwrap();
        assert_eq!(engine.scene.source_count(), 1);

        let mut out = vec![0.0f32; 128];
        engine.render_block(&mut out);
        engine.update();
        assert_eq!(engine.scene.source_count(), 0);
    }

    #[test]
    fn test_environment_switch_publishes_event() {
        let mut engine = engine();
        let music_rx = engine.subscribe(EventTopic::Music);

        assert!(engine.set_environment("grove"));
        assert_eq!(engine.environment(), "grove");
        assert_eq!(
            music_rx.try_recv().ok(),
            Some(MeadowSonicEvent::EnvironmentChanged {
                name: "grove".to_string()
            })
        );

        assert!(!engine.set_environment("cathedral"));
        assert!(music_rx.try_recv().is_err());
    }

    #[test]
    fn test_meters_refresh_on_update() {
        let mut engine = engine();
        let sfx = engine.standard_channels().sfx;
        engine.play(
            ones(48_000),
            sfx,
            MixOptions::default().with_loop(LoopMode::Infinite),
        );

        let mut out = vec![0.0f32; 256];
        engine.render_block(&mut out);
        engine.update();

        let sfx_meter = engine.meters().get(&Some(sfx)).unwrap();
        assert!(sfx_meter.peak > 0.0);
        let master = engine.meters().get(&None).unwrap();
        assert!(master.peak > 0.0);
    }

    #[test]
    fn test_context_adaptation_transitions_music_state() {
        let mut engine = engine();
        engine.adapt_to_context(ContextUpdate::activity("celebrating").with_user_count(8));
        assert_eq!(engine.current_music_state().state, "exploration");

        render_seconds(&mut engine, 3.0);
        engine.update();
        assert_eq!(engine.current_music_state().state, "celebration");
    }

    #[test]
    fn test_compress_through_facade() {
        let mut engine = engine();
        let ticket = engine.compress(ones(4_800), EncodeOptions::default());
        assert!(matches!(
            ticket.try_outcome(),
            Some(EncodeOutcome::Complete(_))
        ));
        assert_eq!(engine.encoding_stats().task_count, 1);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut engine = engine();
        let engine_rx = engine.subscribe(EventTopic::Engine);
        engine.play(ones(64), engine.standard_channels().sfx, MixOptions::default());

        engine.shutdown();
        engine.shutdown();

        assert_eq!(engine.active_source_count(), 0);
        assert!(engine.channel_by_name("music").is_none());
        assert!(engine.start().is_err());

        let stopped = std::iter::from_fn(|| engine_rx.try_recv().ok())
            .filter(|event| matches!(event, MeadowSonicEvent::EngineStopped))
            .count();
        assert_eq!(stopped, 1);
    }
}
