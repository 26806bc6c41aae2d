//! The Signal Graph: channels, nodes, playing sources and their automation.
//!
//! The graph is the sole owner and mutator of every node and parameter.
//! Other components — the music director, the spatial scene, the engine
//! facade — submit changes through the methods here; nothing else writes a
//! param. All scheduling is in frames on the graph's [`AudioClock`], which
//! advances exactly once per rendered block.

pub mod channel;
pub mod node;

pub use channel::{ChainSpec, Channel, NodeSpec};
pub use node::{Node, NodeId, NodeKind, Param, ParamName, ParamRamp, ParamTarget};

use crate::audio_data::MeadowSonicAudioData;
use crate::clock::AudioClock;
use crate::config::MixOptions;
use crate::error::{MeadowSonicError, Result};
use crate::mixer::{self, MeterFrame, MixResult};
use crate::playback::{PlayState, PlaybackInstance};
use ringbuf::HeapProd;
use std::collections::HashMap;
use std::sync::Arc;

/// Duration of the gate fade applied when soloing or un-soloing a channel.
pub const SOLO_FADE_SECONDS: f64 = 0.1;

/// Identifier for a channel lane.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChannelId({})", self.0)
    }
}

/// Lightweight, type-safe handle for a playing source.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceHandle(u64);

impl SourceHandle {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SourceHandle({})", self.0)
    }
}

pub struct SignalGraph {
    pub(crate) clock: AudioClock,
    max_sources: usize,
    pub(crate) master_volume: Param,
    pub(crate) reverb_mix: Param,
    pub(crate) reverb_absorption: Param,
    pub(crate) nodes: HashMap<NodeId, Node>,
    /// Channels in creation order; render and name lookup both honor it.
    pub(crate) channels: Vec<Channel>,
    pub(crate) instances: HashMap<SourceHandle, PlaybackInstance>,
    /// Lock-free outlet for per-block meter frames (attached by the engine)
    pub(crate) meter_producer: Option<HeapProd<MeterFrame>>,
    /// Per-channel mix buffer reused across blocks
    pub(crate) scratch: Vec<f32>,
    next_node_id: u64,
    next_channel_id: u64,
    next_source_id: u64,
}

impl SignalGraph {
    pub fn new(sample_rate: u32, max_sources: usize, master_volume: f32) -> Result<Self> {
        Ok(Self {
            clock: AudioClock::new(sample_rate)?,
            max_sources,
            master_volume: Param::new(master_volume),
            reverb_mix: Param::new(0.2),
            reverb_absorption: Param::new(0.3),
            nodes: HashMap::new(),
            channels: Vec::new(),
            instances: HashMap::new(),
            meter_producer: None,
            scratch: Vec::new(),
            next_node_id: 0,
            next_channel_id: 0,
            next_source_id: 0,
        })
    }

    pub fn clock(&self) -> &AudioClock {
        &self.clock
    }

    /// Current audio-clock time in seconds.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    /// Creates a channel with the given chain blueprint.
    ///
    /// Duplicate names are allowed; [`channel_by_name`](Self::channel_by_name)
    /// returns the first match. An empty name is a configuration error.
    pub fn create_channel(&mut self, name: &str, spec: ChainSpec) -> Result<ChannelId> {
        if name.is_empty() {
            return Err(MeadowSonicError::Configuration(
                "Channel name must not be empty".to_string(),
            ));
        }

        let id = ChannelId(self.next_channel_id);
        self.next_channel_id += 1;

        let mut channel = Channel::new(id, name);
        channel.chain = spec
            .nodes
            .iter()
            .map(|node_spec| self.instantiate_node(*node_spec))
            .collect();
        channel.effects = spec
            .effects
            .iter()
            .map(|node_spec| self.instantiate_node(*node_spec))
            .collect();

        log::debug!(
            "Created channel '{}' ({}) with {} chain nodes, {} effect nodes",
            name,
            id,
            channel.chain.len(),
            channel.effects.len()
        );
        self.channels.push(channel);
        Ok(id)
    }

    fn instantiate_node(&mut self, spec: NodeSpec) -> NodeId {
        let id = NodeId::from_raw(self.next_node_id);
        self.next_node_id += 1;
        let node = match spec {
            NodeSpec::Gain { gain } => Node::gain(id, gain),
            NodeSpec::Filter { cutoff_hz, q } => Node::filter(id, cutoff_hz, q),
            NodeSpec::Dynamics {
                threshold_db,
                ratio,
            } => Node::dynamics(id, threshold_db, ratio),
        };
        self.nodes.insert(id, node);
        id
    }

    /// First channel with the given name, if any.
    pub fn channel_by_name(&self, name: &str) -> Option<ChannelId> {
        self.channels
            .iter()
            .find(|channel| channel.name == name)
            .map(|channel| channel.id)
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.id == id)
    }

    fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|channel| channel.id == id)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Connects a buffer to a channel and starts it playing.
    ///
    /// Returns `None` — a logged no-op, never an error — when the channel is
    /// unknown or the source limit is reached.
    pub fn connect_source(
        &mut self,
        audio: Arc<MeadowSonicAudioData>,
        channel: ChannelId,
        options: MixOptions,
    ) -> Option<SourceHandle> {
        if self.channel(channel).is_none() {
            log::warn!("Ignoring connect to unknown channel {}", channel);
            return None;
        }
        if self.instances.len() >= self.max_sources {
            log::warn!(
                "Ignoring connect: source limit of {} reached",
                self.max_sources
            );
            return None;
        }

        let handle = SourceHandle(self.next_source_id);
        self.next_source_id += 1;

        let instance = PlaybackInstance::new(
            handle,
            channel,
            audio,
            &options,
            self.clock.frame(),
            self.clock.sample_rate(),
        );
        self.instances.insert(handle, instance);
        if let Some(lane) = self.channel_mut(channel) {
            lane.add_source(handle);
            log::debug!("Connected source {} to channel '{}'", handle, lane.name);
        }
        Some(handle)
    }

    /// Applies a parameter change, immediately or as a linear ramp ending
    /// exactly at `now + ramp_seconds` on the audio clock.
    ///
    /// Unknown targets are logged no-ops.
    pub fn set_parameter(&mut self, target: ParamTarget, value: f32, ramp_seconds: f64) {
        let now = self.clock.frame();
        let end = now + self.clock.frames_in(ramp_seconds);
        match self.resolve_param_mut(target) {
            Some(param) => {
                if ramp_seconds <= 0.0 {
                    param.set(value);
                } else {
                    param.ramp_to(value, now, end);
                }
            }
            None => log::warn!("Ignoring parameter change for unknown target {:?}", target),
        }
    }

    /// Schedules a parameter ramp that begins `start_seconds` from now.
    ///
    /// The param holds its present value until the start frame. A zero
    /// `ramp_seconds` lands the change over a single frame at the start.
    pub fn schedule_parameter(
        &mut self,
        target: ParamTarget,
        value: f32,
        start_seconds: f64,
        ramp_seconds: f64,
    ) {
        let start = self.clock.frame() + self.clock.frames_in(start_seconds);
        let end = start + self.clock.frames_in(ramp_seconds).max(1);
        match self.resolve_param_mut(target) {
            Some(param) => param.ramp_to(value, start, end),
            None => log::warn!("Ignoring scheduled change for unknown target {:?}", target),
        }
    }

    /// Samples a parameter at the current clock frame.
    pub fn parameter_value(&self, target: ParamTarget) -> Option<f32> {
        let frame = self.clock.frame();
        self.resolve_param(target).map(|param| param.value_at(frame))
    }

    fn resolve_param_mut(&mut self, target: ParamTarget) -> Option<&mut Param> {
        match target {
            ParamTarget::MasterVolume => Some(&mut self.master_volume),
            ParamTarget::ReverbMix => Some(&mut self.reverb_mix),
            ParamTarget::ReverbAbsorption => Some(&mut self.reverb_absorption),
            ParamTarget::ChannelVolume(id) => {
                self.channel_mut(id).map(|channel| &mut channel.volume)
            }
            ParamTarget::SourceGain(handle) => self
                .instances
                .get_mut(&handle)
                .map(|instance| &mut instance.gain),
            ParamTarget::Node { node, param } => self
                .nodes
                .get_mut(&node)
                .and_then(|node| node.param_mut(param)),
        }
    }

    fn resolve_param(&self, target: ParamTarget) -> Option<&Param> {
        match target {
            ParamTarget::MasterVolume => Some(&self.master_volume),
            ParamTarget::ReverbMix => Some(&self.reverb_mix),
            ParamTarget::ReverbAbsorption => Some(&self.reverb_absorption),
            ParamTarget::ChannelVolume(id) => self.channel(id).map(|channel| &channel.volume),
            ParamTarget::SourceGain(handle) => self
                .instances
                .get(&handle)
                .map(|instance| &instance.gain),
            ParamTarget::Node { node, param } => {
                self.nodes.get(&node).and_then(|node| node.param(param))
            }
        }
    }

    /// Hard-gates a channel. Volume and gate params stay untouched, so
    /// un-muting restores the exact pre-mute state.
    pub fn mute(&mut self, channel: ChannelId, muted: bool) {
        match self.channel_mut(channel) {
            Some(lane) => {
                lane.muted = muted;
                log::debug!(
                    "Channel '{}' {}",
                    lane.name,
                    if muted { "muted" } else { "unmuted" }
                );
            }
            None => log::warn!("Ignoring mute for unknown channel {}", channel),
        }
    }

    /// Solos a channel: every sibling's gate fades to 0 over
    /// [`SOLO_FADE_SECONDS`]. At most one channel is soloed at a time;
    /// soloing another channel moves the solo. Un-soloing fades all gates
    /// back to 1 — channels that were independently muted stay muted.
    pub fn solo(&mut self, channel: ChannelId, solo: bool) {
        if self.channel(channel).is_none() {
            log::warn!("Ignoring solo for unknown channel {}", channel);
            return;
        }
        let now = self.clock.frame();
        let fade_end = now + self.clock.frames_in(SOLO_FADE_SECONDS);

        if solo {
            for lane in &mut self.channels {
                lane.solo = lane.id == channel;
                let target = if lane.id == channel { 1.0 } else { 0.0 };
                lane.gate.ramp_to(target, now, fade_end);
            }
            log::debug!("Channel {} soloed", channel);
        } else {
            let is_soloed = self
                .channels
                .iter()
                .any(|lane| lane.id == channel && lane.solo);
            if !is_soloed {
                log::debug!("Ignoring un-solo for channel {} (not soloed)", channel);
                return;
            }
            for lane in &mut self.channels {
                lane.solo = false;
                lane.gate.ramp_to(1.0, now, fade_end);
            }
            log::debug!("Channel {} un-soloed", channel);
        }
    }

    /// Toggles a channel's effect sub-chain. Sources keep playing.
    pub fn set_effects_enabled(&mut self, channel: ChannelId, enabled: bool) {
        match self.channel_mut(channel) {
            Some(lane) => {
                lane.effects_enabled = enabled;
                log::debug!(
                    "Channel '{}' effects {}",
                    lane.name,
                    if enabled { "enabled" } else { "disabled" }
                );
            }
            None => log::warn!("Ignoring effects toggle for unknown channel {}", channel),
        }
    }

    /// Stops a source, fading its gain to zero over `fade_seconds` and
    /// releasing the instance when the fade completes. A zero fade silences
    /// and releases on the next rendered block. Any pending gain ramp on the
    /// source is cancelled. Unknown handles are no-ops.
    pub fn stop(&mut self, handle: SourceHandle, fade_seconds: f64) {
        let now = self.clock.frame();
        let fade_frames = self.clock.frames_in(fade_seconds);
        match self.instances.get_mut(&handle) {
            Some(instance) => {
                if fade_frames == 0 {
                    instance.gain.set(0.0);
                    instance.state = PlayState::Stopped;
                    instance.remove_at_frame = Some(now);
                } else {
                    instance.gain.ramp_to(0.0, now, now + fade_frames);
                    instance.remove_at_frame = Some(now + fade_frames);
                }
                log::debug!("Stopping source {} over {}s", handle, fade_seconds);
            }
            None => log::debug!("Ignoring stop for unknown source {}", handle),
        }
    }

    /// Spatial-scene inlet: distance gain and lateral pan for one source.
    ///
    /// Applied multiplicatively in the render pass, separate from the
    /// source's own gain param. Unknown handles are ignored; the scene learns
    /// about removals from playback events.
    pub fn set_source_spatial(&mut self, handle: SourceHandle, gain: f32, pan: f32) {
        if let Some(instance) = self.instances.get_mut(&handle) {
            instance.spatial_gain = gain.clamp(0.0, 1.0);
            instance.spatial_pan = pan.clamp(-1.0, 1.0);
        }
    }

    pub fn is_active(&self, handle: SourceHandle) -> bool {
        self.instances.contains_key(&handle)
    }

    pub fn active_source_count(&self) -> usize {
        self.instances.len()
    }

    pub(crate) fn set_meter_producer(&mut self, producer: HeapProd<MeterFrame>) {
        self.meter_producer = Some(producer);
    }

    /// Renders one block of interleaved stereo into `out` and advances the
    /// clock by the block's frame count.
    pub fn render_block(&mut self, out: &mut [f32]) -> MixResult {
        mixer::render_block(self, out)
    }

    /// Releases every node, channel and source. Used at engine shutdown.
    pub fn clear(&mut self) {
        let sources = self.instances.len();
        self.instances.clear();
        self.channels.clear();
        self.nodes.clear();
        log::info!("Signal graph cleared ({} sources released)", sources);
    }
}
