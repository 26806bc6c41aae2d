//! Nodes and automatable parameters.
//!
//! A [`Param`] is a value plus at most one scheduled linear ramp on the audio
//! clock. Ramps are frame-indexed: sampling at the ramp's start frame yields
//! the pre-ramp value, sampling at or after the end frame yields the target
//! exactly. Scheduling a new ramp retargets from the value the param would
//! have at the new start frame, so a superseded ramp can never land a write
//! later.

use super::{ChannelId, SourceHandle};

/// Identifier for a node in the signal graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// One scheduled linear parameter change, in frames on the audio clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRamp {
    pub from: f32,
    pub target: f32,
    pub start_frame: u64,
    pub end_frame: u64,
}

/// An automatable scalar parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    current: f32,
    ramp: Option<ParamRamp>,
}

impl Param {
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            ramp: None,
        }
    }

    /// Applies `value` immediately and cancels any scheduled ramp.
    pub fn set(&mut self, value: f32) {
        self.current = value;
        self.ramp = None;
    }

    /// Schedules a linear ramp to `target` over `[start_frame, end_frame]`.
    ///
    /// The ramp starts from whatever value the param would have at
    /// `start_frame`, replacing any ramp already scheduled. A ramp with
    /// `end_frame <= start_frame` applies immediately.
    pub fn ramp_to(&mut self, target: f32, start_frame: u64, end_frame: u64) {
        let from = self.value_at(start_frame);
        if end_frame <= start_frame {
            self.set(target);
            return;
        }
        self.current = from;
        self.ramp = Some(ParamRamp {
            from,
            target,
            start_frame,
            end_frame,
        });
    }

    /// Samples the param at an audio-clock frame.
    pub fn value_at(&self, frame: u64) -> f32 {
        match &self.ramp {
            None => self.current,
            Some(ramp) => {
                if frame <= ramp.start_frame {
                    ramp.from
                } else if frame >= ramp.end_frame {
                    ramp.target
                } else {
                    let span = (ramp.end_frame - ramp.start_frame) as f32;
                    let elapsed = (frame - ramp.start_frame) as f32;
                    ramp.from + (ramp.target - ramp.from) * (elapsed / span)
                }
            }
        }
    }

    /// Folds a ramp that has completed by `frame` into the current value.
    pub fn settle(&mut self, frame: u64) {
        if let Some(ramp) = &self.ramp {
            if frame >= ramp.end_frame {
                self.current = ramp.target;
                self.ramp = None;
            }
        }
    }

    /// The value the param is heading to (current value when not ramping).
    pub fn target(&self) -> f32 {
        self.ramp.as_ref().map_or(self.current, |ramp| ramp.target)
    }

    pub fn is_ramping(&self) -> bool {
        self.ramp.is_some()
    }
}

/// Processing role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Gain,
    Filter,
    Dynamics,
}

/// Names of the addressable parameters across node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamName {
    Gain,
    CutoffHz,
    Q,
    ThresholdDb,
    Ratio,
}

/// Addresses every automatable parameter in the graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamTarget {
    MasterVolume,
    ChannelVolume(ChannelId),
    SourceGain(SourceHandle),
    Node { node: NodeId, param: ParamName },
    ReverbMix,
    ReverbAbsorption,
}

/// An addressable processing unit in a channel chain.
///
/// The processing curves are intentionally simple: the contract is the
/// parameter set and its automation. The EQ stage renders as a one-pole
/// lowpass driven by `cutoff_hz` (`q` stays addressable); the dynamics stage
/// applies instant peak-ratio reduction above its threshold.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    params: Vec<(ParamName, Param)>,
    /// One-pole filter memory, left/right
    filter_state: [f32; 2],
}

impl Node {
    pub fn gain(id: NodeId, gain: f32) -> Self {
        Self {
            id,
            kind: NodeKind::Gain,
            params: vec![(ParamName::Gain, Param::new(gain))],
            filter_state: [0.0; 2],
        }
    }

    pub fn filter(id: NodeId, cutoff_hz: f32, q: f32) -> Self {
        Self {
            id,
            kind: NodeKind::Filter,
            params: vec![
                (ParamName::CutoffHz, Param::new(cutoff_hz)),
                (ParamName::Q, Param::new(q)),
            ],
            filter_state: [0.0; 2],
        }
    }

    pub fn dynamics(id: NodeId, threshold_db: f32, ratio: f32) -> Self {
        Self {
            id,
            kind: NodeKind::Dynamics,
            params: vec![
                (ParamName::ThresholdDb, Param::new(threshold_db)),
                (ParamName::Ratio, Param::new(ratio)),
            ],
            filter_state: [0.0; 2],
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn param(&self, name: ParamName) -> Option<&Param> {
        self.params
            .iter()
            .find(|(param_name, _)| *param_name == name)
            .map(|(_, param)| param)
    }

    pub fn param_mut(&mut self, name: ParamName) -> Option<&mut Param> {
        self.params
            .iter_mut()
            .find(|(param_name, _)| *param_name == name)
            .map(|(_, param)| param)
    }

    pub fn settle(&mut self, frame: u64) {
        for (_, param) in &mut self.params {
            param.settle(frame);
        }
    }

    /// Runs this node over an interleaved stereo buffer.
    pub fn process(&mut self, buffer: &mut [f32], block_start: u64, sample_rate: u32) {
        match self.kind {
            NodeKind::Gain => self.process_gain(buffer, block_start),
            NodeKind::Filter => self.process_filter(buffer, block_start, sample_rate),
            NodeKind::Dynamics => self.process_dynamics(buffer, block_start),
        }
    }

    fn process_gain(&mut self, buffer: &mut [f32], block_start: u64) {
        let Some(gain) = self.param(ParamName::Gain) else {
            return;
        };
        let frames = buffer.len() / 2;
        for frame_idx in 0..frames {
            let g = gain.value_at(block_start + frame_idx as u64);
            buffer[frame_idx * 2] *= g;
            buffer[frame_idx * 2 + 1] *= g;
        }
    }

    fn process_filter(&mut self, buffer: &mut [f32], block_start: u64, sample_rate: u32) {
        let Some(cutoff) = self.param(ParamName::CutoffHz) else {
            return;
        };
        let cutoff_hz = cutoff.value_at(block_start).max(0.0);
        let alpha =
            (1.0 - (-std::f32::consts::TAU * cutoff_hz / sample_rate as f32).exp()).clamp(0.0, 1.0);

        let frames = buffer.len() / 2;
        for frame_idx in 0..frames {
            for side in 0..2 {
                let idx = frame_idx * 2 + side;
                self.filter_state[side] += alpha * (buffer[idx] - self.filter_state[side]);
                buffer[idx] = self.filter_state[side];
            }
        }
    }

    fn process_dynamics(&mut self, buffer: &mut [f32], block_start: u64) {
        let (Some(threshold), Some(ratio)) = (
            self.param(ParamName::ThresholdDb),
            self.param(ParamName::Ratio),
        ) else {
            return;
        };
        let threshold_db = threshold.value_at(block_start);
        let ratio = ratio.value_at(block_start).max(1.0);
        let threshold_lin = 10.0f32.powf(threshold_db / 20.0);

        for sample in buffer.iter_mut() {
            let level = sample.abs();
            if level > threshold_lin && level > 0.0 {
                let excess_db = 20.0 * (level / threshold_lin).log10();
                let reduction_db = excess_db - excess_db / ratio;
                *sample *= 10.0f32.powf(-reduction_db / 20.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cancels_ramp() {
        let mut param = Param::new(0.0);
        param.ramp_to(1.0, 0, 100);
        param.set(0.25);
        assert!(!param.is_ramping());
        assert_eq!(param.value_at(100), 0.25);
    }

    #[test]
    fn test_ramp_endpoints() {
        let mut param = Param::new(0.2);
        param.ramp_to(1.0, 0, 48_000);
        // start samples the pre-ramp value, end samples the target exactly
        assert!((param.value_at(0) - 0.2).abs() < 1e-6);
        assert!((param.value_at(24_000) - 0.6).abs() < 1e-4);
        assert!((param.value_at(48_000) - 1.0).abs() < 1e-4);
        assert!((param.value_at(60_000) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_length_ramp_applies_immediately() {
        let mut param = Param::new(0.0);
        param.ramp_to(0.8, 500, 500);
        assert!(!param.is_ramping());
        assert_eq!(param.value_at(0), 0.8);
    }

    #[test]
    fn test_retarget_supersedes_without_stale_writes() {
        let mut param = Param::new(0.0);
        param.ramp_to(1.0, 0, 100);
        // halfway through, head somewhere else
        param.ramp_to(0.0, 50, 150);
        assert!((param.value_at(50) - 0.5).abs() < 1e-6);
        // the old ramp's endpoint never lands
        assert!((param.value_at(100) - 0.25).abs() < 1e-6);
        assert!(param.value_at(150).abs() < 1e-6);
    }

    #[test]
    fn test_delayed_ramp_holds_pre_value() {
        let mut param = Param::new(0.3);
        param.ramp_to(1.0, 1_000, 2_000);
        assert_eq!(param.value_at(0), 0.3);
        assert_eq!(param.value_at(1_000), 0.3);
        assert!((param.value_at(1_500) - 0.65).abs() < 1e-6);
        assert!((param.value_at(2_000) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_settle_folds_completed_ramp() {
        let mut param = Param::new(0.0);
        param.ramp_to(1.0, 0, 100);
        param.settle(50);
        assert!(param.is_ramping());
        param.settle(100);
        assert!(!param.is_ramping());
        assert_eq!(param.value_at(0), 1.0);
    }

    #[test]
    fn test_node_param_addressing() {
        let node = Node::filter(NodeId::from_raw(1), 800.0, 0.7);
        assert_eq!(node.kind(), NodeKind::Filter);
        assert!(node.param(ParamName::CutoffHz).is_some());
        assert!(node.param(ParamName::Q).is_some());
        assert!(node.param(ParamName::Gain).is_none());
    }

    #[test]
    fn test_gain_node_scales_buffer() {
        let mut node = Node::gain(NodeId::from_raw(1), 0.5);
        let mut buffer = vec![1.0f32; 8];
        node.process(&mut buffer, 0, 48_000);
        assert!(buffer.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_dynamics_reduces_peaks_only() {
        let mut node = Node::dynamics(NodeId::from_raw(1), -6.0, 4.0);
        let quiet = 10.0f32.powf(-12.0 / 20.0);
        let mut buffer = vec![1.0, quiet];
        node.process(&mut buffer, 0, 48_000);
        // 6 dB over threshold at 4:1 leaves 1.5 dB over: ~ -4.5 dBFS
        assert!(buffer[0] < 1.0);
        assert!((buffer[0] - 10.0f32.powf(-4.5 / 20.0)).abs() < 1e-3);
        assert!((buffer[1] - quiet).abs() < 1e-6);
    }
}
