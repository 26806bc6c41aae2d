//! Channels: named lanes of nodes with volume, mute/solo and sources.

use super::node::{NodeId, Param};
use super::{ChannelId, SourceHandle};

/// Blueprint for one node in a channel chain.
#[derive(Debug, Clone, Copy)]
pub enum NodeSpec {
    Gain { gain: f32 },
    Filter { cutoff_hz: f32, q: f32 },
    Dynamics { threshold_db: f32, ratio: f32 },
}

/// Blueprint for a channel's processing chain.
///
/// `nodes` is the always-on chain; `effects` is the optional sub-chain
/// (typically an EQ filter plus a dynamics compressor) that can be toggled
/// at runtime without disturbing playing sources.
#[derive(Debug, Clone, Default)]
pub struct ChainSpec {
    pub nodes: Vec<NodeSpec>,
    pub effects: Vec<NodeSpec>,
}

impl ChainSpec {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single gain stage at `gain`.
    pub fn gain(gain: f32) -> Self {
        Self {
            nodes: vec![NodeSpec::Gain { gain }],
            effects: Vec::new(),
        }
    }

    pub fn with_node(mut self, spec: NodeSpec) -> Self {
        self.nodes.push(spec);
        self
    }

    pub fn with_effect(mut self, spec: NodeSpec) -> Self {
        self.effects.push(spec);
        self
    }

    /// The conventional effect sub-chain: EQ filter into compressor.
    pub fn with_standard_effects(self) -> Self {
        self.with_effect(NodeSpec::Filter {
            cutoff_hz: 8_000.0,
            q: 0.707,
        })
        .with_effect(NodeSpec::Dynamics {
            threshold_db: -12.0,
            ratio: 3.0,
        })
    }
}

/// A named lane in the signal graph.
///
/// `volume` is the fader; `gate` is the solo machinery's fade (1.0 when no
/// solo is active); `muted` is a hard gate that zeroes the channel's
/// contribution without touching either param, so un-muting restores the
/// exact pre-mute state.
#[derive(Debug)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub volume: Param,
    pub gate: Param,
    pub muted: bool,
    pub solo: bool,
    /// Always-on node chain, in processing order
    pub chain: Vec<NodeId>,
    /// Toggleable effect sub-chain, processed after `chain`
    pub effects: Vec<NodeId>,
    pub effects_enabled: bool,
    /// Sources currently connected to this channel
    pub sources: Vec<SourceHandle>,
}

impl Channel {
    pub fn new(id: ChannelId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            volume: Param::new(1.0),
            gate: Param::new(1.0),
            muted: false,
            solo: false,
            chain: Vec::new(),
            effects: Vec::new(),
            effects_enabled: true,
            sources: Vec::new(),
        }
    }

    /// Node ids in processing order, honoring the effects toggle.
    pub fn active_chain(&self) -> impl Iterator<Item = NodeId> + '_ {
        let effects = if self.effects_enabled {
            self.effects.as_slice()
        } else {
            &[]
        };
        self.chain.iter().chain(effects.iter()).copied()
    }

    pub fn add_source(&mut self, handle: SourceHandle) {
        self.sources.push(handle);
    }

    pub fn remove_source(&mut self, handle: SourceHandle) {
        self.sources.retain(|existing| *existing != handle);
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }
}
