//! Adaptive music director.
//!
//! The director listens to context signals from the surrounding application,
//! scores every registered [`MusicState`] against the latest snapshot, and
//! drives the per-layer music channels in the signal graph toward the winning
//! state. State changes run as two-phase fades on the shared audio clock; at
//! most one transition is in flight and further requests queue FIFO behind it.

pub mod context;
pub mod scoring;
pub mod state;
pub mod transition;

pub use context::{
    ContextEvent, ContextSnapshot, ContextUpdate, SocialContext, TimeOfDay, Weather,
};
pub use state::{LayerSet, MusicLayer, MusicState, StateRegistry, StateTag};
pub use transition::Transition;

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::{AdaptationDesc, AdaptationWeights};
use crate::events::{EventBus, MeadowSonicEvent};
use crate::graph::{ChannelId, ParamTarget, SignalGraph};

/// Ramp length for same-state micro-adjustments.
const MICRO_RAMP_SECONDS: f64 = 1.0;
/// Layer volume scale at zero activity.
const ACTIVITY_SCALE_BASE: f32 = 0.7;
/// Additional layer volume scale at full activity.
const ACTIVITY_SCALE_SPAN: f32 = 0.3;
/// Rhythm and percussion lift while a gathering is present.
const GATHERING_RHYTHM_LIFT: f32 = 1.2;
/// Ambient lift while a participant is alone.
const ALONE_AMBIENT_LIFT: f32 = 1.15;

/// Snapshot returned by [`MusicDirector::current_state`].
#[derive(Debug, Clone, PartialEq)]
pub struct MusicStateSnapshot {
    pub state: String,
    pub activity: f32,
    pub emotion: f32,
    pub social: SocialContext,
    pub time_of_day: TimeOfDay,
    pub weather: Weather,
}

pub struct MusicDirector {
    registry: StateRegistry,
    weights: AdaptationWeights,
    transition_seconds: f64,
    cultural_environments: Vec<String>,
    snapshot: ContextSnapshot,
    current: String,
    in_flight: Option<Transition>,
    queued: VecDeque<String>,
    layer_channels: [Option<ChannelId>; MusicLayer::ALL.len()],
    events: Arc<EventBus>,
}

impl MusicDirector {
    /// Director over the built-in community states.
    pub fn new(desc: &AdaptationDesc, events: Arc<EventBus>) -> Self {
        Self::with_registry(StateRegistry::community_defaults(), desc, events)
    }

    /// Director over a custom registry. The first registered state is the
    /// initial current state.
    pub fn with_registry(
        registry: StateRegistry,
        desc: &AdaptationDesc,
        events: Arc<EventBus>,
    ) -> Self {
        let current = registry
            .first()
            .map(|state| state.name.clone())
            .unwrap_or_default();
        Self {
            registry,
            weights: desc.weights,
            transition_seconds: desc.transition_seconds,
            cultural_environments: desc.cultural_environments.clone(),
            snapshot: ContextSnapshot::default(),
            current,
            in_flight: None,
            queued: VecDeque::new(),
            layer_channels: [None; MusicLayer::ALL.len()],
            events,
        }
    }

    /// Routes a music layer onto a graph channel. Unbound layers are skipped
    /// when volumes are written.
    pub fn bind_layer_channel(&mut self, layer: MusicLayer, channel: ChannelId) {
        self.layer_channels[layer.index()] = Some(channel);
    }

    pub fn register_state(&mut self, state: MusicState) {
        self.registry.register(state);
    }

    pub fn registry(&self) -> &StateRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ContextSnapshot {
        &self.snapshot
    }

    pub fn current_state_name(&self) -> &str {
        &self.current
    }

    pub fn transition_in_flight(&self) -> Option<&Transition> {
        self.in_flight.as_ref()
    }

    pub fn queued_transitions(&self) -> usize {
        self.queued.len()
    }

    /// Current state plus the retained context, one consistent snapshot.
    pub fn current_state(&self) -> MusicStateSnapshot {
        MusicStateSnapshot {
            state: self.current.clone(),
            activity: self.snapshot.activity,
            emotion: self.snapshot.emotional_intensity,
            social: self.snapshot.social,
            time_of_day: self.snapshot.time_of_day,
            weather: self.snapshot.weather,
        }
    }

    /// Writes the current state's exact layer volumes: active layers at the
    /// state intensity, inactive layers at zero. Called once after the layer
    /// channels are bound and again when a transition settles.
    pub fn sync_layer_volumes(&self, graph: &mut SignalGraph) {
        let Some(state) = self.registry.get(&self.current) else {
            return;
        };
        for layer in MusicLayer::ALL {
            if let Some(channel) = self.layer_channels[layer.index()] {
                let volume = if state.layers.contains(layer) {
                    state.intensity
                } else {
                    0.0
                };
                graph.set_parameter(ParamTarget::ChannelVolume(channel), volume, 0.0);
            }
        }
    }

    /// Typed context inlet; lowers the event and adapts.
    pub fn handle_context_event(
        &mut self,
        event: ContextEvent,
        now: f64,
        graph: &mut SignalGraph,
    ) {
        self.adapt_to_context(event.into(), now, graph);
    }

    /// Merges the update, scores every state, and acts on the winner. Never
    /// blocks: state changes are scheduled as graph ramps and a change
    /// requested during an in-flight transition queues behind it (duplicate
    /// consecutive targets collapse). Emits an adaptation snapshot event.
    pub fn adapt_to_context(&mut self, update: ContextUpdate, now: f64, graph: &mut SignalGraph) {
        self.snapshot.merge(update);

        let selected = scoring::calculate_optimal_state(
            &self.registry,
            &self.snapshot,
            &self.weights,
            &self.cultural_environments,
        )
        .map(|state| state.name.clone());

        if let Some(target) = selected {
            if target != self.current {
                match &self.in_flight {
                    Some(transition) => {
                        let tail = self
                            .queued
                            .back()
                            .map(String::as_str)
                            .unwrap_or(&transition.to);
                        if tail != target.as_str() {
                            log::debug!(
                                "Queueing music transition to '{}' behind '{}'",
                                target,
                                transition.to
                            );
                            self.queued.push_back(target);
                        }
                    }
                    None => self.begin_transition(&target, now, graph),
                }
            } else {
                self.micro_adjust(graph);
            }
        }

        self.events.publish(MeadowSonicEvent::AdaptationApplied {
            activity: self.snapshot.activity,
            emotion: self.snapshot.emotional_intensity,
            social: self.snapshot.social,
            time_of_day: self.snapshot.time_of_day,
            weather: self.snapshot.weather,
        });
    }

    /// Poll step: settles a finished transition (exact volumes, state-changed
    /// event) and starts the next queued one.
    pub fn tick(&mut self, now: f64, graph: &mut SignalGraph) {
        let completed = self
            .in_flight
            .as_ref()
            .is_some_and(|transition| transition.is_complete(now));
        if !completed {
            return;
        }
        let Some(transition) = self.in_flight.take() else {
            return;
        };

        self.current = transition.to.clone();
        self.sync_layer_volumes(graph);
        log::info!("Music state is now '{}'", self.current);
        self.events.publish(MeadowSonicEvent::MusicStateChanged {
            from: transition.from,
            to: transition.to,
        });

        while let Some(next) = self.queued.pop_front() {
            if next == self.current {
                log::debug!("Dropping queued transition to current state '{}'", next);
                continue;
            }
            self.begin_transition(&next, now, graph);
            break;
        }
    }

    /// Starts the two-phase fade: outgoing layers ramp to silence now, the
    /// incoming state's layers are scheduled to ramp up once the fade-out
    /// ends. Both phases live on the audio clock, so they survive any pause
    /// in adaptation traffic.
    fn begin_transition(&mut self, to: &str, now: f64, graph: &mut SignalGraph) {
        let transition = Transition::new(&self.current, to, now, self.transition_seconds);
        let fade_out = transition.fade_out_seconds();
        let fade_in = transition.fade_in_seconds();

        if let Some(outgoing) = self.registry.get(&self.current) {
            for layer in outgoing.layers.iter() {
                if let Some(channel) = self.layer_channels[layer.index()] {
                    graph.set_parameter(ParamTarget::ChannelVolume(channel), 0.0, fade_out);
                }
            }
        }
        if let Some(incoming) = self.registry.get(to) {
            let intensity = incoming.intensity;
            for layer in incoming.layers.iter() {
                if let Some(channel) = self.layer_channels[layer.index()] {
                    graph.schedule_parameter(
                        ParamTarget::ChannelVolume(channel),
                        intensity,
                        fade_out,
                        fade_in,
                    );
                }
            }
        }

        log::info!(
            "Music transition '{}' -> '{}' over {:.1}s",
            self.current,
            to,
            self.transition_seconds
        );
        self.in_flight = Some(transition);
    }

    /// Same-state adaptation: scale the active layers by activity and tilt
    /// the mix for the social context, as short ramps.
    fn micro_adjust(&self, graph: &mut SignalGraph) {
        let Some(state) = self.registry.get(&self.current) else {
            return;
        };
        let activity_scale = ACTIVITY_SCALE_BASE + ACTIVITY_SCALE_SPAN * self.snapshot.activity;

        for layer in state.layers.iter() {
            let Some(channel) = self.layer_channels[layer.index()] else {
                continue;
            };
            let mut volume = state.intensity * activity_scale;
            match self.snapshot.social {
                SocialContext::Gathering
                    if matches!(layer, MusicLayer::Rhythm | MusicLayer::Percussion) =>
                {
                    volume *= GATHERING_RHYTHM_LIFT;
                }
                SocialContext::Alone if layer == MusicLayer::Ambient => {
                    volume *= ALONE_AMBIENT_LIFT;
                }
                _ => {}
            }
            graph.set_parameter(
                ParamTarget::ChannelVolume(channel),
                volume.clamp(0.0, 1.0),
                MICRO_RAMP_SECONDS,
            );
        }
        log::debug!(
            "Micro-adjusted '{}' layers (activity {:.2}, {:?})",
            self.current,
            self.snapshot.activity,
            self.snapshot.social
        );
    }
}
