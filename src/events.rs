//! Event types and subscriber fan-out for MeadowSonic

use crate::director::context::{SocialContext, TimeOfDay, Weather};
use crate::encoder::{EncodeResult, TaskId};
use crate::graph::SourceHandle;
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::Mutex;

/// Coarse routing key for event subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTopic {
    /// Engine lifecycle and render-path health
    Engine,
    /// Per-source playback lifecycle
    Playback,
    /// Music director state changes and adaptations
    Music,
    /// Encoding task outcomes
    Encoding,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeadowSonicEvent {
    EngineStarted,
    EngineStopped,
    /// The render callback could not acquire the graph lock and emitted silence.
    RenderContention,
    SourceStarted {
        handle: SourceHandle,
    },
    SourceCompleted {
        handle: SourceHandle,
    },
    SourceLooped {
        handle: SourceHandle,
        loop_count: u32,
    },
    SourceStopped {
        handle: SourceHandle,
    },
    MusicStateChanged {
        from: String,
        to: String,
    },
    AdaptationApplied {
        activity: f32,
        emotion: f32,
        social: SocialContext,
        time_of_day: TimeOfDay,
        weather: Weather,
    },
    EnvironmentChanged {
        name: String,
    },
    EncodeCompleted {
        task_id: TaskId,
        result: EncodeResult,
    },
    EncodeFailed {
        task_id: TaskId,
        error: String,
    },
    /// The encoding worker never initialized; the session runs synchronously.
    WorkerFallback,
}

impl MeadowSonicEvent {
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::EngineStarted | Self::EngineStopped | Self::RenderContention => {
                EventTopic::Engine
            }
            Self::SourceStarted { .. }
            | Self::SourceCompleted { .. }
            | Self::SourceLooped { .. }
            | Self::SourceStopped { .. } => EventTopic::Playback,
            Self::MusicStateChanged { .. }
            | Self::AdaptationApplied { .. }
            | Self::EnvironmentChanged { .. } => EventTopic::Music,
            Self::EncodeCompleted { .. } | Self::EncodeFailed { .. } | Self::WorkerFallback => {
                EventTopic::Encoding
            }
        }
    }

    pub fn source_handle(&self) -> Option<SourceHandle> {
        match self {
            Self::SourceStarted { handle }
            | Self::SourceCompleted { handle }
            | Self::SourceLooped { handle, .. }
            | Self::SourceStopped { handle } => Some(*handle),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::RenderContention | Self::EncodeFailed { .. } | Self::WorkerFallback
        )
    }
}

/// Topic-keyed event fan-out.
///
/// Subscribers receive events over unbounded channels, so publishing never
/// blocks the poll loop or the render path. Receivers that have been dropped
/// are pruned on the next publish to their topic.
pub struct EventBus {
    subscribers: Mutex<HashMap<EventTopic, Vec<Sender<MeadowSonicEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a new subscriber for the given topic.
    pub fn subscribe(&self, topic: EventTopic) -> Receiver<MeadowSonicEvent> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.subscribers
            .lock()
            .unwrap()
            .entry(topic)
            .or_default()
            .push(sender);
        receiver
    }

    /// Delivers the event to every live subscriber of its topic.
    pub fn publish(&self, event: MeadowSonicEvent) {
        let topic = event.topic();
        let mut subscribers = self.subscribers.lock().unwrap();
        if let Some(senders) = subscribers.get_mut(&topic) {
            senders.retain(|sender| sender.send(event.clone()).is_ok());
        }
    }

    pub fn subscriber_count(&self, topic: EventTopic) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .get(&topic)
            .map_or(0, |senders| senders.len())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
