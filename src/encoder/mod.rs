//! Bandwidth-aware adaptive encoding.
//!
//! The [`EncodingController`] analyzes buffers, picks a codec and bitrate for
//! the current network conditions, and hands the work to a parallel worker
//! thread. Callers get an [`EncodeTicket`] immediately and never block; if
//! the worker is unavailable (or never acknowledges initialization) the
//! controller degrades to a synchronous path that produces identical results
//! for the rest of the session.

pub mod analysis;
pub mod codec;
pub mod task;
pub mod worker;

pub use analysis::{AudioAnalysis, analyze};
pub use codec::{
    Codec, CompressionLevel, NetworkConditions, SourceType, compute_bitrate, select_codec,
};
pub use task::{CompressionTask, EncodeResult, TaskId, TaskPriority, TaskQueue};
pub use worker::{EncodeConfig, WorkerConfig, WorkerHandle, WorkerRequest, WorkerResponse};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::audio_data::MeadowSonicAudioData;
use crate::config::EncodingDesc;
use crate::events::{EventBus, MeadowSonicEvent};

/// How long the controller waits for the worker's initialization
/// acknowledgment before falling back for the session.
const WORKER_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-request encoding options.
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    pub source_type: SourceType,
    /// Overrides the controller's preferred codec (content analysis may
    /// still substitute a better fit)
    pub codec: Option<Codec>,
    /// Overrides the source type's baseline bitrate in kbps
    pub target_bitrate: Option<u32>,
    pub priority: TaskPriority,
}

impl EncodeOptions {
    pub fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            codec: None,
            target_bitrate: None,
            priority: TaskPriority::Normal,
        }
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.target_bitrate = Some(kbps);
        self
    }

    pub fn high_priority(mut self) -> Self {
        self.priority = TaskPriority::High;
        self
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self::new(SourceType::Music)
    }
}

/// Final outcome of a compression task.
#[derive(Debug, Clone, PartialEq)]
pub enum EncodeOutcome {
    Complete(EncodeResult),
    Failed(String),
}

/// Handle to an asynchronous compression result.
pub struct EncodeTicket {
    task_id: TaskId,
    receiver: Receiver<EncodeOutcome>,
}

impl EncodeTicket {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// The outcome, if it has arrived.
    pub fn try_outcome(&self) -> Option<EncodeOutcome> {
        self.receiver.try_recv().ok()
    }

    /// Blocks until the outcome arrives. `None` means the controller went
    /// away without resolving the task.
    pub fn wait(&self) -> Option<EncodeOutcome> {
        self.receiver.recv().ok()
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Option<EncodeOutcome> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

/// Running aggregates over completed tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EncodingStats {
    pub total_original: u64,
    pub total_compressed: u64,
    pub average_ratio: f32,
    pub total_processing_time: f64,
    pub task_count: u64,
}

impl EncodingStats {
    fn record(&mut self, result: &EncodeResult) {
        self.task_count += 1;
        self.total_original += result.original_size as u64;
        self.total_compressed += result.compressed_size as u64;
        self.total_processing_time += result.processing_time;
        self.average_ratio +=
            (result.compression_ratio - self.average_ratio) / self.task_count as f32;
    }
}

#[derive(Debug, Clone, Copy)]
enum WorkerState {
    /// Spawned, initialization acknowledgment not yet observed
    Starting { since: Instant },
    Ready,
    /// No worker for the rest of the session; tasks run synchronously
    Failed,
}

pub struct EncodingController {
    preferred_codec: Codec,
    level: CompressionLevel,
    supported: Vec<Codec>,
    conditions: NetworkConditions,
    queue: TaskQueue,
    worker: Option<WorkerHandle>,
    worker_state: WorkerState,
    /// Task currently on the worker; at most one at a time
    in_flight: Option<TaskId>,
    pending: HashMap<TaskId, Sender<EncodeOutcome>>,
    stats: EncodingStats,
    codec_fallback_logged: bool,
    next_task_id: u64,
    events: Arc<EventBus>,
}

impl EncodingController {
    pub fn new(desc: &EncodingDesc, events: Arc<EventBus>) -> Self {
        let (worker, worker_state) = if desc.enabled {
            match WorkerHandle::spawn(WorkerConfig::default()) {
                Ok(handle) => (
                    Some(handle),
                    WorkerState::Starting {
                        since: Instant::now(),
                    },
                ),
                Err(err) => {
                    log::warn!(
                        "Encoding worker unavailable, running synchronously this session: {}",
                        err
                    );
                    events.publish(MeadowSonicEvent::WorkerFallback);
                    (None, WorkerState::Failed)
                }
            }
        } else {
            log::debug!("Encoding worker disabled by configuration");
            (None, WorkerState::Failed)
        };

        Self {
            preferred_codec: desc.preferred_codec,
            level: desc.level,
            supported: Codec::ALL.to_vec(),
            conditions: NetworkConditions::default(),
            queue: TaskQueue::new(),
            worker,
            worker_state,
            in_flight: None,
            pending: HashMap::new(),
            stats: EncodingStats::default(),
            codec_fallback_logged: false,
            next_task_id: 0,
            events,
        }
    }

    /// Telemetry inlet; read at decision time for every later task.
    pub fn set_conditions(&mut self, conditions: NetworkConditions) {
        log::debug!(
            "Network conditions: {} kbps, cpu {:.2}",
            conditions.bandwidth_kbps,
            conditions.cpu_load
        );
        self.conditions = conditions;
    }

    pub fn conditions(&self) -> NetworkConditions {
        self.conditions
    }

    /// Restricts codec selection to what the platform reports it can encode.
    pub fn set_supported_codecs(&mut self, supported: Vec<Codec>) {
        if supported.is_empty() {
            log::warn!("Ignoring empty supported codec set");
            return;
        }
        self.supported = supported;
        self.codec_fallback_logged = false;
    }

    pub fn stats(&self) -> EncodingStats {
        self.stats
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_worker_ready(&self) -> bool {
        matches!(self.worker_state, WorkerState::Ready)
    }

    /// Analyzes the buffer, decides codec and bitrate, and schedules the
    /// work. Never blocks: while the worker is still starting (or has
    /// failed) the task runs inline on the calling thread, otherwise it is
    /// queued for the worker with high-priority tasks at the head.
    pub fn compress(
        &mut self,
        audio: Arc<MeadowSonicAudioData>,
        options: EncodeOptions,
    ) -> EncodeTicket {
        let analysis = analyze(&audio.fold_mono(), audio.sample_rate());
        let requested = options.codec.unwrap_or(self.preferred_codec);
        let (codec, fell_back) = select_codec(requested, &self.supported, &analysis);
        if fell_back && !self.codec_fallback_logged {
            log::warn!(
                "Requested codec {} is unsupported; using {} for this session",
                requested,
                codec
            );
            self.codec_fallback_logged = true;
        }
        let bitrate = compute_bitrate(
            codec,
            options.source_type,
            options.target_bitrate,
            &analysis,
            self.level,
            &self.conditions,
        );

        let task_id = TaskId::from_raw(self.next_task_id);
        self.next_task_id += 1;
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.pending.insert(task_id, sender);

        let task = CompressionTask {
            id: task_id,
            audio,
            codec,
            bitrate,
            priority: options.priority,
            created_at: Instant::now(),
        };
        log::debug!(
            "Compression task {} ({} @ {} kbps, {:?})",
            task_id,
            codec,
            bitrate,
            options.priority
        );

        if matches!(self.worker_state, WorkerState::Ready) {
            self.queue.push(task);
            self.dispatch_next();
        } else {
            self.run_sync(task);
        }

        EncodeTicket { task_id, receiver }
    }

    /// Poll step: enforces the initialization timeout, drains worker
    /// responses, fulfills tickets, and keeps the worker fed.
    pub fn poll(&mut self) {
        if let WorkerState::Starting { since } = self.worker_state {
            if since.elapsed() >= WORKER_ACK_TIMEOUT {
                self.degrade_to_sync("no initialization acknowledgment within 2s");
            }
        }

        loop {
            let Some(response) = self.worker.as_ref().and_then(|worker| worker.try_recv())
            else {
                break;
            };
            match response {
                WorkerResponse::Initialized => {
                    log::info!("Encoding worker ready");
                    self.worker_state = WorkerState::Ready;
                    self.dispatch_next();
                }
                WorkerResponse::Complete { task_id, data } => {
                    if self.in_flight == Some(task_id) {
                        self.in_flight = None;
                    }
                    self.fulfill(task_id, EncodeOutcome::Complete(data));
                    self.dispatch_next();
                }
                WorkerResponse::Error { task_id, error } => {
                    if self.in_flight == Some(task_id) {
                        self.in_flight = None;
                    }
                    self.fulfill(task_id, EncodeOutcome::Failed(error));
                    self.dispatch_next();
                }
            }
        }
    }

    /// Abandons all pending work. Queued and in-flight tasks resolve as
    /// errors without waiting for the worker; later `compress` calls run
    /// synchronously.
    pub fn disable(&mut self) {
        let abandoned = self.queue.clear();
        for task in abandoned {
            self.fulfill(
                task.id,
                EncodeOutcome::Failed("Encoding controller disabled".to_string()),
            );
        }
        if let Some(task_id) = self.in_flight.take() {
            self.fulfill(
                task_id,
                EncodeOutcome::Failed("Encoding controller disabled".to_string()),
            );
        }
        self.worker = None;
        self.worker_state = WorkerState::Failed;
        log::debug!("Encoding controller disabled");
    }

    fn dispatch_next(&mut self) {
        if self.in_flight.is_some() || !matches!(self.worker_state, WorkerState::Ready) {
            return;
        }
        let Some(task) = self.queue.pop() else {
            return;
        };

        let request = WorkerRequest::Compress {
            task_id: task.id,
            audio: task.audio.clone(),
            config: EncodeConfig {
                codec: task.codec,
                bitrate: task.bitrate,
            },
        };
        let sent = self
            .worker
            .as_ref()
            .is_some_and(|worker| worker.send(request));
        if sent {
            self.in_flight = Some(task.id);
        } else {
            self.degrade_to_sync("the encoding worker stopped accepting requests");
            self.run_sync(task);
        }
    }

    fn run_sync(&mut self, task: CompressionTask) {
        let started = Instant::now();
        let result = EncodeResult::estimate(
            task.audio.len(),
            task.codec,
            task.bitrate,
            started.elapsed().as_secs_f64(),
        );
        self.fulfill(task.id, EncodeOutcome::Complete(result));
    }

    fn fulfill(&mut self, task_id: TaskId, outcome: EncodeOutcome) {
        if let Some(sender) = self.pending.remove(&task_id) {
            let _ = sender.send(outcome.clone());
        }
        match outcome {
            EncodeOutcome::Complete(result) => {
                self.stats.record(&result);
                self.events
                    .publish(MeadowSonicEvent::EncodeCompleted { task_id, result });
            }
            EncodeOutcome::Failed(error) => {
                log::warn!("Compression task {} failed: {}", task_id, error);
                self.events
                    .publish(MeadowSonicEvent::EncodeFailed { task_id, error });
            }
        }
    }

    /// Permanent per-session fallback. Anything queued for the worker runs
    /// inline right away.
    fn degrade_to_sync(&mut self, reason: &str) {
        if !matches!(self.worker_state, WorkerState::Failed) {
            log::warn!(
                "Falling back to synchronous encoding for this session: {}",
                reason
            );
            self.events.publish(MeadowSonicEvent::WorkerFallback);
        }
        self.worker_state = WorkerState::Failed;
        self.worker = None;
        for task in self.queue.clear() {
            self.run_sync(task);
        }
    }

    #[cfg(test)]
    fn backdate_worker_start(&mut self, by: Duration) {
        if let WorkerState::Starting { since } = &mut self.worker_state {
            *since -= by;
        }
    }
}
