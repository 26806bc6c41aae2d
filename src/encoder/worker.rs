//! Parallel encoding worker.
//!
//! The worker is a plain thread behind a pair of channels. Requests carry a
//! task id; responses come back tagged with the same id so the controller can
//! correlate them out of order. The worker owns nothing but the buffers it is
//! handed and exits when the request channel disconnects, so dropping the
//! handle is a complete shutdown.

use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::audio_data::MeadowSonicAudioData;
use crate::encoder::codec::Codec;
use crate::encoder::task::{EncodeResult, TaskId};
use crate::error::{MeadowSonicError, Result};

/// Settings handed to the worker at startup.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub supported_codecs: Vec<Codec>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            supported_codecs: Codec::ALL.to_vec(),
        }
    }
}

/// Per-task encoding settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeConfig {
    pub codec: Codec,
    pub bitrate: u32,
}

#[derive(Debug, Clone)]
pub enum WorkerRequest {
    Initialize {
        config: WorkerConfig,
    },
    Compress {
        task_id: TaskId,
        audio: Arc<MeadowSonicAudioData>,
        config: EncodeConfig,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerResponse {
    Initialized,
    Complete { task_id: TaskId, data: EncodeResult },
    Error { task_id: TaskId, error: String },
}

/// Channel pair connected to a running worker thread.
pub struct WorkerHandle {
    requests: Sender<WorkerRequest>,
    responses: Receiver<WorkerResponse>,
}

impl WorkerHandle {
    /// Spawns the worker thread and queues its `Initialize` request. The
    /// `Initialized` acknowledgment arrives on the response channel.
    pub fn spawn(config: WorkerConfig) -> Result<Self> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded();
        let (response_tx, response_rx) = crossbeam_channel::unbounded();

        std::thread::Builder::new()
            .name("meadowsonic-encoder".to_string())
            .spawn(move || worker_loop(request_rx, response_tx))
            .map_err(|err| {
                MeadowSonicError::Encoding(format!("Failed to spawn encoding worker: {}", err))
            })?;

        // the send cannot fail here, the thread holds the receiver
        let _ = request_tx.send(WorkerRequest::Initialize { config });

        Ok(Self {
            requests: request_tx,
            responses: response_rx,
        })
    }

    /// Queues a request; returns false when the worker has died.
    pub fn send(&self, request: WorkerRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    pub fn try_recv(&self) -> Option<WorkerResponse> {
        self.responses.try_recv().ok()
    }

    #[cfg(test)]
    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<WorkerResponse> {
        self.responses.recv_timeout(timeout).ok()
    }
}

fn worker_loop(requests: Receiver<WorkerRequest>, responses: Sender<WorkerResponse>) {
    while let Ok(request) = requests.recv() {
        let response = match request {
            WorkerRequest::Initialize { config } => {
                log::debug!(
                    "Encoding worker initialized ({} codecs)",
                    config.supported_codecs.len()
                );
                WorkerResponse::Initialized
            }
            WorkerRequest::Compress {
                task_id,
                audio,
                config,
            } => compress(task_id, &audio, config),
        };
        if responses.send(response).is_err() {
            break;
        }
    }
    log::debug!("Encoding worker shut down");
}

fn compress(task_id: TaskId, audio: &MeadowSonicAudioData, config: EncodeConfig) -> WorkerResponse {
    if config.bitrate == 0 {
        return WorkerResponse::Error {
            task_id,
            error: "Compression config had a zero bitrate".to_string(),
        };
    }
    let started = Instant::now();
    let data = EncodeResult::estimate(
        audio.len(),
        config.codec,
        config.bitrate,
        started.elapsed().as_secs_f64(),
    );
    WorkerResponse::Complete { task_id, data }
}
