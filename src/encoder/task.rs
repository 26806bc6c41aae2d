//! Compression tasks, the dispatch queue, and the shared result estimate.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::audio_data::MeadowSonicAudioData;
use crate::encoder::codec::Codec;

/// Correlation id for one compression request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        TaskId(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskPriority {
    #[default]
    Normal,
    High,
}

/// One unit of encoding work. The audio reference is the immutable shared
/// buffer; the worker never touches live playback data.
#[derive(Debug, Clone)]
pub struct CompressionTask {
    pub id: TaskId,
    pub audio: Arc<MeadowSonicAudioData>,
    pub codec: Codec,
    pub bitrate: u32,
    pub priority: TaskPriority,
    pub created_at: Instant,
}

/// Pending tasks awaiting a worker slot. High-priority tasks jump to the
/// head (LIFO among themselves), normal tasks append (FIFO).
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<CompressionTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: CompressionTask) {
        match task.priority {
            TaskPriority::High => self.tasks.push_front(task),
            TaskPriority::Normal => self.tasks.push_back(task),
        }
    }

    pub fn pop(&mut self) -> Option<CompressionTask> {
        self.tasks.pop_front()
    }

    /// Empties the queue, returning the abandoned tasks.
    pub fn clear(&mut self) -> Vec<CompressionTask> {
        self.tasks.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Outcome of one compression task.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeResult {
    /// Raw PCM size in bytes
    pub original_size: usize,
    pub compressed_size: usize,
    pub compression_ratio: f32,
    /// Seconds spent producing this result
    pub processing_time: f64,
    pub codec: Codec,
    pub bitrate: u32,
}

impl EncodeResult {
    /// Deterministic size estimate from the codec's base ratio, scaled by
    /// bitrate. Worker and synchronous paths both build results here, so the
    /// two paths agree byte for byte.
    pub fn estimate(
        sample_count: usize,
        codec: Codec,
        bitrate: u32,
        processing_time: f64,
    ) -> Self {
        let original_size = sample_count * std::mem::size_of::<f32>();
        let compression_ratio = codec.base_ratio() * 128.0 / bitrate.max(1) as f32;
        let compressed_size = (original_size as f32 / compression_ratio).round() as usize;
        Self {
            original_size,
            compressed_size,
            compression_ratio,
            processing_time,
            codec,
            bitrate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(raw_id: u64, priority: TaskPriority) -> CompressionTask {
        CompressionTask {
            id: TaskId::from_raw(raw_id),
            audio: MeadowSonicAudioData::from_mono(vec![0.0; 64], 48_000).unwrap(),
            codec: Codec::Opus,
            bitrate: 128,
            priority,
            created_at: Instant::now(),
        }
    }

    #[test]
    fn test_high_priority_jumps_the_queue() {
        let mut queue = TaskQueue::new();
        queue.push(task(1, TaskPriority::Normal));
        queue.push(task(2, TaskPriority::Normal));
        queue.push(task(3, TaskPriority::High));
        queue.push(task(4, TaskPriority::High));

        let order: Vec<u64> = std::iter::from_fn(|| queue.pop()).map(|t| t.id.raw()).collect();
        assert_eq!(order, vec![4, 3, 1, 2]);
    }

    #[test]
    fn test_clear_returns_abandoned_tasks() {
        let mut queue = TaskQueue::new();
        queue.push(task(1, TaskPriority::Normal));
        queue.push(task(2, TaskPriority::Normal));

        let abandoned = queue.clear();
        assert_eq!(abandoned.len(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_estimate_scales_with_bitrate() {
        let at_base = EncodeResult::estimate(48_000, Codec::Opus, 128, 0.0);
        assert_eq!(at_base.original_size, 192_000);
        assert_eq!(at_base.compression_ratio, 12.0);
        assert_eq!(at_base.compressed_size, 16_000);

        let at_double = EncodeResult::estimate(48_000, Codec::Opus, 256, 0.0);
        assert_eq!(at_double.compression_ratio, 6.0);
        assert_eq!(at_double.compressed_size, 32_000);

        let empty = EncodeResult::estimate(0, Codec::Mp3, 128, 0.0);
        assert_eq!(empty.original_size, 0);
        assert_eq!(empty.compressed_size, 0);
    }
}
