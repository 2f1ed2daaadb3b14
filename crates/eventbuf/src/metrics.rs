use crossbeam_utils::CachePadded;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for buffer activity.
///
/// All methods use `Ordering::Relaxed` because these are purely statistical
/// counters: no code path depends on them being up to date, and they guard no
/// other data. Slightly stale reads are fine for observability.
#[derive(Debug, Default)]
pub struct BufferMetrics {
    enqueued: CachePadded<AtomicU64>,
    dequeued: CachePadded<AtomicU64>,
}

impl BufferMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total items accepted from producers.
    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Total items handed to consumers.
    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    pub(crate) fn record_enqueue(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dequeue(&self) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
    }
}
