use crate::metrics::BufferMetrics;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error returned when enqueueing into a closed buffer.
///
/// Hands the rejected item back so the producer decides its fate.
#[derive(Debug, Error)]
#[error("buffer is closed")]
pub struct EnqueueError<T>(pub T);

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Unbounded thread-safe FIFO buffer.
///
/// Any number of producers may `enqueue` concurrently without blocking.
/// Consumers `dequeue` one item at a time in FIFO order; when several
/// consumers compete, each item is delivered to exactly one of them.
///
/// Capacity is unbounded: a stalled consumer grows memory rather than
/// blocking producers.
pub struct EventBuffer<T> {
    state: Mutex<State<T>>,
    available: Condvar,
    metrics: BufferMetrics,
}

impl<T> EventBuffer<T> {
    /// Creates an empty open buffer.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
            metrics: BufferMetrics::new(),
        }
    }

    // A producer panicking while holding the lock must not wedge every other
    // producer, so poisoning is recovered rather than propagated.
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends an item to the tail of the buffer.
    ///
    /// Never blocks beyond the internal lock hand-off and fails only once
    /// the buffer has been closed, returning the item to the caller.
    pub fn enqueue(&self, item: T) -> Result<(), EnqueueError<T>> {
        let mut state = self.lock();
        if state.closed {
            return Err(EnqueueError(item));
        }
        state.items.push_back(item);
        drop(state);

        self.metrics.record_enqueue();
        self.available.notify_one();
        Ok(())
    }

    /// Removes the item at the head of the buffer, blocking until one is
    /// available.
    ///
    /// Returns `None` only once the buffer is closed and fully drained.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                self.metrics.record_dequeue();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`dequeue`](Self::dequeue), but gives up after `timeout`.
    pub fn dequeue_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                self.metrics.record_dequeue();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, result) = self
                .available
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
            if result.timed_out() && state.items.is_empty() {
                return None;
            }
        }
    }

    /// Removes the head item if one is immediately available.
    pub fn try_dequeue(&self) -> Option<T> {
        let item = self.lock().items.pop_front();
        if item.is_some() {
            self.metrics.record_dequeue();
        }
        item
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// Returns true if no items are buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Closes the buffer: producers start failing, blocked consumers wake,
    /// and remaining items stay dequeueable until drained.
    ///
    /// Idempotent.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    /// Returns true once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Returns buffer activity counters.
    pub fn metrics(&self) -> &BufferMetrics {
        &self.metrics
    }
}

impl<T> Default for EventBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}
