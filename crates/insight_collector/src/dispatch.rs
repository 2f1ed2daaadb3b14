use crate::record::RecordBatch;
use crate::sender::{SendError, Sender};
use crate::store::{InsightStore, StoreError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Configuration for the dispatch scheduler
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Period between dispatch cycles. Zero disables the timer entirely;
    /// cycles then run only via [`DispatchScheduler::dispatch_now`].
    pub tick: Duration,
    /// Upper bound on a single send. `None` lets a wedged sender stall its
    /// cycle until it returns.
    pub send_timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(300),
            send_timeout: None,
        }
    }
}

/// Error types for a dispatch cycle
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Reading or deleting pending records failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    /// The sender failed the whole batch
    #[error("send error: {0}")]
    Send(#[from] SendError),
    /// The sender exceeded the configured per-cycle time limit
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}

/// What a dispatch trigger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was in flight; this trigger did nothing.
    Skipped,
    /// The cycle ran to completion.
    Completed {
        /// Records in the snapshot read from the store
        read: usize,
        /// Records the sender confirmed and the cycle deleted
        sent: usize,
    },
}

/// Counters for scheduler activity.
///
/// All methods use `Ordering::Relaxed`: purely statistical, guarding nothing.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    cycles_completed: AtomicU64,
    cycles_skipped: AtomicU64,
    cycle_errors: AtomicU64,
    records_sent: AtomicU64,
    delete_errors: AtomicU64,
}

impl DispatchMetrics {
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::Relaxed)
    }

    pub fn cycles_skipped(&self) -> u64 {
        self.cycles_skipped.load(Ordering::Relaxed)
    }

    pub fn cycle_errors(&self) -> u64 {
        self.cycle_errors.load(Ordering::Relaxed)
    }

    pub fn records_sent(&self) -> u64 {
        self.records_sent.load(Ordering::Relaxed)
    }

    pub fn delete_errors(&self) -> u64 {
        self.delete_errors.load(Ordering::Relaxed)
    }
}

/// Releases the non-reentrancy flag on every exit path, including panics.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct DispatchInner {
    store: Arc<dyn InsightStore>,
    sender: Arc<dyn Sender>,
    config: DispatchConfig,
    running: AtomicBool,
    metrics: DispatchMetrics,
}

impl DispatchInner {
    /// One dispatch trigger: skip if a cycle is in flight, otherwise run
    /// read → send → delete-confirmed.
    async fn run_cycle(&self) -> Result<CycleOutcome, DispatchError> {
        let Some(guard) = CycleGuard::try_acquire(&self.running) else {
            self.metrics.cycles_skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(sender = self.sender.name(), "dispatch cycle in flight, skipping");
            return Ok(CycleOutcome::Skipped);
        };

        let outcome = self.cycle_body().await;
        match &outcome {
            Ok(_) => self.metrics.cycles_completed.fetch_add(1, Ordering::Relaxed),
            Err(_) => self.metrics.cycle_errors.fetch_add(1, Ordering::Relaxed),
        };
        drop(guard);
        outcome
    }

    async fn cycle_body(&self) -> Result<CycleOutcome, DispatchError> {
        // Snapshot: records written after this read belong to the next cycle.
        let pending = self.store.read_all().await?;
        if pending.is_empty() {
            return Ok(CycleOutcome::Completed { read: 0, sent: 0 });
        }
        let read = pending.len();

        let batch = RecordBatch::with_records(pending);
        let sent = match self.config.send_timeout {
            Some(limit) => tokio::time::timeout(limit, self.sender.send(batch))
                .await
                .map_err(|_| DispatchError::Timeout(limit))??,
            None => self.sender.send(batch).await?,
        };

        // Delete exactly the confirmed subset. Unconfirmed records stay put
        // and are resubmitted on every later cycle until a sender confirms
        // them. Deletions are independent: one failure never blocks the rest.
        let sent_count = sent.len();
        for record in &sent {
            if let Err(error) = self.store.delete(record).await {
                self.metrics.delete_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(id = %record.id, %error, "failed to delete dispatched record");
            }
        }

        self.metrics
            .records_sent
            .fetch_add(sent_count as u64, Ordering::Relaxed);
        tracing::debug!(
            sender = self.sender.name(),
            read,
            sent = sent_count,
            "dispatch cycle completed"
        );
        Ok(CycleOutcome::Completed {
            read,
            sent: sent_count,
        })
    }
}

/// Recurring, non-reentrant dispatcher: periodically reads all pending
/// records from the store, hands them to the sender, and deletes only the
/// records the sender confirms.
///
/// At most one cycle is ever in flight. A firing that lands while a cycle
/// runs is skipped, never queued, so a slow sender causes missed firings
/// rather than stacked ones. A failed cycle is logged and the flag released;
/// the next firing proceeds normally.
pub struct DispatchScheduler {
    inner: Arc<DispatchInner>,
    timer_task: Option<JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl DispatchScheduler {
    /// Creates the scheduler and, for a non-zero tick, starts the timer with
    /// an immediate first firing.
    ///
    /// Must be called from within a tokio runtime when the tick is non-zero.
    pub fn start(
        store: Arc<dyn InsightStore>,
        sender: Arc<dyn Sender>,
        config: DispatchConfig,
    ) -> Self {
        let tick = config.tick;
        let inner = Arc::new(DispatchInner {
            store,
            sender,
            config,
            running: AtomicBool::new(false),
            metrics: DispatchMetrics::default(),
        });

        if tick.is_zero() {
            return Self {
                inner,
                timer_task: None,
                shutdown_tx: None,
            };
        }

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let timer_inner = Arc::clone(&inner);
        let timer_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(error) = timer_inner.run_cycle().await {
                            tracing::warn!(%error, "dispatch cycle failed");
                        }
                    }
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Self {
            inner,
            timer_task: Some(timer_task),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Triggers one cycle outside the timer. Subject to the same
    /// non-reentrancy rules as timed firings.
    pub async fn dispatch_now(&self) -> Result<CycleOutcome, DispatchError> {
        self.inner.run_cycle().await
    }

    /// Returns scheduler activity counters.
    pub fn metrics(&self) -> &DispatchMetrics {
        &self.inner.metrics
    }

    /// Stops the timer and waits for it. An in-flight cycle finishes first.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.timer_task.take() {
            if let Err(error) = task.await {
                tracing::warn!(%error, "dispatch timer task join failed");
            }
        }
    }
}
