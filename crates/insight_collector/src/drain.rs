use crate::record::InsightRecord;
use crate::store::InsightStore;
use eventbuf::EventBuffer;
use std::sync::Arc;
use std::thread;
use tokio::runtime::Handle;

/// Moves records from the event buffer into the durable store.
///
/// A dedicated OS thread blocks on the buffer so the hand-off costs the
/// async runtime nothing. The loop ends once the buffer is closed and
/// drained; a failed write is logged and that record dropped rather than
/// stalling the ones behind it.
pub struct DrainWorker {
    thread: Option<thread::JoinHandle<()>>,
}

impl DrainWorker {
    /// Spawns the drain thread. `handle` is the runtime used to run the
    /// store's async writes from the worker thread.
    pub fn spawn(
        buffer: Arc<EventBuffer<InsightRecord>>,
        store: Arc<dyn InsightStore>,
        handle: Handle,
    ) -> std::io::Result<Self> {
        let thread = thread::Builder::new()
            .name("insight-drain".into())
            .spawn(move || {
                while let Some(record) = buffer.dequeue() {
                    if let Err(error) = handle.block_on(store.write(&record)) {
                        tracing::warn!(id = %record.id, %error, "failed to persist record, dropping");
                    }
                }
            })?;

        Ok(Self {
            thread: Some(thread),
        })
    }

    /// Waits for the drain thread to finish. Close the buffer first, or this
    /// blocks forever.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("drain thread panicked");
            }
        }
    }
}
