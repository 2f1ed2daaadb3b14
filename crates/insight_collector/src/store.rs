use crate::record::InsightRecord;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Error types for durable store operations
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Underlying storage I/O failed
    #[error("storage I/O error: {0}")]
    Io(String),
    /// Stored data could not be decoded
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Durable holding area for records awaiting dispatch.
///
/// We need `#[async_trait]` because the scheduler holds the store as
/// `Arc<dyn InsightStore>`. Persistence mechanics are the implementor's
/// business; the pipeline only relies on the contract below.
#[async_trait]
pub trait InsightStore: Send + Sync {
    /// Every pending record, in write order. Reflects all writes that
    /// completed before the call.
    async fn read_all(&self) -> Result<Vec<InsightRecord>, StoreError>;

    /// Persists one record.
    async fn write(&self, record: &InsightRecord) -> Result<(), StoreError>;

    /// Removes one record by id. Idempotent: deleting an absent record is
    /// not an error.
    async fn delete(&self, record: &InsightRecord) -> Result<(), StoreError>;
}

/// Ordered in-process store.
///
/// The default store for processes that can tolerate losing unsent records
/// on exit, and the substrate for tests.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<InsightRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<InsightRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of pending records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl InsightStore for MemoryStore {
    async fn read_all(&self) -> Result<Vec<InsightRecord>, StoreError> {
        Ok(self.lock().clone())
    }

    async fn write(&self, record: &InsightRecord) -> Result<(), StoreError> {
        self.lock().push(record.clone());
        Ok(())
    }

    async fn delete(&self, record: &InsightRecord) -> Result<(), StoreError> {
        self.lock().retain(|pending| pending.id != record.id);
        Ok(())
    }
}
