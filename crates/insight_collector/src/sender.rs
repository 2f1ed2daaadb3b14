use crate::record::{InsightRecord, RecordBatch};
use async_trait::async_trait;
use thiserror::Error;

/// Error types for batch transmission
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// Transport-layer error (network, HTTP)
    #[error("transport error: {0}")]
    Transport(String),
    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Backend rejected the whole batch
    #[error("batch rejected: {0}")]
    Rejected(String),
}

/// Trait for transmitting record batches to a telemetry backend.
///
/// We need `#[async_trait]` because the scheduler holds the sender as
/// `Arc<dyn Sender>`.
///
/// # Partial success
///
/// `send` returns the subset of the batch that was confirmed delivered.
/// Individual record failures are expressed by leaving those records out of
/// the returned subset, never by an error; `Err` means the whole batch
/// failed and nothing was confirmed.
#[async_trait]
pub trait Sender: Send + Sync {
    /// Transmits a batch, returning the successfully sent records.
    async fn send(&self, batch: RecordBatch) -> Result<Vec<InsightRecord>, SendError>;

    /// Returns the sender name for diagnostics.
    fn name(&self) -> &str;
}

/// Sender that confirms and discards everything (disable path, benchmarks)
pub struct NullSender;

impl NullSender {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sender for NullSender {
    async fn send(&self, batch: RecordBatch) -> Result<Vec<InsightRecord>, SendError> {
        Ok(batch.records)
    }

    fn name(&self) -> &str {
        "null"
    }
}

/// Stdout sender for testing and debugging
pub struct StdoutSender {
    verbose: bool,
}

impl StdoutSender {
    /// Creates a new stdout sender
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

#[async_trait]
impl Sender for StdoutSender {
    async fn send(&self, batch: RecordBatch) -> Result<Vec<InsightRecord>, SendError> {
        if self.verbose {
            println!("=== Sending {} records ===", batch.len());
            for record in &batch.records {
                println!(
                    "Record: id={} category={:?} marker={} caller={} created={}",
                    record.id,
                    record.category,
                    record.custom_marker,
                    record.caller_name,
                    record.created_at
                );
            }
            println!("=== Send complete ===\n");
        }
        Ok(batch.records)
    }

    fn name(&self) -> &str {
        "stdout"
    }
}

/// JSON file sender for local development
pub struct JsonFileSender {
    file_path: String,
}

impl JsonFileSender {
    /// Creates a new JSON file sender
    pub fn new(file_path: String) -> Self {
        Self { file_path }
    }
}

#[async_trait]
impl Sender for JsonFileSender {
    async fn send(&self, batch: RecordBatch) -> Result<Vec<InsightRecord>, SendError> {
        let json = serde_json::to_string_pretty(&batch.records)
            .map_err(|e| SendError::Serialization(e.to_string()))?;

        tokio::fs::write(&self.file_path, json)
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;

        Ok(batch.records)
    }

    fn name(&self) -> &str {
        "json_file"
    }
}
