//! Insight Collector
//!
//! A telemetry pipeline for applications that must never pay for their own
//! diagnostics: track calls return immediately from any thread, records are
//! enriched with device and session context on background tasks, buffered
//! through an unbounded FIFO, persisted, and periodically dispatched to a
//! pluggable backend that confirms delivery record by record.
//!
//! # Pipeline
//!
//! ```text
//! InsightCollector ─(fire-and-forget)→ Enricher → EventBuffer
//!     → DrainWorker → InsightStore → DispatchScheduler → Sender
//!     → InsightStore (delete confirmed)
//! ```
//!
//! Unconfirmed records stay in the store and are retried every cycle;
//! overlapping cycles are skipped, never stacked; no failure anywhere in the
//! pipeline propagates into application code.

pub mod collector;
pub mod device;
pub mod dispatch;
pub mod drain;
pub mod enrich;
pub mod logging;
pub mod record;
pub mod sender;
pub mod store;

// Re-export main types
pub use collector::InsightCollector;
pub use device::{DeviceError, DeviceInfo, NoViewState, ViewState};
pub use dispatch::{
    CycleOutcome, DispatchConfig, DispatchError, DispatchMetrics, DispatchScheduler,
};
pub use drain::DrainWorker;
pub use enrich::Enricher;
pub use record::{
    normalize_version, session_id, ConnectionType, InsightCategory, InsightRecord, InsightValue,
    RecordBatch, DEFAULT_VERSION,
};
pub use sender::{JsonFileSender, NullSender, SendError, Sender, StdoutSender};
pub use store::{InsightStore, MemoryStore, StoreError};

// The buffer crate is part of the public surface (track_raw returns its
// error type, constructors take its buffer).
pub use eventbuf::{EnqueueError, EventBuffer};
