use crate::device::{DeviceInfo, ViewState};
use crate::enrich::Enricher;
use crate::record::{InsightRecord, InsightValue};
use eventbuf::{EnqueueError, EventBuffer};
use std::error::Error as StdError;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Producer facade for application code.
///
/// Every `track_*` call builds its record synchronously, captures the fields
/// that only exist at the call site, then hands enrichment and buffering to
/// a background task and returns immediately: callers are never delayed by
/// device lookups, and no telemetry failure ever propagates into them.
pub struct InsightCollector {
    enricher: Arc<Enricher>,
    buffer: Arc<EventBuffer<InsightRecord>>,
    views: Arc<dyn ViewState>,
    handle: Handle,
}

impl InsightCollector {
    /// Creates a collector on the current tokio runtime.
    ///
    /// Must be called from within a runtime; the captured handle lets the
    /// `track_*` methods be called from any thread afterwards.
    pub fn new(
        device: Arc<dyn DeviceInfo>,
        views: Arc<dyn ViewState>,
        buffer: Arc<EventBuffer<InsightRecord>>,
    ) -> Self {
        Self::with_handle(device, views, buffer, Handle::current())
    }

    /// Creates a collector that spawns its background work on `handle`.
    pub fn with_handle(
        device: Arc<dyn DeviceInfo>,
        views: Arc<dyn ViewState>,
        buffer: Arc<EventBuffer<InsightRecord>>,
        handle: Handle,
    ) -> Self {
        Self {
            enricher: Arc::new(Enricher::new(device)),
            buffer,
            views,
            handle,
        }
    }

    /// Records a measurement in the `category` series.
    pub fn track_metric(
        &self,
        category: &str,
        value: impl Into<InsightValue>,
        caller_name: &str,
    ) {
        self.capture(InsightRecord::metric(category, value.into(), caller_name));
    }

    /// Records a caught error: message from `Display`, trace from the
    /// source chain (empty for errors without one).
    pub fn track_exception(&self, error: &(dyn StdError + '_), caller_name: &str) {
        self.capture(InsightRecord::exception(
            error.to_string(),
            source_chain(error),
            caller_name,
        ));
    }

    /// Records a named application event.
    pub fn track_event(&self, name: &str, message: &str, caller_name: &str) {
        self.capture(InsightRecord::event(name, message, caller_name));
    }

    /// Buffers `record` exactly as given, skipping enrichment.
    ///
    /// Unlike the `track_*` methods this path is caller-controlled, so its
    /// failure is reported instead of swallowed.
    pub fn track_raw(
        &self,
        record: InsightRecord,
    ) -> Result<(), EnqueueError<InsightRecord>> {
        self.buffer.enqueue(record)
    }

    /// Sets the identity stamped onto subsequently enriched records.
    ///
    /// Takes effect at enrichment time: a record already captured but not
    /// yet enriched picks up the new identity.
    pub fn set_identity(
        &self,
        user_id: impl Into<Option<String>>,
        full_name: impl Into<Option<String>>,
    ) {
        self.enricher.set_identity(user_id.into(), full_name.into());
    }

    /// Synchronous half of a track call: capture call-site state, schedule
    /// the rest. Panics here are caught and logged, never surfaced.
    fn capture(&self, mut record: InsightRecord) {
        let result = catch_unwind(AssertUnwindSafe(|| {
            record.view_name = self.views.current_view();

            let enricher = Arc::clone(&self.enricher);
            let buffer = Arc::clone(&self.buffer);
            self.handle.spawn(async move {
                enricher.enrich(&mut record).await;
                if buffer.enqueue(record).is_err() {
                    tracing::warn!("event buffer closed, dropping record");
                }
            });
        }));

        if result.is_err() {
            tracing::warn!("telemetry capture failed, record dropped");
        }
    }
}

fn source_chain(error: &(dyn StdError + '_)) -> String {
    let mut frames = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        frames.push(format!("caused by: {cause}"));
        source = cause.source();
    }
    frames.join("\n")
}
