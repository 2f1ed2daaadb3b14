//! End-to-end pipeline tests: collector → enrichment → buffer → drain →
//! store → dispatch → sender → store.

use async_trait::async_trait;
use insight_collector::{
    ConnectionType, CycleOutcome, DeviceError, DeviceInfo, DispatchConfig, DispatchScheduler,
    DrainWorker, EventBuffer, InsightCategory, InsightCollector, InsightRecord, InsightStore,
    MemoryStore, RecordBatch, SendError, Sender, ViewState,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;

struct StubDevice;

#[async_trait]
impl DeviceInfo for StubDevice {
    async fn app_version(&self) -> Result<String, DeviceError> {
        Ok("3.2.1".to_string())
    }
    async fn os_version(&self) -> Result<String, DeviceError> {
        Ok("17.5".to_string())
    }
    async fn model(&self) -> Result<String, DeviceError> {
        Ok("iPhone15,2".to_string())
    }
    async fn unique_id(&self) -> Result<String, DeviceError> {
        Ok("install-e2e".to_string())
    }
    async fn ip_address(&self) -> Result<String, DeviceError> {
        Ok("192.168.1.20".to_string())
    }
    async fn battery(&self) -> Result<f64, DeviceError> {
        Ok(0.55)
    }
    async fn connection_type(&self) -> Result<ConnectionType, DeviceError> {
        Ok(ConnectionType::Cellular)
    }
    async fn connection_strength(&self) -> Result<f64, DeviceError> {
        Ok(0.4)
    }
}

struct FixedView;

impl ViewState for FixedView {
    fn current_view(&self) -> Option<String> {
        Some("dashboard".to_string())
    }
}

struct CapturingSender {
    batches: Mutex<Vec<Vec<InsightRecord>>>,
}

impl CapturingSender {
    fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }

    fn all_records(&self) -> Vec<InsightRecord> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl Sender for CapturingSender {
    async fn send(&self, batch: RecordBatch) -> Result<Vec<InsightRecord>, SendError> {
        self.batches.lock().unwrap().push(batch.records.clone());
        Ok(batch.records)
    }

    fn name(&self) -> &str {
        "capturing"
    }
}

struct FailingSender;

#[async_trait]
impl Sender for FailingSender {
    async fn send(&self, _batch: RecordBatch) -> Result<Vec<InsightRecord>, SendError> {
        Err(SendError::Transport("ingestion endpoint down".into()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

async fn wait_for_pending(store: &MemoryStore, count: usize) {
    for _ in 0..400 {
        if store.len() == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("store never reached {count} pending records (has {})", store.len());
}

/// Wires the full pipeline and returns its pieces.
fn pipeline() -> (
    Arc<EventBuffer<InsightRecord>>,
    Arc<MemoryStore>,
    InsightCollector,
    DrainWorker,
) {
    let buffer = Arc::new(EventBuffer::new());
    let store = Arc::new(MemoryStore::new());
    let collector = InsightCollector::new(
        Arc::new(StubDevice),
        Arc::new(FixedView),
        Arc::clone(&buffer),
    );
    let drain = DrainWorker::spawn(
        Arc::clone(&buffer),
        store.clone() as Arc<dyn InsightStore>,
        Handle::current(),
    )
    .unwrap();
    (buffer, store, collector, drain)
}

#[derive(Debug)]
struct SyncError;

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sync failed")
    }
}

impl std::error::Error for SyncError {}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_three_categories_flow_through_and_clear() {
    let (buffer, store, collector, drain) = pipeline();

    collector.set_identity(Some("user-7".to_string()), Some("Robin".to_string()));
    collector.track_event("checkout", "order placed", "checkout_flow");
    collector.track_metric("cart_total", 129.95f64, "checkout_flow");
    collector.track_exception(&SyncError, "sync_task");

    wait_for_pending(&store, 3).await;

    let sender = Arc::new(CapturingSender::new());
    let scheduler = DispatchScheduler::start(
        store.clone() as Arc<dyn InsightStore>,
        sender.clone(),
        DispatchConfig {
            tick: Duration::ZERO,
            send_timeout: None,
        },
    );

    let outcome = scheduler.dispatch_now().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { read: 3, sent: 3 });
    assert!(store.is_empty());

    let records = sender.all_records();
    assert_eq!(records.len(), 3);

    let categories: Vec<InsightCategory> = records.iter().map(|r| r.category).collect();
    assert!(categories.contains(&InsightCategory::Event));
    assert!(categories.contains(&InsightCategory::Metric));
    assert!(categories.contains(&InsightCategory::Exception));

    // Enrichment stamped the stub device context onto every record.
    for record in &records {
        assert!(!record.id.is_nil());
        assert_eq!(record.app_version, "3.2.1.0");
        assert_eq!(record.os_version, "17.5.0.0");
        assert_eq!(record.device_model, "iPhone15,2");
        assert_eq!(record.device_identifier, "install-e2e");
        assert_eq!(record.ip_address, "192.168.1.20");
        assert_eq!(record.battery_level, Some(0.55));
        assert_eq!(record.connection_type, ConnectionType::Cellular);
        assert_eq!(record.connection_strength, Some(0.4));
        assert_eq!(record.view_name.as_deref(), Some("dashboard"));
        assert_eq!(record.session_id, insight_collector::session_id());
        assert_eq!(record.user_id.as_deref(), Some("user-7"));
        assert_eq!(record.full_name.as_deref(), Some("Robin"));
    }

    // Ids are unique across the batch.
    let mut ids: Vec<_> = records.iter().map(|r| r.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    buffer.close();
    drain.join();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_whole_batch_failure_keeps_records_and_recovers() {
    let (buffer, store, collector, drain) = pipeline();

    collector.track_event("a", "first", "caller");
    collector.track_event("b", "second", "caller");
    collector.track_event("c", "third", "caller");
    wait_for_pending(&store, 3).await;

    let scheduler = DispatchScheduler::start(
        store.clone() as Arc<dyn InsightStore>,
        Arc::new(FailingSender),
        DispatchConfig {
            tick: Duration::ZERO,
            send_timeout: None,
        },
    );

    let result = scheduler.dispatch_now().await;
    assert!(result.is_err());
    // Nothing was confirmed, so nothing was deleted.
    assert_eq!(store.len(), 3);
    assert_eq!(scheduler.metrics().cycle_errors(), 1);

    // The guard is idle again immediately: the next firing runs and is not
    // skipped, and a healthy sender clears the backlog.
    let recovery = DispatchScheduler::start(
        store.clone() as Arc<dyn InsightStore>,
        Arc::new(CapturingSender::new()),
        DispatchConfig {
            tick: Duration::ZERO,
            send_timeout: None,
        },
    );
    let outcome = recovery.dispatch_now().await.unwrap();
    assert_eq!(outcome, CycleOutcome::Completed { read: 3, sent: 3 });
    assert!(store.is_empty());
    assert_eq!(scheduler.metrics().cycles_skipped(), 0);

    buffer.close();
    drain.join();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_periodic_dispatch_drains_new_arrivals() {
    let (buffer, store, collector, drain) = pipeline();
    let sender = Arc::new(CapturingSender::new());
    let scheduler = DispatchScheduler::start(
        store.clone() as Arc<dyn InsightStore>,
        sender.clone(),
        DispatchConfig {
            tick: Duration::from_millis(40),
            send_timeout: None,
        },
    );

    collector.track_event("first_wave", "m", "caller");
    tokio::time::sleep(Duration::from_millis(120)).await;
    collector.track_event("second_wave", "m", "caller");
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert!(store.is_empty());
    let markers: Vec<String> = sender
        .all_records()
        .iter()
        .map(|r| r.custom_marker.clone())
        .collect();
    assert!(markers.contains(&"first_wave".to_string()));
    assert!(markers.contains(&"second_wave".to_string()));

    scheduler.shutdown().await;
    buffer.close();
    drain.join();
}
