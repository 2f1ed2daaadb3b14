use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::SystemTime;
use uuid::Uuid;

/// What kind of diagnostic event a record carries.
///
/// Closed set: extend only by adding a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsightCategory {
    /// A named measurement with a value
    Metric,
    /// A caught error with its message and trace
    Exception,
    /// A named application event
    Event,
}

/// Network connectivity at enrichment time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionType {
    /// Connectivity could not be determined
    #[default]
    Unknown,
    /// No network available
    Offline,
    /// Mobile data
    Cellular,
    /// Wireless LAN
    Wifi,
    /// Wired connection
    Ethernet,
}

/// Free-form value types for metric payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InsightValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl From<&str> for InsightValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for InsightValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for InsightValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for InsightValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for InsightValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One captured diagnostic event plus its enrichment context.
///
/// Constructors produce a *bare* record carrying only caller-supplied fields;
/// the enricher assigns `id` and `created_at` and fills the device, session,
/// and identity fields. Records buffered via the raw path skip enrichment
/// entirely and keep whatever the caller set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    /// Globally unique identifier, assigned once at enrichment time.
    /// Nil until then.
    pub id: Uuid,
    pub category: InsightCategory,
    /// Name of the originating operation, supplied by the caller.
    pub caller_name: String,
    pub message: String,
    pub custom_marker: String,
    pub custom_value: Option<InsightValue>,
    /// Never null; empty when not applicable.
    pub stack_trace: String,
    /// UTC timestamp set once at enrichment time. Capture time is
    /// intentionally not recorded.
    pub created_at: DateTime<Utc>,

    // Enrichment fields, each independently defaulted on lookup failure.
    pub app_version: String,
    pub os_version: String,
    pub device_model: String,
    pub device_identifier: String,
    pub ip_address: String,
    pub battery_level: Option<f64>,
    pub connection_type: ConnectionType,
    pub connection_strength: Option<f64>,
    /// Captured synchronously at the call site, before the async hand-off.
    pub view_name: Option<String>,
    pub session_id: String,
    pub user_id: Option<String>,
    pub full_name: Option<String>,
}

impl InsightRecord {
    fn bare(category: InsightCategory, caller_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            category,
            caller_name: caller_name.into(),
            message: String::new(),
            custom_marker: String::new(),
            custom_value: None,
            stack_trace: String::new(),
            created_at: DateTime::UNIX_EPOCH,
            app_version: String::new(),
            os_version: String::new(),
            device_model: String::new(),
            device_identifier: String::new(),
            ip_address: String::new(),
            battery_level: None,
            connection_type: ConnectionType::Unknown,
            connection_strength: None,
            view_name: None,
            session_id: String::new(),
            user_id: None,
            full_name: None,
        }
    }

    /// A measurement: `category` names the series, `value` is the reading.
    pub fn metric(
        category: impl Into<String>,
        value: InsightValue,
        caller_name: impl Into<String>,
    ) -> Self {
        let mut record = Self::bare(InsightCategory::Metric, caller_name);
        record.custom_marker = category.into();
        record.custom_value = Some(value);
        record
    }

    /// A named application event with a free-form message.
    pub fn event(
        name: impl Into<String>,
        message: impl Into<String>,
        caller_name: impl Into<String>,
    ) -> Self {
        let mut record = Self::bare(InsightCategory::Event, caller_name);
        record.custom_marker = name.into();
        record.message = message.into();
        record
    }

    /// A caught error with its message and (possibly empty) trace.
    pub fn exception(
        message: impl Into<String>,
        stack_trace: impl Into<String>,
        caller_name: impl Into<String>,
    ) -> Self {
        let mut record = Self::bare(InsightCategory::Exception, caller_name);
        record.message = message.into();
        record.stack_trace = stack_trace.into();
        record
    }
}

/// Batch of records handed to a sender
#[derive(Debug, Clone)]
pub struct RecordBatch {
    /// All records in this batch
    pub records: Vec<InsightRecord>,
    /// Batch creation timestamp
    pub timestamp: SystemTime,
}

impl RecordBatch {
    /// Creates a new empty batch
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            timestamp: SystemTime::now(),
        }
    }

    /// Creates a batch with the given records
    pub fn with_records(records: Vec<InsightRecord>) -> Self {
        Self {
            records,
            timestamp: SystemTime::now(),
        }
    }

    /// Returns the number of records in the batch
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the batch is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for RecordBatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallback when a device version lookup fails outright.
pub const DEFAULT_VERSION: &str = "0.0.0.0";

/// Normalizes a version string to exactly four dot-separated numeric
/// components. Missing, negative, or unparsable components become `0`;
/// anything beyond the fourth component is dropped.
pub fn normalize_version(raw: &str) -> String {
    let mut parts = raw.trim().split('.');
    let mut components = [0u64; 4];
    for component in &mut components {
        if let Some(part) = parts.next() {
            *component = part.trim().parse().unwrap_or(0);
        }
    }
    format!(
        "{}.{}.{}.{}",
        components[0], components[1], components[2], components[3]
    )
}

static SESSION_ID: OnceLock<String> = OnceLock::new();

/// The process-wide session identifier.
///
/// Assigned once for the lifetime of the running process and shared by every
/// record enriched in it.
pub fn session_id() -> &'static str {
    SESSION_ID.get_or_init(|| Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_carries_call_site_fields() {
        let record = InsightRecord::metric("frame_time", InsightValue::Float(16.7), "render");

        assert_eq!(record.category, InsightCategory::Metric);
        assert_eq!(record.custom_marker, "frame_time");
        assert_eq!(record.custom_value, Some(InsightValue::Float(16.7)));
        assert_eq!(record.caller_name, "render");
        assert!(record.id.is_nil());
        assert!(record.stack_trace.is_empty());
    }

    #[test]
    fn test_event_carries_name_and_message() {
        let record = InsightRecord::event("login", "user tapped login", "login_view");

        assert_eq!(record.category, InsightCategory::Event);
        assert_eq!(record.custom_marker, "login");
        assert_eq!(record.message, "user tapped login");
    }

    #[test]
    fn test_exception_keeps_trace() {
        let record = InsightRecord::exception("boom", "at render\nat main", "render");

        assert_eq!(record.category, InsightCategory::Exception);
        assert_eq!(record.message, "boom");
        assert_eq!(record.stack_trace, "at render\nat main");
    }

    #[test]
    fn test_normalize_version_pads_and_truncates() {
        assert_eq!(normalize_version("1.2"), "1.2.0.0");
        assert_eq!(normalize_version("1.2.3.4"), "1.2.3.4");
        assert_eq!(normalize_version("1.2.3.4.5"), "1.2.3.4");
        assert_eq!(normalize_version("10"), "10.0.0.0");
    }

    #[test]
    fn test_normalize_version_defaults_bad_components() {
        assert_eq!(normalize_version("1.-1.3.4"), "1.0.3.4");
        assert_eq!(normalize_version("a.b"), "0.0.0.0");
        assert_eq!(normalize_version(""), "0.0.0.0");
    }

    #[test]
    fn test_session_id_stable_within_process() {
        let first = session_id();
        let second = session_id();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_insight_value_conversions() {
        assert_eq!(InsightValue::from("x"), InsightValue::String("x".into()));
        assert_eq!(InsightValue::from(3i64), InsightValue::Int(3));
        assert_eq!(InsightValue::from(true), InsightValue::Bool(true));
    }
}
