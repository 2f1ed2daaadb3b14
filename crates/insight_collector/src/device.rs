use crate::record::ConnectionType;
use async_trait::async_trait;
use thiserror::Error;

/// Error from a single device-context lookup.
///
/// Lookups fail independently; the enricher substitutes a documented default
/// per field and carries on, so these errors never abort a record.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    /// The platform does not expose this capability
    #[error("capability unavailable: {0}")]
    Unavailable(String),
    /// The lookup ran and failed
    #[error("lookup failed: {0}")]
    Lookup(String),
}

/// Device/runtime context lookups used to enrich records.
///
/// We need `#[async_trait]` because the enricher holds the provider as
/// `Arc<dyn DeviceInfo>`. Every method may fail on its own: a missing
/// battery must not cost the record its IP address.
#[async_trait]
pub trait DeviceInfo: Send + Sync {
    /// Application version, ideally `major.minor.build.revision`.
    async fn app_version(&self) -> Result<String, DeviceError>;

    /// Operating system version.
    async fn os_version(&self) -> Result<String, DeviceError>;

    /// Hardware model name.
    async fn model(&self) -> Result<String, DeviceError>;

    /// Unique identifier of this application installation.
    async fn unique_id(&self) -> Result<String, DeviceError>;

    /// Current IP address.
    async fn ip_address(&self) -> Result<String, DeviceError>;

    /// Battery charge, `0.0..=1.0`.
    async fn battery(&self) -> Result<f64, DeviceError>;

    /// Active network kind.
    async fn connection_type(&self) -> Result<ConnectionType, DeviceError>;

    /// Signal strength of the active connection, `0.0..=1.0`.
    async fn connection_strength(&self) -> Result<f64, DeviceError>;
}

/// Current navigation position, read synchronously at the track call site.
///
/// The view name reflects transient state that keeps changing after the
/// tracking call returns, so it cannot wait for the background enrichment.
pub trait ViewState: Send + Sync {
    /// Name of the view the user is currently on, if any.
    fn current_view(&self) -> Option<String>;
}

/// A `ViewState` for processes without navigation (services, tests).
pub struct NoViewState;

impl ViewState for NoViewState {
    fn current_view(&self) -> Option<String> {
        None
    }
}
