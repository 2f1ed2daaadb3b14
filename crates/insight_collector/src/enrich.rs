use crate::device::{DeviceError, DeviceInfo};
use crate::record::{normalize_version, session_id, ConnectionType, InsightRecord, DEFAULT_VERSION};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Default, Clone)]
struct IdentityState {
    user_id: Option<String>,
    full_name: Option<String>,
}

/// Process-wide mutable identity consumed by future enrichments.
///
/// The mutex only prevents a torn user-id/full-name pair; a record enriched
/// concurrently with an update may observe either the old or the new
/// identity, last writer wins.
#[derive(Debug, Default)]
pub(crate) struct Identity {
    state: Mutex<IdentityState>,
}

impl Identity {
    fn lock(&self) -> MutexGuard<'_, IdentityState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set(&self, user_id: Option<String>, full_name: Option<String>) {
        let mut state = self.lock();
        state.user_id = user_id;
        state.full_name = full_name;
    }

    fn snapshot(&self) -> (Option<String>, Option<String>) {
        let state = self.lock();
        (state.user_id.clone(), state.full_name.clone())
    }
}

/// Fills a bare record with device, session, and identity context.
///
/// Each lookup is awaited independently; a failure substitutes that field's
/// default and never aborts enrichment of the rest.
pub struct Enricher {
    device: Arc<dyn DeviceInfo>,
    identity: Identity,
}

impl Enricher {
    pub fn new(device: Arc<dyn DeviceInfo>) -> Self {
        Self {
            device,
            identity: Identity::default(),
        }
    }

    /// Updates the identity used by subsequent enrichments.
    pub fn set_identity(
        &self,
        user_id: impl Into<Option<String>>,
        full_name: impl Into<Option<String>>,
    ) {
        self.identity.set(user_id.into(), full_name.into());
    }

    /// Populates every enrichment field of `record`, assigning its id and
    /// timestamp.
    ///
    /// Field defaults on lookup failure: versions become `0.0.0.0`, string
    /// fields empty, numeric fields `None`, connection type `Unknown`.
    pub async fn enrich(&self, record: &mut InsightRecord) {
        record.created_at = Utc::now();
        record.id = Uuid::new_v4();

        record.app_version = version_or_default(self.device.app_version().await);
        record.battery_level = field_or_none("battery", self.device.battery().await);
        record.connection_strength =
            field_or_none("connection_strength", self.device.connection_strength().await);
        record.connection_type = field_or_none("connection_type", self.device.connection_type().await)
            .unwrap_or(ConnectionType::Unknown);
        record.device_identifier =
            field_or_none("unique_id", self.device.unique_id().await).unwrap_or_default();
        record.ip_address =
            field_or_none("ip_address", self.device.ip_address().await).unwrap_or_default();
        record.device_model =
            field_or_none("model", self.device.model().await).unwrap_or_default();
        record.os_version = version_or_default(self.device.os_version().await);

        record.session_id = session_id().to_string();
        let (user_id, full_name) = self.identity.snapshot();
        record.user_id = user_id;
        record.full_name = full_name;
    }
}

fn version_or_default(result: Result<String, DeviceError>) -> String {
    match result {
        Ok(raw) => normalize_version(&raw),
        Err(error) => {
            tracing::debug!(%error, "version lookup failed, defaulting");
            DEFAULT_VERSION.to_string()
        }
    }
}

fn field_or_none<T>(field: &str, result: Result<T, DeviceError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::debug!(field, %error, "context lookup failed, defaulting");
            None
        }
    }
}
