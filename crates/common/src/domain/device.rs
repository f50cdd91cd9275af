use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Device entity registered for an ESN seen on the telemetry feed
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub device_id: i64,
    pub esn: String,
    pub device_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Input for registering a device on a first-seen ESN
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateDeviceRepoInput {
    pub esn: String,
}

/// Repository trait for device persistence operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Look up a device by its external identifier
    async fn find_by_esn(&self, esn: &str) -> DomainResult<Option<Device>>;

    /// Register a new device for an ESN
    ///
    /// Two callers racing on the same never-before-seen ESN must converge
    /// on a single row: implementations resolve the store-level race via
    /// the unique constraint on the external identifier.
    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device>;
}
