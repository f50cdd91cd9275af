use common::domain::{CreateDeviceRepoInput, DeviceRepository, DomainResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Cache-aside resolver mapping ESNs to store-assigned device ids
///
/// Cache entries are only ever written from store results, so a present
/// entry is always correct. Entries are never evicted and live for the
/// process lifetime.
pub struct DeviceResolver {
    repository: Arc<dyn DeviceRepository>,
    cache: RwLock<HashMap<String, i64>>,
}

impl DeviceResolver {
    pub fn new(repository: Arc<dyn DeviceRepository>) -> Self {
        Self {
            repository,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve an ESN to its internal device id, registering the device on
    /// first sight
    ///
    /// Hits share the read lock; misses for the same ESN serialize on the
    /// write lock, so at most one caller per process goes to the store for
    /// a given identifier.
    #[instrument(skip(self))]
    pub async fn resolve(&self, esn: &str) -> DomainResult<i64> {
        if let Some(id) = self.cache.read().await.get(esn).copied() {
            return Ok(id);
        }

        let mut cache = self.cache.write().await;

        // Double check: another resolver may have finished the same
        // resolution while this caller waited for the lock
        if let Some(id) = cache.get(esn).copied() {
            return Ok(id);
        }

        if let Some(device) = self.repository.find_by_esn(esn).await? {
            cache.insert(esn.to_string(), device.device_id);
            return Ok(device.device_id);
        }

        let device = self
            .repository
            .create_device(CreateDeviceRepoInput {
                esn: esn.to_string(),
            })
            .await?;
        debug!(device_id = device.device_id, "registered device for new ESN");
        cache.insert(esn.to_string(), device.device_id);

        Ok(device.device_id)
    }
}
