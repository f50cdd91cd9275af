use crate::domain::{CreateDeviceRepoInput, Device, DeviceRepository, DomainError, DomainResult};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

/// PostgreSQL implementation of DeviceRepository
#[derive(Clone)]
pub struct PostgresDeviceRepository {
    client: PostgresClient,
}

impl PostgresDeviceRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

fn device_from_row(row: &tokio_postgres::Row) -> Device {
    Device {
        device_id: row.get(0),
        esn: row.get(1),
        device_name: row.get(2),
        created_at: row.get(3),
    }
}

#[async_trait]
impl DeviceRepository for PostgresDeviceRepository {
    #[instrument(skip(self))]
    async fn find_by_esn(&self, esn: &str) -> DomainResult<Option<Device>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT device_id, esn, device_name, created_at
                 FROM devices
                 WHERE esn = $1",
                &[&esn],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.as_ref().map(device_from_row))
    }

    #[instrument(skip(self, input), fields(esn = %input.esn))]
    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let result = conn
            .query_one(
                "INSERT INTO devices (esn)
                 VALUES ($1)
                 RETURNING device_id, esn, device_name, created_at",
                &[&input.esn],
            )
            .await;

        match result {
            Ok(row) => {
                debug!("registered device: {}", input.esn);
                Ok(device_from_row(&row))
            }
            Err(e) => {
                // PostgreSQL error code 23505 is unique_violation: another
                // writer registered this ESN first, so reuse its row
                if let Some(db_err) = e.as_db_error() {
                    if db_err.code().code() == "23505" {
                        warn!(esn = %input.esn, "concurrent device registration, reusing existing row");
                        return self
                            .find_by_esn(&input.esn)
                            .await?
                            .ok_or(DomainError::DeviceAlreadyExists(input.esn));
                    }
                }
                Err(DomainError::RepositoryError(e.into()))
            }
        }
    }
}
