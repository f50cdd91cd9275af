use crate::domain::{
    AppendMessageRepoInput, DomainError, DomainResult, Message, MessageStore, MessageWriter,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::Utc;
use tokio_postgres::Statement;
use tracing::{debug, instrument};

/// PostgreSQL message sink
///
/// Hands each ingestion worker its own writer holding a checked-out pooled
/// connection and the INSERT prepared once for the worker's lifetime.
#[derive(Clone)]
pub struct PostgresMessageStore {
    client: PostgresClient,
}

impl PostgresMessageStore {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessageStore for PostgresMessageStore {
    async fn writer(&self) -> DomainResult<Box<dyn MessageWriter>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let statement = conn
            .prepare(
                "INSERT INTO messages (device_id, payload, received_at)
                 VALUES ($1, $2, $3)
                 RETURNING message_id",
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(Box::new(PostgresMessageWriter { conn, statement }))
    }
}

/// One worker's append handle; the statement stays prepared on `conn`
pub struct PostgresMessageWriter {
    conn: deadpool_postgres::Client,
    statement: Statement,
}

#[async_trait]
impl MessageWriter for PostgresMessageWriter {
    #[instrument(skip(self, input), fields(device_id = input.device_id))]
    async fn append(&self, input: AppendMessageRepoInput) -> DomainResult<Message> {
        let received_at = Utc::now();

        let row = self
            .conn
            .query_one(
                &self.statement,
                &[&input.device_id, &input.payload, &received_at],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let message_id: i64 = row.get(0);
        debug!(message_id, "stored message");

        Ok(Message {
            message_id,
            device_id: input.device_id,
            payload: input.payload,
            received_at,
        })
    }
}
