use crate::postgres::PostgresClient;
use anyhow::{Context, Result};
use tracing::info;

const INIT_SQL: &str = include_str!("../../migrations/0001_init.sql");

/// Applies the telemetry schema at startup
///
/// Every statement is idempotent (IF NOT EXISTS), so repeated runs against
/// an initialized database are safe.
pub async fn run_migrations(client: &PostgresClient) -> Result<()> {
    let conn = client.get_connection().await?;
    conn.batch_execute(INIT_SQL)
        .await
        .context("Failed to apply schema migrations")?;
    info!("schema migrations applied");
    Ok(())
}
