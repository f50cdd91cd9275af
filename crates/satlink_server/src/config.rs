use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit structured JSON log lines
    #[serde(default = "default_log_json")]
    pub log_json: bool,

    // HTTP configuration
    /// HTTP listen host
    #[serde(default = "default_http_host")]
    pub http_host: String,

    /// HTTP listen port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    // PostgreSQL configuration
    /// PostgreSQL host
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    /// PostgreSQL port
    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    /// PostgreSQL database name
    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    /// PostgreSQL username
    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    /// PostgreSQL password
    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Maximum pooled connections. Each ingestion worker pins one
    /// connection for its writer and device resolution checks out another
    /// on cache misses, so keep this above the worker count — never equal
    /// to it
    #[serde(default = "default_postgres_pool_size")]
    pub postgres_pool_size: usize,

    // Ingestion pipeline configuration
    /// Worker tasks draining the job queue per feed request
    #[serde(default = "default_ingest_worker_count")]
    pub ingest_worker_count: usize,

    /// Job queue capacity; a full queue blocks the feed parser
    #[serde(default = "default_ingest_queue_capacity")]
    pub ingest_queue_capacity: usize,

    /// Live update fan-out buffer per subscriber
    #[serde(default = "default_live_update_capacity")]
    pub live_update_capacity: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_json() -> bool {
    true
}

// HTTP defaults
fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    5000
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "satlink".to_string()
}

fn default_postgres_username() -> String {
    "satlink".to_string()
}

fn default_postgres_password() -> String {
    "satlink".to_string()
}

fn default_postgres_pool_size() -> usize {
    20
}

// Ingestion defaults
fn default_ingest_worker_count() -> usize {
    10
}

fn default_ingest_queue_capacity() -> usize {
    100
}

fn default_live_update_capacity() -> usize {
    256
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("SATLINK"))
            .build()?
            .try_deserialize()
    }
}
