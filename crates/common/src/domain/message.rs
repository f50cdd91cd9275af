use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable telemetry message row
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub message_id: i64,
    pub device_id: i64,
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

/// Input for appending one message under a resolved device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendMessageRepoInput {
    pub device_id: i64,
    pub payload: String,
}

/// Per-worker sink handle
///
/// Implementations keep whatever per-connection state the append path
/// reuses (checked-out connection, prepared statement). A writer is owned
/// by exactly one worker and is never shared.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageWriter: Send + Sync {
    /// Append one message row; `received_at` is assigned by the writer at
    /// persistence time, not parse time
    async fn append(&self, input: AppendMessageRepoInput) -> DomainResult<Message>;
}

/// Factory handing each worker its own writer
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn writer(&self) -> DomainResult<Box<dyn MessageWriter>>;
}
