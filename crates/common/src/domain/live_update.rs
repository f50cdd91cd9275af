use serde::Serialize;

/// Event pushed to live subscribers after a message is persisted
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LiveUpdate {
    NewMessage {
        message_id: i64,
        device_id: i64,
        esn: String,
        payload: String,
        received_at: String,
    },
}

/// Best-effort broadcast sink for live updates
///
/// `try_publish` must never block and has no failure mode visible to the
/// caller: an absent or lagging subscriber drops the update (at-most-once).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait LiveUpdatePublisher: Send + Sync {
    fn try_publish(&self, update: LiveUpdate);
}
