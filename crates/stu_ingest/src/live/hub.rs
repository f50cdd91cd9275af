use common::domain::{LiveUpdate, LiveUpdatePublisher};
use tokio::sync::broadcast;
use tracing::debug;

/// Fan-out hub for live message updates
///
/// Backed by a broadcast channel: publishing never blocks, subscribers that
/// fall behind skip updates, and an empty subscriber set drops them.
#[derive(Clone)]
pub struct LiveUpdateHub {
    sender: broadcast::Sender<LiveUpdate>,
}

impl LiveUpdateHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveUpdate> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl LiveUpdatePublisher for LiveUpdateHub {
    fn try_publish(&self, update: LiveUpdate) {
        // send only fails when no subscriber exists, which is the normal
        // idle-dashboard state
        if self.sender.send(update).is_err() {
            debug!("no live subscribers, update dropped");
        }
    }
}
