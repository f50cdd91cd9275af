use crate::domain::DeviceResolver;
use crate::xml::StuStreamParser;
use common::domain::{
    AppendMessageRepoInput, LiveUpdate, LiveUpdatePublisher, MessageStore, Report,
};
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

/// Timestamp rendering used by the live dashboard events
const LIVE_TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Tunables for the ingestion pipeline
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Number of worker tasks draining the job queue
    pub worker_count: usize,
    /// Job queue capacity; a full queue blocks the feed parser
    pub queue_capacity: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            worker_count: 10,
            queue_capacity: 100,
        }
    }
}

/// Outcome of one ingestion request, consumed by the response builder
#[derive(Debug, Clone, Default)]
pub struct IngestOutcome {
    /// Correlation identifier from the envelope's root attributes
    pub message_id: Option<String>,
    /// Reports handed to the worker pool
    pub accepted: usize,
    /// Reports durably stored
    pub persisted: usize,
    /// Reports lost to resolution or persistence failures
    pub dropped: usize,
    /// Parse failure that truncated the feed, if any
    pub parse_error: Option<String>,
}

impl IngestOutcome {
    pub fn succeeded(&self) -> bool {
        self.parse_error.is_none()
    }
}

/// The ingestion pipeline: one parser task feeding a bounded job queue
/// drained by a fixed pool of persistence workers
///
/// The queue is the only synchronization point between the parser and the
/// workers; a full queue blocks the parser, bounding in-flight memory
/// regardless of feed size.
pub struct IngestService {
    resolver: Arc<DeviceResolver>,
    store: Arc<dyn MessageStore>,
    publisher: Arc<dyn LiveUpdatePublisher>,
    config: IngestConfig,
}

impl IngestService {
    pub fn new(
        resolver: Arc<DeviceResolver>,
        store: Arc<dyn MessageStore>,
        publisher: Arc<dyn LiveUpdatePublisher>,
        config: IngestConfig,
    ) -> Self {
        Self {
            resolver,
            store,
            publisher,
            config,
        }
    }

    /// Run one feed document through the pipeline
    ///
    /// Returns only after the queue is closed and every worker has drained
    /// and exited, so the acknowledgment is never sent before each accepted
    /// report has been attempted against the store.
    #[instrument(skip(self, body))]
    pub async fn ingest<R>(&self, body: R) -> IngestOutcome
    where
        R: AsyncBufRead + Unpin + Send,
    {
        let (tx, rx) = mpsc::channel::<Report>(self.config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.worker_count {
            let rx = Arc::clone(&rx);
            let resolver = Arc::clone(&self.resolver);
            let store = Arc::clone(&self.store);
            let publisher = Arc::clone(&self.publisher);
            workers
                .spawn(async move { run_worker(worker_id, rx, resolver, store, publisher).await });
        }
        // The workers hold the only remaining receiver handles: once they
        // have all exited, send fails instead of blocking on a queue that
        // nobody drains
        drop(rx);

        let mut parser = StuStreamParser::new(body);
        let mut accepted = 0usize;
        while let Some(report) = parser.next_report().await {
            // send fails only when every worker has exited; nothing is left
            // to drain the remainder of the feed
            if tx.send(report).await.is_err() {
                error!("job queue closed early, remaining reports are dropped");
                break;
            }
            accepted += 1;
        }
        drop(tx);

        let mut persisted = 0usize;
        let mut dropped = 0usize;
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(stats) => {
                    persisted += stats.persisted;
                    dropped += stats.dropped;
                }
                Err(e) => error!(error = %e, "ingest worker panicked"),
            }
        }

        // Reports queued but never pulled (all workers gone) count as lost
        let lost = accepted.saturating_sub(persisted + dropped);
        if lost > 0 {
            warn!(lost, "reports accepted but never attempted");
        }

        let outcome = IngestOutcome {
            message_id: parser.message_id().map(str::to_owned),
            accepted,
            persisted,
            dropped: dropped + lost,
            parse_error: parser.error().map(|e| e.to_string()),
        };
        info!(
            accepted = outcome.accepted,
            persisted = outcome.persisted,
            dropped = outcome.dropped,
            parse_failed = !outcome.succeeded(),
            "feed drained"
        );
        outcome
    }
}

struct WorkerStats {
    persisted: usize,
    dropped: usize,
}

async fn run_worker(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<Report>>>,
    resolver: Arc<DeviceResolver>,
    store: Arc<dyn MessageStore>,
    publisher: Arc<dyn LiveUpdatePublisher>,
) -> WorkerStats {
    let mut stats = WorkerStats {
        persisted: 0,
        dropped: 0,
    };

    let writer = match store.writer().await {
        Ok(writer) => writer,
        Err(e) => {
            error!(worker_id, error = %e, "failed to acquire message writer, worker exiting");
            return stats;
        }
    };

    loop {
        let report = { jobs.lock().await.recv().await };
        let Some(report) = report else { break };

        let device_id = match resolver.resolve(&report.esn).await {
            Ok(id) => id,
            Err(e) => {
                warn!(worker_id, esn = %report.esn, error = %e, "device resolution failed, report dropped");
                stats.dropped += 1;
                continue;
            }
        };

        let message = match writer
            .append(AppendMessageRepoInput {
                device_id,
                payload: report.payload,
            })
            .await
        {
            Ok(message) => message,
            Err(e) => {
                warn!(worker_id, device_id, error = %e, "message insert failed, report dropped");
                stats.dropped += 1;
                continue;
            }
        };
        stats.persisted += 1;

        publisher.try_publish(LiveUpdate::NewMessage {
            message_id: message.message_id,
            device_id,
            esn: report.esn,
            payload: message.payload,
            received_at: message.received_at.format(LIVE_TIMESTAMP_FORMAT).to_string(),
        });
    }

    debug!(
        worker_id,
        persisted = stats.persisted,
        dropped = stats.dropped,
        "worker drained"
    );
    stats
}
