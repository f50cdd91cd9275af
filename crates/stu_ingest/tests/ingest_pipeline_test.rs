use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::domain::{
    AppendMessageRepoInput, CreateDeviceRepoInput, Device, DeviceRepository, DomainError,
    DomainResult, LiveUpdate, LiveUpdatePublisher, Message, MessageStore, MessageWriter,
};
use http_body_util::BodyExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stu_ingest::domain::{DeviceResolver, IngestConfig, IngestService};
use stu_ingest::http::{app_router, AppState};
use stu_ingest::live::LiveUpdateHub;
use tokio::sync::Mutex;
use tower::ServiceExt;

// ---- in-memory collaborators -------------------------------------------

#[derive(Default)]
struct InMemoryDeviceRepository {
    devices: Mutex<HashMap<String, Device>>,
    next_id: AtomicI64,
    find_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

#[async_trait]
impl DeviceRepository for InMemoryDeviceRepository {
    async fn find_by_esn(&self, esn: &str) -> DomainResult<Option<Device>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.devices.lock().await.get(esn).cloned())
    }

    async fn create_device(&self, input: CreateDeviceRepoInput) -> DomainResult<Device> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut devices = self.devices.lock().await;
        if let Some(existing) = devices.get(&input.esn) {
            return Ok(existing.clone());
        }
        let device = Device {
            device_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            esn: input.esn.clone(),
            device_name: None,
            created_at: None,
        };
        devices.insert(input.esn, device.clone());
        Ok(device)
    }
}

#[derive(Default, Clone)]
struct InMemoryMessageStore {
    messages: Arc<Mutex<Vec<Message>>>,
    next_id: Arc<AtomicI64>,
    fail_appends: Arc<AtomicBool>,
}

impl InMemoryMessageStore {
    async fn stored(&self) -> Vec<Message> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn writer(&self) -> DomainResult<Box<dyn MessageWriter>> {
        Ok(Box::new(InMemoryMessageWriter {
            messages: Arc::clone(&self.messages),
            next_id: Arc::clone(&self.next_id),
            fail_appends: Arc::clone(&self.fail_appends),
        }))
    }
}

struct InMemoryMessageWriter {
    messages: Arc<Mutex<Vec<Message>>>,
    next_id: Arc<AtomicI64>,
    fail_appends: Arc<AtomicBool>,
}

#[async_trait]
impl MessageWriter for InMemoryMessageWriter {
    async fn append(&self, input: AppendMessageRepoInput) -> DomainResult<Message> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(DomainError::RepositoryError(anyhow::anyhow!(
                "store unavailable"
            )));
        }
        let message = Message {
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            device_id: input.device_id,
            payload: input.payload,
            received_at: chrono::Utc::now(),
        };
        self.messages.lock().await.push(message.clone());
        Ok(message)
    }
}

struct NullPublisher;

impl LiveUpdatePublisher for NullPublisher {
    fn try_publish(&self, _update: LiveUpdate) {}
}

/// Store whose writers can never be acquired, as during a backing-store
/// outage
struct UnavailableMessageStore;

#[async_trait]
impl MessageStore for UnavailableMessageStore {
    async fn writer(&self) -> DomainResult<Box<dyn MessageWriter>> {
        Err(DomainError::RepositoryError(anyhow::anyhow!(
            "store unavailable"
        )))
    }
}

// ---- helpers ------------------------------------------------------------

struct Pipeline {
    devices: Arc<InMemoryDeviceRepository>,
    store: InMemoryMessageStore,
    service: IngestService,
}

fn pipeline(config: IngestConfig) -> Pipeline {
    let devices = Arc::new(InMemoryDeviceRepository::default());
    let store = InMemoryMessageStore::default();
    let service = IngestService::new(
        Arc::new(DeviceResolver::new(devices.clone())),
        Arc::new(store.clone()),
        Arc::new(NullPublisher),
        config,
    );
    Pipeline {
        devices,
        store,
        service,
    }
}

fn feed(message_id: Option<&str>, reports: &[(&str, &str)]) -> String {
    let mut doc = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    match message_id {
        Some(id) => doc.push_str(&format!("<stuMessages messageID=\"{id}\">")),
        None => doc.push_str("<stuMessages>"),
    }
    for (esn, payload) in reports {
        doc.push_str(&format!(
            "<stuMessage><esn>{esn}</esn><payload>{payload}</payload></stuMessage>"
        ));
    }
    doc.push_str("</stuMessages>");
    doc
}

// ---- pipeline properties -------------------------------------------------

#[tokio::test]
async fn every_report_is_persisted_regardless_of_pool_shape() {
    let reports: Vec<(String, String)> = (0..25)
        .map(|i| (format!("0-{i:06}"), format!("0x{i:02X}")))
        .collect();
    let borrowed: Vec<(&str, &str)> = reports
        .iter()
        .map(|(e, p)| (e.as_str(), p.as_str()))
        .collect();
    let doc = feed(Some("bulk-1"), &borrowed);

    for (worker_count, queue_capacity) in [(1, 1), (4, 2), (10, 100)] {
        let p = pipeline(IngestConfig {
            worker_count,
            queue_capacity,
        });

        let outcome = p.service.ingest(doc.as_bytes()).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.accepted, 25);
        assert_eq!(outcome.persisted, 25);
        assert_eq!(outcome.dropped, 0);
        assert_eq!(p.store.stored().await.len(), 25);
    }
}

#[tokio::test]
async fn repeated_esn_shares_a_single_device() {
    let p = pipeline(IngestConfig::default());
    let doc = feed(Some("dup-1"), &[("111", "first"), ("111", "second")]);

    let outcome = p.service.ingest(doc.as_bytes()).await;

    assert_eq!(outcome.persisted, 2);
    assert_eq!(p.devices.devices.lock().await.len(), 1);

    let stored = p.store.stored().await;
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].device_id, stored[1].device_id);
}

#[tokio::test]
async fn cached_esn_is_resolved_without_store_round_trips() {
    let p = pipeline(IngestConfig::default());
    let doc = feed(
        None,
        &[("111", "a"), ("111", "b"), ("111", "c"), ("111", "d"), ("111", "e")],
    );

    let outcome = p.service.ingest(doc.as_bytes()).await;

    assert_eq!(outcome.persisted, 5);
    // One miss goes to the store, every later report hits the cache
    assert_eq!(p.devices.find_calls.load(Ordering::SeqCst), 1);
    assert_eq!(p.devices.create_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn truncated_feed_persists_completed_reports_and_fails_the_outcome() {
    let p = pipeline(IngestConfig::default());
    let mut doc = feed(Some("trunc-1"), &[("111", "a"), ("222", "b")]);
    // Drop the closing root tag and append a half-open report
    doc.truncate(doc.len() - "</stuMessages>".len());
    doc.push_str("<stuMessage><esn>333");

    let outcome = p.service.ingest(doc.as_bytes()).await;

    assert!(!outcome.succeeded());
    assert_eq!(outcome.persisted, 2);
    assert_eq!(outcome.message_id.as_deref(), Some("trunc-1"));
    assert_eq!(p.store.stored().await.len(), 2);
}

#[tokio::test]
async fn store_failures_drop_reports_without_aborting_the_batch() {
    let p = pipeline(IngestConfig::default());
    p.store.fail_appends.store(true, Ordering::SeqCst);
    let doc = feed(Some("down-1"), &[("111", "a"), ("222", "b"), ("333", "c")]);

    let outcome = p.service.ingest(doc.as_bytes()).await;

    // The feed itself was well-formed; only persistence failed
    assert!(outcome.succeeded());
    assert_eq!(outcome.accepted, 3);
    assert_eq!(outcome.persisted, 0);
    assert_eq!(outcome.dropped, 3);
    assert!(p.store.stored().await.is_empty());
}

#[tokio::test]
async fn writer_acquisition_failure_never_hangs_the_producer() {
    // Every worker exits before pulling a job; with a feed larger than the
    // queue capacity the parser must hit a closed queue, not a full one
    let service = IngestService::new(
        Arc::new(DeviceResolver::new(Arc::new(
            InMemoryDeviceRepository::default(),
        ))),
        Arc::new(UnavailableMessageStore),
        Arc::new(NullPublisher),
        IngestConfig {
            worker_count: 2,
            queue_capacity: 1,
        },
    );

    let reports: Vec<(String, String)> = (0..10)
        .map(|i| (format!("0-{i:06}"), "p".to_string()))
        .collect();
    let borrowed: Vec<(&str, &str)> = reports
        .iter()
        .map(|(e, p)| (e.as_str(), p.as_str()))
        .collect();
    let doc = feed(Some("outage-1"), &borrowed);

    let outcome = tokio::time::timeout(Duration::from_secs(5), service.ingest(doc.as_bytes()))
        .await
        .expect("a dead worker pool must not block the feed parser");

    assert!(outcome.succeeded());
    assert_eq!(outcome.persisted, 0);
    assert_eq!(outcome.dropped, outcome.accepted);
}

#[tokio::test]
async fn zero_subscribers_never_stall_ingestion() {
    let devices = Arc::new(InMemoryDeviceRepository::default());
    let store = InMemoryMessageStore::default();
    let hub = LiveUpdateHub::new(4);
    let service = IngestService::new(
        Arc::new(DeviceResolver::new(devices)),
        Arc::new(store.clone()),
        Arc::new(hub),
        IngestConfig::default(),
    );

    let reports: Vec<(String, String)> = (0..50)
        .map(|i| (format!("0-{i:06}"), "p".to_string()))
        .collect();
    let borrowed: Vec<(&str, &str)> = reports
        .iter()
        .map(|(e, p)| (e.as_str(), p.as_str()))
        .collect();
    let doc = feed(None, &borrowed);

    let outcome = tokio::time::timeout(Duration::from_secs(5), service.ingest(doc.as_bytes()))
        .await
        .expect("ingestion must not block on an empty subscriber set");

    assert_eq!(outcome.persisted, 50);
}

#[tokio::test]
async fn subscribers_observe_persisted_messages() {
    let devices = Arc::new(InMemoryDeviceRepository::default());
    let store = InMemoryMessageStore::default();
    let hub = LiveUpdateHub::new(16);
    let mut updates = hub.subscribe();
    let service = IngestService::new(
        Arc::new(DeviceResolver::new(devices)),
        Arc::new(store.clone()),
        Arc::new(hub),
        IngestConfig::default(),
    );

    let doc = feed(None, &[("0-555555", "0xAB")]);
    let outcome = service.ingest(doc.as_bytes()).await;
    assert_eq!(outcome.persisted, 1);

    let LiveUpdate::NewMessage { esn, payload, .. } = updates.recv().await.unwrap();
    assert_eq!(esn, "0-555555");
    assert_eq!(payload, "0xAB");
}

// ---- HTTP surface --------------------------------------------------------

fn test_app() -> (axum::Router, InMemoryMessageStore) {
    let devices = Arc::new(InMemoryDeviceRepository::default());
    let store = InMemoryMessageStore::default();
    let live = LiveUpdateHub::new(16);
    let ingest = Arc::new(IngestService::new(
        Arc::new(DeviceResolver::new(devices)),
        Arc::new(store.clone()),
        Arc::new(live.clone()),
        IngestConfig::default(),
    ));
    (app_router(AppState { ingest, live }), store)
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn listener_acknowledges_with_the_correlation_identifier() {
    let (app, store) = test_app();
    let doc = feed(Some("abc123"), &[("0-111111", "0xA1")]);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/globalstar/listener")
                .body(Body::from(doc))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/xml"
    );

    let body = body_text(response).await;
    assert!(body.contains("messageID=\"abc123\""));
    assert!(body.contains("correlationID=\"abc123\""));
    assert!(body.contains("<state>pass</state>"));
    assert!(body.contains("<stateMessage>Store OK</stateMessage>"));
    assert_eq!(store.stored().await.len(), 1);
}

#[tokio::test]
async fn malformed_feed_is_acknowledged_with_a_fail_state() {
    let (app, store) = test_app();
    let doc = "<stuMessages messageID=\"bad-1\">\
<stuMessage><esn>1</esn><payload>p</payload></stuMessage>\
<stuMessage><esn>2";

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/globalstar/listener")
                .body(Body::from(doc))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_text(response).await;
    assert!(body.contains("<state>fail</state>"));
    assert!(body.contains("messageID=\"bad-1\""));
    // The complete report before the break was still persisted
    assert_eq!(store.stored().await.len(), 1);
}

#[tokio::test]
async fn empty_body_is_acknowledged_with_the_placeholder_identifier() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/globalstar/listener")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains("messageID=\"00000000000000000000000000000000\""));
    assert!(body.contains("<state>pass</state>"));
}

#[tokio::test]
async fn listener_rejects_reads() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/globalstar/listener")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn healthz_answers_ok() {
    let (app, _store) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}
