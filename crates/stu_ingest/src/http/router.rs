use crate::domain::IngestService;
use crate::http::{live_ws, stu_listener};
use crate::live::LiveUpdateHub;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state for the HTTP surface
#[derive(Clone)]
pub struct AppState {
    pub ingest: Arc<IngestService>,
    pub live: LiveUpdateHub,
}

/// Builds the service router: the feed listener (write-only), the live
/// WebSocket and a liveness probe
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/globalstar/listener", post(stu_listener))
        .route("/live", get(live_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
