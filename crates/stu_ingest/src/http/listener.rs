use crate::http::AppState;
use crate::xml::{DeliveryState, StuResponse};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::TryStreamExt;
use std::io;
use tokio::io::BufReader;
use tokio_util::io::StreamReader;
use tracing::{info, instrument};

/// Feed listener
///
/// Streams the XML body through the ingestion pipeline and answers with the
/// protocol acknowledgment. The response is only written once the job queue
/// has fully drained, so every report in the request has been attempted.
#[instrument(skip(state, body))]
pub async fn stu_listener(State(state): State<AppState>, body: Body) -> Response {
    let stream = body.into_data_stream().map_err(io::Error::other);
    let reader = BufReader::new(StreamReader::new(stream));

    let outcome = state.ingest.ingest(reader).await;
    info!(
        message_id = outcome.message_id.as_deref().unwrap_or(""),
        accepted = outcome.accepted,
        persisted = outcome.persisted,
        dropped = outcome.dropped,
        "feed request processed"
    );

    let (status, state_field, state_message) = match &outcome.parse_error {
        None => (StatusCode::OK, DeliveryState::Pass, "Store OK".to_string()),
        Some(reason) => (StatusCode::BAD_REQUEST, DeliveryState::Fail, reason.clone()),
    };

    let ack = StuResponse::new(outcome.message_id.as_deref(), state_field, state_message);
    (
        status,
        [(header::CONTENT_TYPE, "text/xml")],
        ack.to_xml(),
    )
        .into_response()
}
