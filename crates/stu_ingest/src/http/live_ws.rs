use crate::http::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

/// Live dashboard feed: pushes each persisted message as a JSON event
pub async fn live_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_subscriber(socket, state))
}

async fn run_subscriber(mut socket: WebSocket, state: AppState) {
    let mut updates = state.live.subscribe();
    debug!("live subscriber connected");

    loop {
        match updates.recv().await {
            Ok(update) => {
                let event = match serde_json::to_string(&update) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "failed to encode live update");
                        continue;
                    }
                };
                if socket.send(Message::Text(event.into())).await.is_err() {
                    debug!("live subscriber disconnected");
                    break;
                }
            }
            // A slow subscriber skips what it missed instead of stalling
            // the hub
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "live subscriber lagging, updates skipped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
