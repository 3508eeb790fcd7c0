//! The webhook listener: a small axum app in front of the bounded event
//! queue. The HTTP layer acknowledges receipt; handling is asynchronous.

use std::{net::SocketAddr, path::PathBuf};

use {
    axum::{
        Router,
        body::Bytes,
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    tokio::{net::TcpListener, sync::mpsc},
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
};

use prism_common::Result;

use crate::event::{BoardEventPayload, RouterEvent};

#[derive(Clone)]
struct ListenerState {
    tx: mpsc::Sender<RouterEvent>,
    project_dir: PathBuf,
}

/// Build the listener app (shared between production startup and tests).
pub fn build_listener_app(tx: mpsc::Sender<RouterEvent>, project_dir: PathBuf) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", post(webhook_handler))
        .with_state(ListenerState { tx, project_dir })
}

async fn health_handler(State(state): State<ListenerState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "project_dir": state.project_dir.display().to_string(),
    }))
}

/// 202 on enqueue, 400 on malformed payloads, 503 when the queue is full so
/// the sender retries.
async fn webhook_handler(State(state): State<ListenerState>, body: Bytes) -> impl IntoResponse {
    let payload: BoardEventPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "rejected malformed webhook payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": format!("malformed payload: {e}") })),
            );
        },
    };

    match state.tx.try_send(RouterEvent::Board(payload)) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "enqueued": true })),
        ),
        Err(e) => {
            warn!(error = %e, "event queue full, shedding webhook");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": "event queue full, retry later" })),
            )
        },
    }
}

/// Serve the listener until the shutdown token fires.
pub async fn serve(addr: SocketAddr, app: Router, shutdown: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "webhook listener up");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
