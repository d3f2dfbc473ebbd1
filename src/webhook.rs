//! HTTP transport: liveness check and the webhook the platform pushes to.
//!
//! The webhook handler only parses and enqueues; conversation logic runs on
//! the dispatcher side of the [`UpdateQueue`].

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use teloxide::types::Update;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::bot::UpdateQueue;

pub const LIVENESS_BODY: &str = "Bot is running!";
pub const ACCEPTED_BODY: &str = "OK";
pub const REJECTED_BODY: &str = "ERROR";

pub fn router(queue: UpdateQueue) -> Router {
    Router::new()
        .route("/", get(liveness_handler))
        .route("/webhook", post(webhook_handler))
        .with_state(queue)
}

/// Serve the router on an already bound listener until the server stops
pub async fn serve(listener: TcpListener, queue: UpdateQueue) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Webhook server listening on http://{}", addr);
    }
    axum::serve(listener, router(queue)).await
}

async fn liveness_handler() -> &'static str {
    LIVENESS_BODY
}

async fn webhook_handler(State(queue): State<UpdateQueue>, body: Bytes) -> (StatusCode, &'static str) {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "Rejected malformed webhook payload");
            return (StatusCode::INTERNAL_SERVER_ERROR, REJECTED_BODY);
        }
    };

    let update_id = update.id.0;
    match queue.try_enqueue(update) {
        Ok(()) => {
            debug!(update_id, "Webhook update queued");
            (StatusCode::OK, ACCEPTED_BODY)
        }
        Err(e) => {
            warn!(update_id, error = %e, "Rejected webhook update");
            (StatusCode::INTERNAL_SERVER_ERROR, REJECTED_BODY)
        }
    }
}
