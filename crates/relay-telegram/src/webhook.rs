//! Webhook HTTP server (axum).
//!
//! `POST /webhook` always answers `200 {"ok": true}` so the platform never
//! redelivers an update, even when the body is garbage or the relay failed.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{debug, warn};

use relay_core::{dispatch::Dispatcher, messaging::types::InboundUpdate};

pub fn routes(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/webhook", post(receive))
        .route("/", get(health))
        .route("/health", get(health))
        .with_state(dispatcher)
}

async fn receive(State(dispatcher): State<Arc<Dispatcher>>, body: Bytes) -> Json<Value> {
    match serde_json::from_slice::<InboundUpdate>(&body) {
        Ok(update) => {
            let update_id = update.update_id;
            let outcome = dispatcher.handle_update(update).await;
            debug!(update_id, ?outcome, "update handled");
        }
        Err(e) => warn!(error = %e, bytes = body.len(), "unparseable webhook body"),
    }
    Json(json!({ "ok": true }))
}

async fn health() -> &'static str {
    "ok"
}
