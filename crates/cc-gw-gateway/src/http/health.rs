use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health — process status, provider count, active request count
/// and uptime (spec §4.12).
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let doc = state.config.get();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "providers": doc.providers.len(),
        "active_requests": state.active_requests.load(Ordering::Relaxed),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}
