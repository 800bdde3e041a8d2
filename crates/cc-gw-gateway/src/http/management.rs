use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use cc_gw_core::config::ConfigDocument;
use cc_gw_store::logs::LogFilters;
use cc_gw_store::payload;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::{ApiError, Result};

/// GET /api/config
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigDocument> {
    Json((*state.config.get()).clone())
}

/// PUT /api/config — 422 on invalid configuration, change not applied
/// (spec §7).
pub async fn put_config(State(state): State<Arc<AppState>>, Json(doc): Json<ConfigDocument>) -> Result<Json<ConfigDocument>> {
    let updated = state.config.update(doc)?;
    Ok(Json((*updated).clone()))
}

/// GET /api/status
pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let doc = state.config.get();
    Json(json!({
        "providers": doc.providers.len(),
        "active_requests": state.active_requests.load(Ordering::Relaxed),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}

/// GET /api/stats/overview — all-time totals rolled up from `daily_metrics`.
pub async fn stats_overview(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let rows = state.db.query_daily("0000-01-01")?;
    let mut requests = 0i64;
    let mut input_tokens = 0i64;
    let mut output_tokens = 0i64;
    for r in &rows {
        requests += r.request_count;
        input_tokens += r.input_tokens;
        output_tokens += r.output_tokens;
    }
    Ok(Json(json!({
        "requests": requests,
        "input_tokens": input_tokens,
        "output_tokens": output_tokens,
    })))
}

#[derive(Deserialize)]
pub struct DailyQuery {
    pub since: Option<String>,
}

/// GET /api/stats/daily?since=YYYY-MM-DD
pub async fn stats_daily(State(state): State<Arc<AppState>>, Query(q): Query<DailyQuery>) -> Result<Json<Value>> {
    let since = q.since.unwrap_or_else(|| "0000-01-01".to_string());
    let rows = state.db.query_daily(&since)?;
    Ok(Json(json!(rows)))
}

/// GET /api/stats/model — per-endpoint rollup (`daily_metrics` is keyed
/// by endpoint, not by model; model-level breakdowns live in
/// `request_logs` directly, so this reuses the same daily rows).
pub async fn stats_model(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let rows = state.db.query_daily("0000-01-01")?;
    Ok(Json(json!(rows)))
}

#[derive(Deserialize, Default)]
pub struct LogsQuery {
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    #[serde(rename = "apiKeyId")]
    pub api_key_id: Option<String>,
    pub status: Option<i32>,
    pub limit: Option<i64>,
    pub cursor: Option<i64>,
}

/// GET /api/logs
pub async fn list_logs(State(state): State<Arc<AppState>>, Query(q): Query<LogsQuery>) -> Result<Json<Value>> {
    let filters = LogFilters {
        since_ms: q.since,
        until_ms: q.until,
        provider: q.provider,
        model: q.model,
        endpoint: q.endpoint,
        api_key_id: q.api_key_id,
        status: q.status,
        limit: q.limit.unwrap_or(50),
        cursor: q.cursor,
    };
    let rows = state.db.query_logs(&filters)?;
    Ok(Json(json!(rows)))
}

/// GET /api/logs/{id} — includes decompressed prompt/response payloads
/// when persisted.
pub async fn get_log(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Result<Json<Value>> {
    let Some((row, blobs)) = state.db.get_log_with_payload(id)? else {
        return Err(ApiError::NotFound);
    };

    let payloads = match blobs {
        Some((prompt, response)) => {
            let prompt = payload::decompress(&prompt)?;
            let response = payload::decompress(&response)?;
            json!({
                "prompt": serde_json::from_slice::<Value>(&prompt).ok(),
                "response": serde_json::from_slice::<Value>(&response).ok(),
            })
        }
        None => Value::Null,
    };

    Ok(Json(json!({"log": row, "payload": payloads})))
}

#[derive(Deserialize)]
pub struct CleanupRequest {
    #[serde(rename = "olderThanMs")]
    pub older_than_ms: i64,
}

/// POST /api/logs/cleanup
pub async fn cleanup_logs(State(state): State<Arc<AppState>>, Json(req): Json<CleanupRequest>) -> Result<Json<Value>> {
    let deleted = state.db.delete_logs_before(req.older_than_ms)?;
    Ok(Json(json!({"deleted": deleted})))
}

/// GET /api/keys
pub async fn list_keys(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    Ok(Json(json!(state.keys.list()?)))
}

#[derive(Deserialize)]
pub struct CreateKeyRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "allowedEndpoints")]
    pub allowed_endpoints: Option<Vec<String>>,
}

/// POST /api/keys — the plaintext secret is returned exactly once.
pub async fn create_key(State(state): State<Arc<AppState>>, Json(req): Json<CreateKeyRequest>) -> Result<Json<Value>> {
    let key = state.keys.create(&req.name, req.description.as_deref(), req.allowed_endpoints)?;
    Ok(Json(json!({"id": key.id, "secret": key.plaintext})))
}

/// DELETE /api/keys/{id}
pub async fn delete_key(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Value>> {
    state.keys.revoke(&id)?;
    Ok(Json(json!({"ok": true})))
}

/// GET /api/events
pub async fn list_events(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let events = state.db.list_events(100)?;
    let rendered: Vec<Value> = events
        .into_iter()
        .map(|(id, event, created_at)| json!({"id": id, "event": event, "created_at": created_at}))
        .collect();
    Ok(Json(json!(rendered)))
}

/// GET /api/db/info
pub async fn db_info(State(state): State<Arc<AppState>>) -> Json<Value> {
    let size_bytes = std::fs::metadata(&state.db_path).map(|m| m.len()).unwrap_or(0);
    Json(json!({"path": state.db_path.display().to_string(), "size_bytes": size_bytes}))
}

/// POST /api/db/compact
pub async fn db_compact(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let report = state.maintenance.compact().await?;
    Ok(Json(json!(report)))
}
