use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use cc_gw_auth::WebAuth;
use cc_gw_core::config::ConfigStore;
use cc_gw_keys::KeyRegistry;
use cc_gw_providers::{Connector, HttpConnector};
use cc_gw_store::maintenance::Maintenance;
use cc_gw_store::GatewayDb;

use crate::http;

/// Central shared state, handed to every Axum handler as `Arc<AppState>`.
/// One per process; owns the handles to every subsystem crate.
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub db: Arc<GatewayDb>,
    pub keys: Arc<KeyRegistry>,
    pub web_auth: Arc<WebAuth>,
    pub connector: Arc<dyn Connector>,
    pub maintenance: Arc<Maintenance>,
    pub db_path: PathBuf,
    pub started_at: Instant,
    /// In-flight request count, surfaced by `/health` (spec §4.12).
    pub active_requests: AtomicU64,
}

impl AppState {
    pub fn new(config: Arc<ConfigStore>, db: Arc<GatewayDb>, db_path: PathBuf) -> Self {
        let keys = Arc::new(KeyRegistry::new(db.clone()));
        let web_auth = Arc::new(WebAuth::new(config.clone()));
        let connector: Arc<dyn Connector> = Arc::new(HttpConnector::new());
        let maintenance = Arc::new(Maintenance::new(db.clone(), config.clone()));

        Self {
            config,
            db,
            keys,
            web_auth,
            connector,
            maintenance,
            db_path,
            started_at: Instant::now(),
            active_requests: AtomicU64::new(0),
        }
    }

    pub fn begin_request(&self) -> RequestGuard<'_> {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
        RequestGuard { state: self }
    }
}

/// Decrements `active_requests` on drop, so every exit path (success,
/// error, client disconnect) is accounted for without duplicating the
/// decrement at each return site.
pub struct RequestGuard<'a> {
    state: &'a AppState,
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        self.state.active_requests.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Assemble the full Axum router: the three default model endpoints, a
/// fallback that resolves config-driven custom endpoint aliases, the
/// `/api/*` management surface, `/auth/*`, and `/health`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.get().max_body_bytes;

    let api = Router::new()
        .route("/config", get(http::management::get_config).put(http::management::put_config))
        .route("/status", get(http::management::status))
        .route("/stats/overview", get(http::management::stats_overview))
        .route("/stats/daily", get(http::management::stats_daily))
        .route("/stats/model", get(http::management::stats_model))
        .route("/logs", get(http::management::list_logs))
        .route("/logs/cleanup", post(http::management::cleanup_logs))
        .route("/logs/{id}", get(http::management::get_log))
        .route(
            "/keys",
            get(http::management::list_keys).post(http::management::create_key),
        )
        .route("/keys/{id}", delete(http::management::delete_key))
        .route("/events", get(http::management::list_events))
        .route("/db/info", get(http::management::db_info))
        .route("/db/compact", post(http::management::db_compact))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::require_admin_session,
        ));

    Router::new()
        .route("/health", get(http::health::health))
        .route("/auth/login", post(http::auth::login))
        .route("/auth/logout", post(http::auth::logout))
        .route("/auth/session", get(http::auth::session))
        .route("/anthropic/v1/messages", post(http::model::anthropic_messages))
        .route("/openai/v1/chat/completions", post(http::model::openai_chat_completions))
        .route("/openai/v1/responses", post(http::model::openai_responses))
        .nest("/api", api)
        .fallback(http::model::custom_endpoint)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
