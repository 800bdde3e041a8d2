use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use cc_gw_core::config::{
    AdminAuthConfig, ConfigDocument, ConfigStore, CredentialMode, ProviderConfig, WireFamily,
};
use cc_gw_gateway::app::{build_router, AppState};
use cc_gw_store::GatewayDb;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_provider(base_url: String) -> ProviderConfig {
    ProviderConfig {
        id: "kimi".to_string(),
        label: "Kimi".to_string(),
        wire_family: WireFamily::Kimi,
        base_url,
        credential: "test-secret".to_string(),
        credential_mode: Some(CredentialMode::ApiKey),
        extra_headers: HashMap::new(),
        default_model: Some("kimi-k2".to_string()),
        models: Vec::new(),
        supports_tools: true,
    }
}

fn test_state(doc: ConfigDocument) -> Arc<AppState> {
    let dir = tempfile::tempdir().unwrap();
    let config = ConfigStore::load(dir.path().join("config.json")).unwrap();
    config.update(doc).unwrap();

    let db = Arc::new(GatewayDb::open_in_memory().unwrap());
    let db_path = dir.path().join("gateway.db");
    Arc::new(AppState::new(Arc::new(config), db, db_path))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_provider_count_and_uptime() {
    let mut doc = ConfigDocument::default();
    doc.providers.push(test_provider("http://127.0.0.1:9".to_string()));
    let state = test_state(doc);
    let router = build_router(state);

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["providers"], 1);
    assert_eq!(body["active_requests"], 0);
}

#[tokio::test]
async fn anthropic_messages_happy_path_against_openai_shaped_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "hello there"},
                "finish_reason": "stop",
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2},
        })))
        .mount(&server)
        .await;

    let mut doc = ConfigDocument::default();
    doc.providers.push(test_provider(server.uri()));
    let state = test_state(doc);
    let created = state.keys.create("test key", None, None).unwrap();
    let router = build_router(state);

    let request = Request::post("/anthropic/v1/messages")
        .header("authorization", format!("Bearer {}", created.plaintext))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "model": "claude-3-5-sonnet-latest",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false,
            })
            .to_string(),
        ))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["content"][0]["text"], "hello there");
    assert_eq!(body["stop_reason"], "end_turn");
}

#[tokio::test]
async fn missing_bearer_token_is_rejected() {
    let mut doc = ConfigDocument::default();
    doc.providers.push(test_provider("http://127.0.0.1:9".to_string()));
    let state = test_state(doc);
    let router = build_router(state);

    let request = Request::post("/anthropic/v1/messages")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"model": "claude-3-5-sonnet-latest", "messages": []}).to_string(),
        ))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_secret_is_denied_without_touching_upstream() {
    let server = MockServer::start().await;
    // No mock registered: if the request reaches upstream this panics wiremock-side.

    let mut doc = ConfigDocument::default();
    doc.providers.push(test_provider(server.uri()));
    let state = test_state(doc);
    state.keys.create("real key", None, None).unwrap();
    let router = build_router(state);

    let request = Request::post("/anthropic/v1/messages")
        .header("authorization", "Bearer sk-gw-totally-wrong")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"model": "claude-3-5-sonnet-latest", "messages": [{"role": "user", "content": "hi"}]})
                .to_string(),
        ))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unknown_custom_endpoint_path_is_404() {
    let state = test_state(ConfigDocument::default());
    let router = build_router(state);

    let response = router
        .oneshot(Request::post("/no/such/route").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_routes_require_session_when_enabled() {
    let hashed = cc_gw_auth::password::hash_password("correct horse battery staple");
    let mut doc = ConfigDocument::default();
    doc.admin_auth = AdminAuthConfig {
        enabled: true,
        username: Some("admin".to_string()),
        password_hash: Some(hashed.hash_b64),
        password_salt: Some(hashed.salt_b64),
    };
    let state = test_state(doc);
    let router = build_router(state);

    let unauthenticated = router
        .clone()
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(unauthenticated.status(), StatusCode::UNAUTHORIZED);

    let login = router
        .clone()
        .oneshot(
            Request::post("/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"username": "admin", "password": "correct horse battery staple"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::OK);
    let cookie = login
        .headers()
        .get(axum::http::header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let authenticated = router
        .oneshot(
            Request::get("/api/status")
                .header(axum::http::header::COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(authenticated.status(), StatusCode::OK);
}
