use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use cc_gw_auth::error::AuthError;
use cc_gw_auth::session::session_cookie;
use serde::Deserialize;

use crate::app::AppState;
use crate::error::Result;
use crate::middleware::SESSION_COOKIE;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<serde_json::Value>)> {
    let session = state.web_auth.login(&req.username, &req.password)?;
    let jar = jar.add(session_cookie(&session.token));
    Ok((
        jar,
        Json(serde_json::json!({"username": session.username, "expires_at": session.expires_at})),
    ))
}

/// POST /auth/logout
pub async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Json<serde_json::Value>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.web_auth.logout(cookie.value());
    }
    let jar = jar.remove(Cookie::from(SESSION_COOKIE));
    (jar, Json(serde_json::json!({"ok": true})))
}

/// GET /auth/session
pub async fn session(State(state): State<Arc<AppState>>, jar: CookieJar) -> Result<Json<serde_json::Value>> {
    let token = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()).ok_or(AuthError::SessionExpired)?;
    let session = state.web_auth.validate(&token).ok_or(AuthError::SessionExpired)?;
    Ok(Json(serde_json::json!({"username": session.username, "expires_at": session.expires_at})))
}
