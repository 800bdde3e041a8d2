use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;

use crate::app::AppState;
use crate::error::ApiError;

pub const SESSION_COOKIE: &str = "cc_gw_session";

/// Headers never relayed upstream verbatim (spec §6): transport-level
/// framing the connector's own `reqwest::Client` sets itself, plus the
/// caller's own `authorization`/`x-api-key`, which the provider
/// credential replaces.
const EXCLUDED: &[&str] = &[
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "authorization",
    "x-api-key",
];

/// Filter caller headers down to the set relayed upstream, in header
/// order, lowercased names.
pub fn forwardable_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(name, _)| !EXCLUDED.contains(&name.as_str().to_ascii_lowercase().as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// Extract the gateway key from `Authorization: Bearer <secret>`, falling
/// back to `x-api-key` for Anthropic-style clients (spec §6, §8 scenario
/// 4) when no bearer token is present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| headers.get("x-api-key").and_then(|v| v.to_str().ok()))
}

/// Gate on `/api/*`: a no-op when `admin_auth.enabled` is false (the
/// common single-user local setup), otherwise requires a valid session
/// cookie (spec §4.5, §4.12).
pub async fn require_admin_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.config.get().admin_auth.enabled {
        return Ok(next.run(request).await);
    }

    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(cc_gw_auth::error::AuthError::SessionExpired)?;

    if state.web_auth.validate(&token).is_none() {
        return Err(cc_gw_auth::error::AuthError::SessionExpired.into());
    }

    Ok(next.run(request).await)
}
