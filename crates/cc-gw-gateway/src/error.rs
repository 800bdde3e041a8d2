use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Top-level HTTP error, aggregating every per-crate error type at the
/// one place that depends on all of them. Mirrors the stable
/// `{error:{code,message}}` body every other error surface in this
/// codebase already produces (`cc_gw_core::error::GatewayError::code`).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] cc_gw_core::error::GatewayError),

    #[error(transparent)]
    Store(#[from] cc_gw_store::error::StoreError),

    #[error(transparent)]
    Keys(#[from] cc_gw_keys::error::KeysError),

    #[error(transparent)]
    Auth(#[from] cc_gw_auth::error::AuthError),

    #[error(transparent)]
    Protocol(#[from] cc_gw_protocol::ProtocolError),

    #[error(transparent)]
    Router(#[from] cc_gw_router::RouterError),

    #[error(transparent)]
    Relay(#[from] cc_gw_relay::RelayError),

    #[error("request body exceeds the configured size limit")]
    BodyTooLarge,

    #[error("unknown endpoint")]
    NotFound,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Core(e) => e.code(),
            ApiError::Store(e) => e.code(),
            ApiError::Keys(e) => e.code(),
            ApiError::Auth(e) => e.code(),
            ApiError::Protocol(e) => e.code(),
            ApiError::Router(e) => e.code(),
            ApiError::Relay(e) => e.code(),
            ApiError::BodyTooLarge => "BODY_TOO_LARGE",
            ApiError::NotFound => "NOT_FOUND",
        }
    }

    pub fn status(&self) -> StatusCode {
        let raw = match self {
            ApiError::Core(e) => e.status(),
            ApiError::Store(e) => match e {
                cc_gw_store::error::StoreError::NotFound(_) => 404,
                _ => 500,
            },
            ApiError::Keys(e) => match e {
                cc_gw_keys::error::KeysError::NotFound(_) => 404,
                cc_gw_keys::error::KeysError::Denied => 401,
                cc_gw_keys::error::KeysError::Store(_) => 500,
            },
            ApiError::Auth(e) => match e {
                cc_gw_auth::error::AuthError::Internal(_) => 500,
                _ => 401,
            },
            ApiError::Protocol(_) => 400,
            ApiError::Router(_) => 502,
            ApiError::Relay(e) => e.status(),
            ApiError::BodyTooLarge => 413,
            ApiError::NotFound => 404,
        };
        StatusCode::from_u16(raw).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({"error": {"code": self.code(), "message": self.to_string()}}));
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
