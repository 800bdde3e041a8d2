use thiserror::Error;

/// Core config/secret-layer error. `.code()` gives the stable string tag
/// used in `{error:{code,message}}` response bodies; the gateway crate's
/// `ApiError` wraps this alongside every other crate's error type at the
/// HTTP boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication required")]
    AuthRequired,

    #[error("authentication invalid: {0}")]
    AuthInvalid(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("no route available: {0}")]
    RouteUnresolved(String),

    #[error("upstream error ({status}): {message}")]
    UpstreamError { status: u16, message: String },

    #[error("stream aborted: {0}")]
    StreamAborted(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable string code surfaced in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::AuthRequired => "AUTH_REQUIRED",
            GatewayError::AuthInvalid(_) => "AUTH_INVALID",
            GatewayError::BadRequest(_) => "BAD_REQUEST",
            GatewayError::RouteUnresolved(_) => "ROUTE_UNRESOLVED",
            GatewayError::UpstreamError { .. } => "UPSTREAM_ERROR",
            GatewayError::StreamAborted(_) => "STREAM_ABORTED",
            GatewayError::ConfigInvalid(_) => "CONFIG_INVALID",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status this error kind surfaces as.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::AuthRequired | GatewayError::AuthInvalid(_) => 401,
            GatewayError::BadRequest(_) => 400,
            GatewayError::RouteUnresolved(_) => 502,
            GatewayError::UpstreamError { status, .. } => *status,
            GatewayError::StreamAborted(_) => 499,
            GatewayError::ConfigInvalid(_) => 422,
            GatewayError::Internal(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
