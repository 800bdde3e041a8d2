use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Route(#[from] cc_gw_router::RouterError),

    #[error(transparent)]
    Protocol(#[from] cc_gw_protocol::ProtocolError),

    #[error(transparent)]
    Provider(#[from] cc_gw_providers::ProviderConnError),

    #[error("client disconnected")]
    ClientAborted,
}

impl RelayError {
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::BadRequest(_) => "BAD_REQUEST",
            RelayError::Route(_) => "ROUTE_UNRESOLVED",
            RelayError::Protocol(_) => "BAD_REQUEST",
            RelayError::Provider(_) => "UPSTREAM_ERROR",
            RelayError::ClientAborted => "CLIENT_ABORTED",
        }
    }

    /// The HTTP status this error surfaces as, per spec §7.
    pub fn status(&self) -> u16 {
        match self {
            RelayError::BadRequest(_) | RelayError::Protocol(_) => 400,
            RelayError::Route(_) => 502,
            RelayError::Provider(_) => 502,
            RelayError::ClientAborted => 499,
        }
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
