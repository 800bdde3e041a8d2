use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeysError {
    #[error("store error: {0}")]
    Store(#[from] cc_gw_store::error::StoreError),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("access denied")]
    Denied,
}

impl KeysError {
    pub fn code(&self) -> &'static str {
        match self {
            KeysError::Store(_) => "STORE_ERROR",
            KeysError::NotFound(_) => "NOT_FOUND",
            KeysError::Denied => "AUTH_INVALID",
        }
    }
}

pub type Result<T> = std::result::Result<T, KeysError>;
