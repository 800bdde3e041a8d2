use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderConnError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },
}

impl ProviderConnError {
    pub fn code(&self) -> &'static str {
        match self {
            ProviderConnError::Transport(_) => "UPSTREAM_ERROR",
            ProviderConnError::Upstream { .. } => "UPSTREAM_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderConnError>;
