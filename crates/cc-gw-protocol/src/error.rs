use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed request body: {0}")]
    Malformed(String),
    #[error("unsupported content: {0}")]
    Unsupported(String),
}

impl ProtocolError {
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Malformed(_) => "BAD_REQUEST",
            ProtocolError::Unsupported(_) => "BAD_REQUEST",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
