use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("no provider configured")]
    NoProviderConfigured,
}

impl RouterError {
    pub fn code(&self) -> &'static str {
        match self {
            RouterError::NoProviderConfigured => "ROUTE_UNRESOLVED",
        }
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;
