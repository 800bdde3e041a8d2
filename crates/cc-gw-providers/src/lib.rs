pub mod connector;
pub mod error;
pub mod families;
pub mod registry;

pub use connector::{map_error_body, Connector, ConnectorRequest, HttpConnector};
pub use error::{ProviderConnError, Result};
pub use registry::{KnownProvider, KNOWN_PROVIDERS};
