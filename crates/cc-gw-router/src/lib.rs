pub mod alias;
pub mod error;
pub mod resolve;
pub mod token_estimate;
pub mod types;

pub use error::{Result, RouterError};
pub use resolve::resolve;
pub use types::{PayloadHints, RouteTarget};
