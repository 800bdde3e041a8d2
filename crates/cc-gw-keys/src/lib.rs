pub mod error;
pub mod registry;

pub use registry::{KeyRegistry, MaskedKeyView, NewApiKey};
