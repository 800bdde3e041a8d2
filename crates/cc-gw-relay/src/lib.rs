pub mod error;
pub mod meter;
pub mod relay;
pub mod response;
pub mod state_machine;

pub use error::{RelayError, Result};
pub use meter::RequestMeter;
pub use relay::{dispatch, RelayOutcome, RequestContext};
pub use state_machine::{RequestState, StateMachine};
