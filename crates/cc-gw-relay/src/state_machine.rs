/// Per-request lifecycle (spec §4.13): seven ordinary states walked in
/// order, plus four terminals any of them can jump to. Exactly one
/// terminal is reached per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Received,
    Authed,
    Decoded,
    Routed,
    Dispatched,
    Streaming,
    Completed,
    Rejected,
    BadRequest,
    UpstreamError,
    ClientAborted,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestState::Completed
                | RequestState::Rejected
                | RequestState::BadRequest
                | RequestState::UpstreamError
                | RequestState::ClientAborted
        )
    }
}

/// Tracks the current state for one request and traces every
/// transition. Ordinary transitions only move forward; a terminal may
/// be entered from any non-terminal state.
pub struct StateMachine {
    current: RequestState,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: RequestState::Received,
        }
    }

    pub fn current(&self) -> RequestState {
        self.current
    }

    /// Advance to `next`. Debug builds assert the machine hasn't already
    /// reached a terminal — a bug if it has, since every exit path
    /// should stop driving the machine once it does.
    pub fn advance(&mut self, next: RequestState) {
        debug_assert!(
            !self.current.is_terminal(),
            "advanced past terminal state {:?} to {:?}",
            self.current,
            next
        );
        tracing::trace!(from = ?self.current, to = ?next, "request state transition");
        self.current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_path_reaches_completed() {
        let mut sm = StateMachine::new();
        for s in [
            RequestState::Authed,
            RequestState::Decoded,
            RequestState::Routed,
            RequestState::Dispatched,
            RequestState::Streaming,
            RequestState::Completed,
        ] {
            sm.advance(s);
        }
        assert_eq!(sm.current(), RequestState::Completed);
        assert!(sm.current().is_terminal());
    }

    #[test]
    fn any_state_can_jump_to_a_terminal() {
        let mut sm = StateMachine::new();
        sm.advance(RequestState::Authed);
        sm.advance(RequestState::UpstreamError);
        assert!(sm.current().is_terminal());
    }
}
