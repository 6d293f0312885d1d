//! Supervisor state

use std::fmt;

/// Where a supervised tunnel currently is in its lifecycle
///
/// Published on a watch channel; observers only ever see the latest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not started yet
    Idle,
    /// Looking for a pod or container
    SelectingTarget,
    /// Opening the tunnel endpoint
    Establishing,
    /// Waiting for the tunnel to report readiness
    WaitingReady,
    /// Carrying traffic
    Active,
    /// Pausing after a successful reconnect
    Settling,
    /// Waiting before the next reconnect attempt
    Backoff,
    /// Torn down, never restarts
    Closed,
}

impl SessionState {
    /// Whether the supervisor has ended for good
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Idle => "idle",
            SessionState::SelectingTarget => "selecting target",
            SessionState::Establishing => "establishing",
            SessionState::WaitingReady => "waiting for readiness",
            SessionState::Active => "active",
            SessionState::Settling => "settling",
            SessionState::Backoff => "backing off",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}
