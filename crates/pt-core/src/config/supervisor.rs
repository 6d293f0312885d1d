//! Supervisor timing configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_secs;
use crate::types::Direction;

/// Timings shared by every tunnel supervisor
///
/// Retries use a fixed delay, never an exponential one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// How long an opened tunnel may take to become ready
    #[serde(with = "duration_secs")]
    pub readiness_timeout: Duration,

    /// Delay after a failed reconnect attempt
    #[serde(with = "duration_secs")]
    pub retry_delay: Duration,

    /// Pause after a successful forward reconnect
    #[serde(with = "duration_secs")]
    pub forward_settle_delay: Duration,

    /// Pause after a successful reverse reconnect
    #[serde(with = "duration_secs")]
    pub reverse_settle_delay: Duration,

    /// Poll interval of the "until newest running" waiting strategy
    #[serde(with = "duration_secs")]
    pub selection_poll_interval: Duration,

    /// Upper bound on a single target selection
    #[serde(with = "duration_secs")]
    pub selection_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            readiness_timeout: Duration::from_secs(20),
            retry_delay: Duration::from_secs(15),
            forward_settle_delay: Duration::from_secs(3),
            reverse_settle_delay: Duration::from_secs(5),
            selection_poll_interval: Duration::from_secs(2),
            selection_timeout: Duration::from_secs(120),
        }
    }
}

impl SupervisorConfig {
    /// Settling delay for a direction
    pub fn settle_delay(&self, direction: Direction) -> Duration {
        match direction {
            Direction::Forward => self.forward_settle_delay,
            Direction::Reverse => self.reverse_settle_delay,
        }
    }
}
