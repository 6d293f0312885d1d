//! Fixed retry timings for tunnel supervisors

use std::time::Duration;

use pt_core::config::SupervisorConfig;
use pt_core::Direction;

/// Timings a supervisor applies between attempts
///
/// Unlike a classic exponential backoff every delay here is constant: a
/// failed reconnect always waits `retry_delay`, a successful one always
/// settles for `settle_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Upper bound on waiting for a freshly opened tunnel
    pub readiness_timeout: Duration,
    /// Delay after a failed reconnect attempt
    pub retry_delay: Duration,
    /// Pause after a successful reconnect
    pub settle_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy from configuration
    pub fn for_direction(config: &SupervisorConfig, direction: Direction) -> Self {
        Self {
            readiness_timeout: config.readiness_timeout,
            retry_delay: config.retry_delay,
            settle_delay: config.settle_delay(direction),
        }
    }

    /// Create a policy with custom timings
    pub fn new(readiness_timeout: Duration, retry_delay: Duration, settle_delay: Duration) -> Self {
        Self {
            readiness_timeout,
            retry_delay,
            settle_delay,
        }
    }
}
