//! Restart decisions and exponential backoff

use std::time::Duration;

use crate::config::SupervisorConfig;

/// Delay before restart attempt `attempt`: `min(base * 2^attempt, cap)`
#[must_use]
pub fn backoff_delay(base: Duration, cap: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(cap)
}

/// What to do after the child exited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Start the child again after `delay`
    Restart {
        /// Backoff delay
        delay: Duration,
        /// Restart counter after this exit
        restart_count: u32,
        /// Whether the run was shorter than the minimum runtime
        crash_loop: bool,
    },
    /// Give up; external intervention is required
    LimitExceeded {
        /// Restart counter that hit the limit
        restart_count: u32,
    },
}

/// Crash-loop aware restart bookkeeping
///
/// Short runs push the counter up, long runs pull it back toward zero, and
/// the backoff grows with the counter.
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    max_restarts: u32,
    base_delay: Duration,
    max_delay: Duration,
    min_runtime: Duration,
    restart_count: u32,
}

impl RestartPolicy {
    /// Create a policy with an explicit configuration
    #[must_use]
    pub const fn new(
        max_restarts: u32,
        base_delay: Duration,
        max_delay: Duration,
        min_runtime: Duration,
    ) -> Self {
        Self {
            max_restarts,
            base_delay,
            max_delay,
            min_runtime,
            restart_count: 0,
        }
    }

    /// Create a policy from the supervisor configuration
    #[must_use]
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self::new(
            config.max_restarts,
            config.base_delay(),
            config.max_delay(),
            config.min_runtime(),
        )
    }

    /// Current restart counter
    #[must_use]
    pub const fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Decide what follows an exit after `runtime` of uptime
    pub fn on_exit(&mut self, runtime: Duration) -> RestartDecision {
        if self.restart_count >= self.max_restarts {
            return RestartDecision::LimitExceeded {
                restart_count: self.restart_count,
            };
        }

        let crash_loop = runtime < self.min_runtime;
        if crash_loop {
            self.restart_count += 1;
        } else {
            self.restart_count = self.restart_count.saturating_sub(1);
        }

        RestartDecision::Restart {
            delay: backoff_delay(self.base_delay, self.max_delay, self.restart_count),
            restart_count: self.restart_count,
            crash_loop,
        }
    }
}
