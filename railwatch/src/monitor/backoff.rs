//! Adaptive poll interval under API rate limiting

use std::time::Duration;

/// Backoff interval bounds
#[derive(Debug, Clone)]
pub struct BackoffOptions {
    /// Normal polling interval
    pub base_interval: Duration,

    /// Ceiling for the backed-off interval
    pub max_interval: Duration,
}

impl Default for BackoffOptions {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(30),
            max_interval: Duration::from_secs(300), // 5 minutes
        }
    }
}

/// Tracks consecutive rate-limit failures and the resulting poll interval.
///
/// The poll loop re-arms its timer from `current_interval()` after every
/// cycle, so a change here takes effect on the very next wait.
#[derive(Debug, Clone)]
pub struct Backoff {
    options: BackoffOptions,
    consecutive_rate_limits: u32,
    current_interval: Duration,
}

impl Backoff {
    pub fn new(options: BackoffOptions) -> Self {
        let current_interval = options.base_interval;
        Self {
            options,
            consecutive_rate_limits: 0,
            current_interval,
        }
    }

    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    pub fn consecutive_rate_limits(&self) -> u32 {
        self.consecutive_rate_limits
    }

    /// Record a rate-limited cycle: base * 2^(n-1), capped at the ceiling.
    ///
    /// Returns true when the interval changed.
    pub fn on_rate_limited(&mut self) -> bool {
        self.consecutive_rate_limits += 1;
        // Exponent capped well below any value that could overflow the shift
        let exponent = (self.consecutive_rate_limits - 1).min(16);
        let next = self
            .options
            .base_interval
            .saturating_mul(1u32 << exponent)
            .min(self.options.max_interval);

        let changed = next != self.current_interval;
        self.current_interval = next;
        changed
    }

    /// Record a cycle that completed without hitting the rate limit.
    ///
    /// Returns true when the interval dropped back to base.
    pub fn on_success(&mut self) -> bool {
        if self.consecutive_rate_limits == 0 {
            return false;
        }

        self.consecutive_rate_limits = 0;
        let changed = self.current_interval != self.options.base_interval;
        self.current_interval = self.options.base_interval;
        changed
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffOptions::default())
    }
}
