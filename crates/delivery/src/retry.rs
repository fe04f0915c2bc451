//! Capped exponential backoff.

use std::time::Duration;

use crate::config::OutboxOptions;

/// Decides when a failed record is retried and when it is given up on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy. `max_retries` is at least 1 and `max_delay` at least `base_delay`.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    pub fn from_options(options: &OutboxOptions) -> Self {
        Self::new(
            options.max_retries,
            options.base_retry_delay,
            options.max_retry_delay,
        )
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before the next attempt after the `retry_count`-th failure.
    ///
    /// `base * 2^(retry_count - 1)`, capped at the maximum delay. Overflow
    /// saturates to the maximum.
    pub fn backoff(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1);
        2u32.checked_pow(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Returns true once `retry_count` failures exhaust the budget.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_options(&OutboxOptions::default())
    }
}
