//! Tunables of the delivery pipeline.
//!
//! Invalid values are clamped to safe floors instead of rejected, so a bad
//! configuration can never stop the worker from starting.

use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BASE_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_DEAD_LETTERS: u64 = 0;
pub const DEFAULT_MAX_OLDEST_PENDING_AGE: Duration = Duration::from_secs(15 * 60);

const MIN_BASE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Thresholds of the outbox health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckOptions {
    /// More dead letters than this is Unhealthy.
    pub max_dead_letters: u64,
    /// An older pending record than this is Degraded.
    pub max_oldest_pending_age: Duration,
}

impl Default for HealthCheckOptions {
    fn default() -> Self {
        Self {
            max_dead_letters: DEFAULT_MAX_DEAD_LETTERS,
            max_oldest_pending_age: DEFAULT_MAX_OLDEST_PENDING_AGE,
        }
    }
}

/// Processor and poller configuration.
///
/// Reads from environment variables:
/// - `OUTBOX_MAX_RETRIES` (default: `5`, floor `1`)
/// - `OUTBOX_BASE_RETRY_DELAY_SECS` (default: `5`, floor `1`)
/// - `OUTBOX_MAX_RETRY_DELAY_SECS` (default: `300`, floor: base delay)
/// - `OUTBOX_BATCH_SIZE` (default: `100`, floor `1`)
/// - `OUTBOX_POLLING_INTERVAL_MS` (default: `5000`; non-positive means default)
/// - `OUTBOX_HEALTH_MAX_DEAD_LETTERS` (default: `0`)
/// - `OUTBOX_HEALTH_MAX_PENDING_AGE_SECS` (default: `900`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxOptions {
    pub max_retries: u32,
    pub base_retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub batch_size: usize,
    pub polling_interval: Duration,
    pub health: HealthCheckOptions,
}

impl Default for OutboxOptions {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_retry_delay: DEFAULT_BASE_RETRY_DELAY,
            max_retry_delay: DEFAULT_MAX_RETRY_DELAY,
            batch_size: DEFAULT_BATCH_SIZE,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            health: HealthCheckOptions::default(),
        }
    }
}

impl OutboxOptions {
    /// Loads options from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads options through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let int = |key: &str| lookup(key).and_then(|v| v.trim().parse::<i64>().ok());
        let defaults = Self::default();

        let max_retries = int("OUTBOX_MAX_RETRIES")
            .map(|v| u32::try_from(v.max(1)).unwrap_or(u32::MAX))
            .unwrap_or(defaults.max_retries);
        let base_retry_delay = int("OUTBOX_BASE_RETRY_DELAY_SECS")
            .map(secs)
            .unwrap_or(defaults.base_retry_delay);
        let max_retry_delay = int("OUTBOX_MAX_RETRY_DELAY_SECS")
            .map(secs)
            .unwrap_or(defaults.max_retry_delay);
        let batch_size = int("OUTBOX_BATCH_SIZE")
            .map(|v| usize::try_from(v.max(1)).unwrap_or(usize::MAX))
            .unwrap_or(defaults.batch_size);
        let polling_interval = int("OUTBOX_POLLING_INTERVAL_MS")
            .filter(|ms| *ms > 0)
            .map(|ms| Duration::from_millis(ms.unsigned_abs()))
            .unwrap_or(defaults.polling_interval);
        let max_dead_letters = int("OUTBOX_HEALTH_MAX_DEAD_LETTERS")
            .map(|v| u64::try_from(v).unwrap_or(0))
            .unwrap_or(defaults.health.max_dead_letters);
        let max_oldest_pending_age = int("OUTBOX_HEALTH_MAX_PENDING_AGE_SECS")
            .map(secs)
            .unwrap_or(defaults.health.max_oldest_pending_age);

        Self {
            max_retries,
            base_retry_delay,
            max_retry_delay,
            batch_size,
            polling_interval,
            health: HealthCheckOptions {
                max_dead_letters,
                max_oldest_pending_age,
            },
        }
        .normalized()
    }

    /// Returns a copy with every value clamped to its floor.
    pub fn normalized(mut self) -> Self {
        self.max_retries = self.max_retries.max(1);
        self.base_retry_delay = self.base_retry_delay.max(MIN_BASE_RETRY_DELAY);
        self.max_retry_delay = self.max_retry_delay.max(self.base_retry_delay);
        self.batch_size = self.batch_size.max(1);
        if self.polling_interval.is_zero() {
            self.polling_interval = DEFAULT_POLLING_INTERVAL;
        }
        self
    }
}

fn secs(value: i64) -> Duration {
    Duration::from_secs(u64::try_from(value).unwrap_or(0))
}
