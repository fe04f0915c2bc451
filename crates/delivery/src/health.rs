//! Health of the outbox: dead letters and backlog age.

use std::time::Duration;

use common::SharedClock;
use outbox_store::OutboxStore;
use serde::Serialize;

use crate::Result;
use crate::config::HealthCheckOptions;

/// Overall health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthStatus {
    Healthy,
    /// Delivery is lagging behind.
    Degraded,
    /// Records are being given up on.
    Unhealthy,
}

/// Result of a health check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub dead_letter_count: u64,
    /// Age of the oldest pending record, zero when nothing is pending.
    pub oldest_pending_age_secs: u64,
    pub description: String,
}

/// Classifies the outbox against the configured thresholds.
///
/// Too many dead letters is Unhealthy and takes precedence; a backlog older
/// than the age threshold is Degraded.
pub fn classify(
    dead_letter_count: u64,
    oldest_pending_age: Duration,
    options: &HealthCheckOptions,
) -> HealthStatus {
    if dead_letter_count > options.max_dead_letters {
        HealthStatus::Unhealthy
    } else if oldest_pending_age > options.max_oldest_pending_age {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

/// Reads the outbox and reports its health.
pub struct OutboxHealthCheck<S: OutboxStore> {
    store: S,
    clock: SharedClock,
    options: HealthCheckOptions,
}

impl<S: OutboxStore> OutboxHealthCheck<S> {
    pub fn new(store: S, clock: SharedClock, options: HealthCheckOptions) -> Self {
        Self {
            store,
            clock,
            options,
        }
    }

    /// Queries the store and classifies the result.
    ///
    /// Never modifies the outbox. Setting the `outbox_dead_letters` and
    /// `outbox_oldest_pending_age_seconds` gauges is the only side effect.
    #[tracing::instrument(skip(self))]
    pub async fn check(&self) -> Result<HealthReport> {
        let dead_letter_count = self.store.dead_letter_count().await?;
        let oldest_pending_age = self
            .store
            .oldest_pending_occurred_at()
            .await?
            .and_then(|occurred_at| (self.clock.now() - occurred_at).to_std().ok())
            .unwrap_or(Duration::ZERO);

        metrics::gauge!("outbox_dead_letters").set(dead_letter_count as f64);
        metrics::gauge!("outbox_oldest_pending_age_seconds").set(oldest_pending_age.as_secs_f64());

        let status = classify(dead_letter_count, oldest_pending_age, &self.options);
        let description = match status {
            HealthStatus::Healthy => "outbox is draining normally".to_string(),
            HealthStatus::Degraded => format!(
                "oldest pending record is {}s old (threshold {}s)",
                oldest_pending_age.as_secs(),
                self.options.max_oldest_pending_age.as_secs()
            ),
            HealthStatus::Unhealthy => format!(
                "{dead_letter_count} dead-lettered records (threshold {})",
                self.options.max_dead_letters
            ),
        };
        if status != HealthStatus::Healthy {
            tracing::warn!(?status, %description, "outbox health check failed");
        }

        Ok(HealthReport {
            status,
            dead_letter_count,
            oldest_pending_age_secs: oldest_pending_age.as_secs(),
            description,
        })
    }
}
