//! Outbox processor: one pass over the due records.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use common::SharedClock;
use domain::codec;
use outbox_store::{OutboxRecord, OutboxStore};

use crate::Result;
use crate::dispatcher::{DispatchOutcome, SubscriberRegistry};
use crate::retry::RetryPolicy;
use crate::subscriber::EventEnvelope;

/// Counts of one processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Records selected as due.
    pub examined: usize,
    /// Records delivered to every subscriber.
    pub processed: usize,
    /// Records that failed and were rescheduled.
    pub retried: usize,
    /// Records that exhausted their budget or were rejected as fatal.
    pub dead_lettered: usize,
}

/// What happened to a record during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Processed,
    Retried { next_attempt_at: DateTime<Utc> },
    DeadLettered,
}

/// Applies a dispatch outcome to a pending record.
///
/// A retryable failure increments the retry count and either reschedules the
/// record after the policy's backoff or, once the budget is exhausted, dead
/// letters it. A fatal failure dead letters immediately.
pub fn settle(
    record: &mut OutboxRecord,
    outcome: DispatchOutcome,
    policy: &RetryPolicy,
    now: DateTime<Utc>,
) -> Transition {
    match outcome {
        DispatchOutcome::Success => {
            record.mark_processed(now);
            Transition::Processed
        }
        DispatchOutcome::RetryableFailure(reason) => {
            let retry_count = record.record_failure(reason);
            if policy.is_exhausted(retry_count) {
                record.mark_dead_lettered(now);
                return Transition::DeadLettered;
            }
            let delay = TimeDelta::from_std(policy.backoff(retry_count)).unwrap_or(TimeDelta::MAX);
            let next_attempt_at = now
                .checked_add_signed(delay)
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
            record.reschedule(next_attempt_at);
            Transition::Retried { next_attempt_at }
        }
        DispatchOutcome::Fatal(reason) => {
            record.record_failure(reason);
            record.mark_dead_lettered(now);
            Transition::DeadLettered
        }
    }
}

/// Delivers due outbox records to their subscribers.
///
/// Each pass:
/// 1. Selects up to `batch_size` due records, oldest first
/// 2. Decodes and dispatches each record sequentially
/// 3. Moves each record to Processed, back to Pending with a later
///    `next_attempt_at`, or to DeadLettered
/// 4. Persists every outcome in a single flush
///
/// Decode failures count as retryable failures, so an unknown tag eventually
/// dead letters instead of blocking the queue.
pub struct OutboxProcessor<S: OutboxStore> {
    store: S,
    registry: Arc<SubscriberRegistry>,
    clock: SharedClock,
    policy: RetryPolicy,
}

impl<S: OutboxStore> OutboxProcessor<S> {
    pub fn new(
        store: S,
        registry: Arc<SubscriberRegistry>,
        clock: SharedClock,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            registry,
            clock,
            policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs one pass over at most `batch_size` due records.
    ///
    /// Store errors abort the pass before any outcome is persisted; the
    /// selected records then stay pending and are picked up again.
    #[tracing::instrument(skip(self))]
    pub async fn process_pending(&self, batch_size: usize) -> Result<BatchSummary> {
        let started = Instant::now();
        let mut batch = self
            .store
            .select_due_batch(batch_size, self.clock.now())
            .await?;

        let mut summary = BatchSummary {
            examined: batch.len(),
            ..BatchSummary::default()
        };
        if batch.is_empty() {
            return Ok(summary);
        }

        for record in batch.iter_mut() {
            let outcome = self.deliver(record).await;
            match settle(record, outcome, &self.policy, self.clock.now()) {
                Transition::Processed => summary.processed += 1,
                Transition::Retried { next_attempt_at } => {
                    summary.retried += 1;
                    tracing::warn!(
                        record_id = %record.id,
                        event_type = %record.event_type,
                        retry_count = record.retry_count,
                        %next_attempt_at,
                        "outbox record rescheduled"
                    );
                }
                Transition::DeadLettered => {
                    summary.dead_lettered += 1;
                    tracing::error!(
                        record_id = %record.id,
                        event_type = %record.event_type,
                        retry_count = record.retry_count,
                        last_error = record.last_error.as_deref().unwrap_or_default(),
                        "outbox record dead-lettered"
                    );
                }
            }
        }

        self.store.save_outcomes(&batch).await?;

        metrics::counter!("outbox_records_processed_total").increment(summary.processed as u64);
        metrics::counter!("outbox_records_retried_total").increment(summary.retried as u64);
        metrics::counter!("outbox_records_dead_lettered_total")
            .increment(summary.dead_lettered as u64);
        metrics::histogram!("outbox_batch_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        tracing::debug!(
            examined = summary.examined,
            processed = summary.processed,
            retried = summary.retried,
            dead_lettered = summary.dead_lettered,
            "outbox batch complete"
        );

        Ok(summary)
    }

    async fn deliver(&self, record: &OutboxRecord) -> DispatchOutcome {
        let event = match codec::decode(&record.event_type, &record.payload) {
            Ok(event) => event,
            Err(e) => return DispatchOutcome::RetryableFailure(e.to_string()),
        };

        let envelope = EventEnvelope {
            record_id: record.id,
            occurred_at: record.occurred_at,
            attempt: record.retry_count.saturating_add(1),
            event,
        };
        self.registry.dispatch(&envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_secs(5), Duration::from_secs(60))
    }

    fn pending() -> OutboxRecord {
        OutboxRecord::new("mission.renamed", "{}", Utc::now())
    }

    #[test]
    fn test_success_marks_processed() {
        let now = Utc::now();
        let mut record = pending();

        assert_eq!(
            settle(&mut record, DispatchOutcome::Success, &policy(), now),
            Transition::Processed
        );
        assert_eq!(record.processed_at, Some(now));
        assert_eq!(record.next_attempt_at, None);
        assert_eq!(record.retry_count, 0);
    }

    #[test]
    fn test_retryable_failure_reschedules_with_backoff() {
        let now = Utc::now();
        let mut record = pending();

        let transition = settle(
            &mut record,
            DispatchOutcome::RetryableFailure("down".to_string()),
            &policy(),
            now,
        );

        let expected = now + TimeDelta::seconds(5);
        assert_eq!(
            transition,
            Transition::Retried {
                next_attempt_at: expected
            }
        );
        assert_eq!(record.retry_count, 1);
        assert_eq!(record.next_attempt_at, Some(expected));
        assert_eq!(record.last_error.as_deref(), Some("down"));
    }

    #[test]
    fn test_dead_letters_when_budget_exhausted() {
        let now = Utc::now();
        let mut record = pending();
        record.retry_count = 2;

        let transition = settle(
            &mut record,
            DispatchOutcome::RetryableFailure("down".to_string()),
            &policy(),
            now,
        );

        assert_eq!(transition, Transition::DeadLettered);
        assert_eq!(record.retry_count, 3);
        assert_eq!(record.dead_lettered_at, Some(now));
        assert_eq!(record.next_attempt_at, None);
    }

    #[test]
    fn test_fatal_dead_letters_immediately() {
        let now = Utc::now();
        let mut record = pending();

        let transition = settle(
            &mut record,
            DispatchOutcome::Fatal("invalid".to_string()),
            &policy(),
            now,
        );

        assert_eq!(transition, Transition::DeadLettered);
        assert_eq!(record.retry_count, 1);
        assert_eq!(record.last_error.as_deref(), Some("invalid"));
        assert_eq!(record.dead_lettered_at, Some(now));
    }
}
