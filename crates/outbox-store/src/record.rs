use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

common::uuid_id! {
    /// Unique identifier for an outbox record.
    ///
    /// Assigned once at capture time and reused on every redelivery.
    OutboxId
}

/// Delivery state of an outbox record, derived from its timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordState {
    /// Waiting for a (first or further) delivery attempt.
    Pending,
    /// Delivered to every subscriber. Terminal.
    Processed,
    /// Retry budget exhausted; parked for an operator. Terminal.
    DeadLettered,
}

impl RecordState {
    /// Returns true for states that the processor never touches again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RecordState::Pending)
    }
}

impl std::fmt::Display for RecordState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordState::Pending => write!(f, "Pending"),
            RecordState::Processed => write!(f, "Processed"),
            RecordState::DeadLettered => write!(f, "DeadLettered"),
        }
    }
}

/// A serialized domain event queued for delivery.
///
/// A record is created inside the same transaction as the mutation that raised
/// the event and is afterwards only mutated by the processor, through the
/// transition methods below. `next_attempt_at` is set only while the record is
/// pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Unique identifier for this record.
    pub id: OutboxId,

    /// When the underlying event was produced. Oldest records are selected first.
    pub occurred_at: DateTime<Utc>,

    /// Stable schema tag of the event (e.g., "mission.collaborator_added").
    pub event_type: String,

    /// Serialized event body.
    pub payload: String,

    /// Number of failed delivery attempts so far.
    pub retry_count: u32,

    /// Earliest time of the next attempt. `None` once the record is terminal.
    pub next_attempt_at: Option<DateTime<Utc>>,

    /// Set once, on successful delivery.
    pub processed_at: Option<DateTime<Utc>>,

    /// Set once, when the retry budget is exhausted.
    pub dead_lettered_at: Option<DateTime<Utc>>,

    /// Reason of the most recent failed attempt.
    pub last_error: Option<String>,
}

impl OutboxRecord {
    /// Creates a pending record that is due immediately.
    pub fn new(
        event_type: impl Into<String>,
        payload: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OutboxId::new(),
            occurred_at,
            event_type: event_type.into(),
            payload: payload.into(),
            retry_count: 0,
            next_attempt_at: Some(occurred_at),
            processed_at: None,
            dead_lettered_at: None,
            last_error: None,
        }
    }

    /// Overrides the time of the first attempt.
    pub fn with_next_attempt_at(mut self, at: DateTime<Utc>) -> Self {
        self.next_attempt_at = Some(at);
        self
    }

    /// Returns the state implied by the record's timestamps.
    pub fn state(&self) -> RecordState {
        if self.processed_at.is_some() {
            RecordState::Processed
        } else if self.dead_lettered_at.is_some() {
            RecordState::DeadLettered
        } else {
            RecordState::Pending
        }
    }

    /// Returns true if the record is pending and its next attempt is not in the future.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state() == RecordState::Pending && self.next_attempt_at.is_none_or(|at| at <= now)
    }

    /// Records a successful delivery.
    pub fn mark_processed(&mut self, now: DateTime<Utc>) {
        self.processed_at = Some(now);
        self.next_attempt_at = None;
        self.last_error = None;
    }

    /// Records a failed attempt and returns the new retry count.
    pub fn record_failure(&mut self, reason: impl Into<String>) -> u32 {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_error = Some(reason.into());
        self.retry_count
    }

    /// Schedules the next attempt after a failure.
    pub fn reschedule(&mut self, at: DateTime<Utc>) {
        self.next_attempt_at = Some(at);
    }

    /// Parks the record after its retry budget is exhausted.
    pub fn mark_dead_lettered(&mut self, now: DateTime<Utc>) {
        self.dead_lettered_at = Some(now);
        self.next_attempt_at = None;
    }
}
