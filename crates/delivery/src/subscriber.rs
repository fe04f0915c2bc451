//! Subscriber trait for reacting to delivered events.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::DomainEvent;
use outbox_store::OutboxId;

use crate::error::SubscriberError;

/// An event as handed to subscribers, together with its delivery metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    /// Id of the outbox record carrying the event.
    ///
    /// Stable across redeliveries, so subscribers use it as an idempotency key.
    pub record_id: OutboxId,
    pub occurred_at: DateTime<Utc>,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    pub event: DomainEvent,
}

/// A handler that reacts to domain events after they have been committed.
///
/// Delivery is at least once: the same envelope may reach a subscriber again
/// after a crash or a failure in a later subscriber. Implementations must
/// tolerate duplicates.
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Returns the subscriber's name, used in failure reasons and logs.
    fn name(&self) -> &'static str;

    /// Handles one event.
    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), SubscriberError>;
}
