//! Aggregate and domain event source traits.

use common::AggregateId;
use serde::Serialize;

use crate::event::DomainEvent;

/// Append-only buffer of events raised by an aggregate's mutations.
///
/// The buffer is transient: aggregates mark it `#[serde(skip)]` so it never
/// ends up in persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBuffer {
    events: Vec<DomainEvent>,
}

impl EventBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn record(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    /// Returns the buffered events in the order they were raised.
    pub fn as_slice(&self) -> &[DomainEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Drops every buffered event.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

/// Anything that raises domain events from its mutations.
pub trait EventSource {
    /// Returns events raised since the last clear, in insertion order.
    fn pending_events(&self) -> &[DomainEvent];

    /// Clears the pending events.
    fn clear_events(&mut self);

    /// Returns true if any event is waiting to be committed.
    fn has_pending_events(&self) -> bool {
        !self.pending_events().is_empty()
    }
}

/// Trait for aggregates persisted through a unit of work.
///
/// An aggregate is a cluster of domain objects that can be treated as a single unit.
/// Its state is stored as a whole; the events it raises are captured into the
/// outbox in the same transaction.
pub trait Aggregate: EventSource + Serialize + Send + Sync {
    /// Returns the aggregate type name.
    ///
    /// Used as part of the storage key.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's unique identifier.
    fn id(&self) -> AggregateId;
}

/// Object-safe view of an aggregate taking part in a commit.
pub trait TrackedAggregate: EventSource + Send + Sync {
    fn aggregate_type(&self) -> &'static str;

    fn aggregate_id(&self) -> AggregateId;

    /// Serializes the aggregate's state for storage.
    fn state(&self) -> serde_json::Result<serde_json::Value>;
}

impl<A: Aggregate> TrackedAggregate for A {
    fn aggregate_type(&self) -> &'static str {
        <A as Aggregate>::aggregate_type()
    }

    fn aggregate_id(&self) -> AggregateId {
        self.id()
    }

    fn state(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
