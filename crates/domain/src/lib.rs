//! Domain layer feeding the transactional outbox.
//!
//! This crate provides:
//! - [`EventSource`] and [`Aggregate`] traits for aggregates that raise events
//! - The registered [`DomainEvent`] set with stable [`EventType`] tags
//! - The event [`codec`] turning events into outbox payloads and back
//! - [`UnitOfWork`], committing aggregate state and outbox records atomically
//! - The [`Mission`] aggregate, producer of every registered event

pub mod aggregate;
pub mod codec;
pub mod error;
pub mod event;
pub mod mission;
pub mod unit_of_work;

pub use aggregate::{Aggregate, EventBuffer, EventSource, TrackedAggregate};
pub use codec::{DecodeError, EncodedEvent};
pub use error::DomainError;
pub use event::{DomainEvent, EventType};
pub use mission::{Mission, MissionError, Objective};
pub use unit_of_work::UnitOfWork;
