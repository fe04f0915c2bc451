//! Shared identifiers and the clock abstraction used across the outbox pipeline.

pub mod clock;
pub mod types;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use types::{AggregateId, UserId};
