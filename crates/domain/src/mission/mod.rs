//! Mission aggregate: the producer of every registered domain event.

mod aggregate;
mod error;

pub use aggregate::{Mission, Objective};
pub use error::MissionError;
