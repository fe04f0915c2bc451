//! Domain error types.

use outbox_store::OutboxStoreError;
use thiserror::Error;

use crate::mission::MissionError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the outbox or aggregate store.
    #[error("Store error: {0}")]
    Store(#[from] OutboxStoreError),

    /// A mission business rule was violated.
    #[error("Mission error: {0}")]
    Mission(#[from] MissionError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
