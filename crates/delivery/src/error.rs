//! Delivery error types.

use outbox_store::OutboxStoreError;
use thiserror::Error;

/// Errors that abort a processing pass.
///
/// Per-record failures never surface here; they are recorded on the record.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// An error occurred in the outbox store.
    #[error("Outbox store error: {0}")]
    Store(#[from] OutboxStoreError),
}

/// Failure reported by a subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriberError {
    /// The attempt failed but a later one may succeed.
    #[error("{0}")]
    Retryable(String),

    /// The event can never be handled; retrying is pointless.
    #[error("{0}")]
    Fatal(String),
}

impl SubscriberError {
    pub fn retryable(reason: impl Into<String>) -> Self {
        SubscriberError::Retryable(reason.into())
    }

    pub fn fatal(reason: impl Into<String>) -> Self {
        SubscriberError::Fatal(reason.into())
    }
}

/// Result type for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;
