use thiserror::Error;

use crate::OutboxId;

/// Errors that can occur when interacting with the outbox store.
#[derive(Debug, Error)]
pub enum OutboxStoreError {
    /// No record with this id exists.
    #[error("Outbox record not found: {0}")]
    RecordNotFound(OutboxId),

    /// A record with this id already exists.
    #[error("Duplicate outbox record: {0}")]
    DuplicateRecord(OutboxId),

    /// The record violates the outbox invariants for the requested operation.
    #[error("Invalid outbox record {id}: {reason}")]
    InvalidRecord { id: OutboxId, reason: String },

    /// The surrounding transaction could not be committed.
    #[error("Transaction commit failed: {0}")]
    CommitFailed(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for outbox store operations.
pub type Result<T> = std::result::Result<T, OutboxStoreError>;
