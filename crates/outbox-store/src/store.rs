use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{OutboxId, OutboxRecord, OutboxStoreError, RecordState, Result};

/// Core trait for outbox store implementations.
///
/// The outbox store is the only shared mutable resource of the delivery
/// pipeline. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Inserts new pending records.
    ///
    /// Records are inserted atomically - either all succeed or none do.
    async fn insert(&self, records: Vec<OutboxRecord>) -> Result<()>;

    /// Selects pending records whose next attempt is unset or not after `now`.
    ///
    /// Records are returned oldest `occurred_at` first, at most `limit` of them
    /// (a limit of 0 is treated as 1).
    async fn select_due_batch(&self, limit: usize, now: DateTime<Utc>)
    -> Result<Vec<OutboxRecord>>;

    /// Persists the outcome of a processed batch in one flush.
    ///
    /// Every record must already exist; the stored row is replaced by the given one.
    async fn save_outcomes(&self, records: &[OutboxRecord]) -> Result<()>;

    /// Retrieves a single record.
    async fn get(&self, id: OutboxId) -> Result<Option<OutboxRecord>>;

    /// Counts dead-lettered records.
    async fn dead_letter_count(&self) -> Result<u64>;

    /// Returns the occurrence time of the oldest pending record, if any.
    async fn oldest_pending_occurred_at(&self) -> Result<Option<DateTime<Utc>>>;

    /// Lists dead-lettered records, oldest first, for operator inspection.
    async fn list_dead_letters(&self, limit: usize) -> Result<Vec<OutboxRecord>>;
}

/// Extension trait providing convenience methods for outbox stores.
#[async_trait]
pub trait OutboxStoreExt: OutboxStore {
    /// Inserts a single record.
    async fn insert_one(&self, record: OutboxRecord) -> Result<()> {
        self.insert(vec![record]).await
    }

    /// Returns the state of a record, or `RecordNotFound`.
    async fn state_of(&self, id: OutboxId) -> Result<RecordState> {
        self.get(id)
            .await?
            .map(|record| record.state())
            .ok_or(OutboxStoreError::RecordNotFound(id))
    }
}

// Blanket implementation for all OutboxStore implementations
impl<T: OutboxStore + ?Sized> OutboxStoreExt for T {}

/// Clamps a requested batch size to its floor of one.
pub fn effective_limit(limit: usize) -> usize {
    limit.max(1)
}

/// Validates records before inserting them.
///
/// New records must be pending with no failed attempts, and ids must be
/// unique within the batch.
pub fn validate_records_for_insert(records: &[OutboxRecord]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !seen.insert(record.id) {
            return Err(OutboxStoreError::DuplicateRecord(record.id));
        }
        if record.state() != RecordState::Pending {
            return Err(OutboxStoreError::InvalidRecord {
                id: record.id,
                reason: format!("new records must be Pending, got {}", record.state()),
            });
        }
        if record.retry_count != 0 {
            return Err(OutboxStoreError::InvalidRecord {
                id: record.id,
                reason: "new records must not carry failed attempts".to_string(),
            });
        }
        if record.event_type.is_empty() {
            return Err(OutboxStoreError::InvalidRecord {
                id: record.id,
                reason: "event type is required".to_string(),
            });
        }
    }
    Ok(())
}
