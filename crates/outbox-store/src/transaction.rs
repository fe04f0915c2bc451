//! Transactional seam shared by aggregate writes and outbox inserts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::{OutboxRecord, Result};

/// Persisted state of one aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateState {
    /// The type of aggregate (e.g., "Mission").
    pub aggregate_type: String,

    /// The aggregate's identifier.
    pub aggregate_id: AggregateId,

    /// The serialized aggregate state.
    pub state: serde_json::Value,

    /// When this state was written.
    pub updated_at: DateTime<Utc>,
}

/// Opens transactions spanning aggregate state and the outbox.
#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    /// The transaction type produced by [`PersistenceProvider::begin`].
    type Transaction: StoreTransaction;

    /// Starts a new transaction.
    async fn begin(&self) -> Result<Self::Transaction>;

    /// Loads the last committed state of an aggregate.
    async fn load_aggregate(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Option<AggregateState>>;
}

/// A single open transaction.
///
/// Nothing written through a transaction is visible until [`StoreTransaction::commit`]
/// succeeds. Dropping a transaction without committing discards its writes.
#[async_trait]
pub trait StoreTransaction: Send + Sized {
    /// Upserts an aggregate's state.
    async fn save_aggregate(&mut self, state: AggregateState) -> Result<()>;

    /// Inserts outbox records.
    async fn insert_outbox(&mut self, records: Vec<OutboxRecord>) -> Result<()>;

    /// Commits every write made through this transaction.
    async fn commit(self) -> Result<()>;

    /// Discards every write made through this transaction.
    async fn rollback(self) -> Result<()>;
}
