use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use tokio::sync::RwLock;

use crate::{
    AggregateState, OutboxId, OutboxRecord, OutboxStoreError, RecordState, Result,
    store::{OutboxStore, effective_limit, validate_records_for_insert},
    transaction::{PersistenceProvider, StoreTransaction},
};

/// In-memory outbox store implementation for testing and local runs.
///
/// Records are kept in insertion order, which breaks ties between records
/// sharing an `occurred_at` the same way the PostgreSQL sequence column does.
#[derive(Clone, Default)]
pub struct InMemoryOutboxStore {
    records: Arc<RwLock<Vec<OutboxRecord>>>,
}

impl InMemoryOutboxStore {
    /// Creates a new empty in-memory outbox store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of records stored, in any state.
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Returns a copy of every stored record.
    pub async fn all_records(&self) -> Vec<OutboxRecord> {
        self.records.read().await.clone()
    }

    /// Clears all records.
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }

    fn append_locked(store: &mut Vec<OutboxRecord>, records: Vec<OutboxRecord>) -> Result<()> {
        validate_records_for_insert(&records)?;
        if let Some(existing) = records
            .iter()
            .find(|r| store.iter().any(|stored| stored.id == r.id))
        {
            return Err(OutboxStoreError::DuplicateRecord(existing.id));
        }
        store.extend(records);
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutboxStore {
    async fn insert(&self, records: Vec<OutboxRecord>) -> Result<()> {
        let mut store = self.records.write().await;
        Self::append_locked(&mut store, records)
    }

    async fn select_due_batch(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxRecord>> {
        let store = self.records.read().await;
        let mut due: Vec<_> = store.iter().filter(|r| r.is_due(now)).cloned().collect();

        // Stable sort keeps insertion order for equal timestamps
        due.sort_by_key(|r| r.occurred_at);
        due.truncate(effective_limit(limit));
        Ok(due)
    }

    async fn save_outcomes(&self, records: &[OutboxRecord]) -> Result<()> {
        let mut store = self.records.write().await;

        // Resolve every position first so a missing record leaves the store untouched
        let mut positions = Vec::with_capacity(records.len());
        for record in records {
            let pos = store
                .iter()
                .position(|stored| stored.id == record.id)
                .ok_or(OutboxStoreError::RecordNotFound(record.id))?;
            positions.push(pos);
        }

        for (pos, record) in positions.into_iter().zip(records) {
            store[pos] = record.clone();
        }
        Ok(())
    }

    async fn get(&self, id: OutboxId) -> Result<Option<OutboxRecord>> {
        let store = self.records.read().await;
        Ok(store.iter().find(|r| r.id == id).cloned())
    }

    async fn dead_letter_count(&self) -> Result<u64> {
        let store = self.records.read().await;
        let count = store
            .iter()
            .filter(|r| r.state() == RecordState::DeadLettered)
            .count();
        Ok(count as u64)
    }

    async fn oldest_pending_occurred_at(&self) -> Result<Option<DateTime<Utc>>> {
        let store = self.records.read().await;
        Ok(store
            .iter()
            .filter(|r| r.state() == RecordState::Pending)
            .map(|r| r.occurred_at)
            .min())
    }

    async fn list_dead_letters(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        let store = self.records.read().await;
        let mut dead: Vec<_> = store
            .iter()
            .filter(|r| r.state() == RecordState::DeadLettered)
            .cloned()
            .collect();
        dead.sort_by_key(|r| r.occurred_at);
        dead.truncate(effective_limit(limit));
        Ok(dead)
    }
}

type AggregateKey = (String, AggregateId);

/// In-memory persistence provider pairing aggregate state with an outbox.
///
/// Writes are staged on the transaction and applied under both locks on
/// commit, so readers observe either all of a transaction or none of it.
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    outbox: InMemoryOutboxStore,
    aggregates: Arc<RwLock<HashMap<AggregateKey, AggregateState>>>,
    fail_commits: Arc<AtomicBool>,
}

impl InMemoryPersistence {
    /// Creates an empty provider with its own outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a provider that writes into an existing outbox store.
    pub fn with_outbox(outbox: InMemoryOutboxStore) -> Self {
        Self {
            outbox,
            ..Self::default()
        }
    }

    /// Returns the outbox this provider writes into.
    pub fn outbox(&self) -> &InMemoryOutboxStore {
        &self.outbox
    }

    /// Makes every following commit fail until reset.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of stored aggregates.
    pub async fn aggregate_count(&self) -> usize {
        self.aggregates.read().await.len()
    }
}

#[async_trait]
impl PersistenceProvider for InMemoryPersistence {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Transaction> {
        Ok(InMemoryTransaction {
            persistence: self.clone(),
            aggregates: Vec::new(),
            records: Vec::new(),
        })
    }

    async fn load_aggregate(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Option<AggregateState>> {
        let aggregates = self.aggregates.read().await;
        Ok(aggregates
            .get(&(aggregate_type.to_string(), aggregate_id))
            .cloned())
    }
}

/// Staged writes of one in-memory transaction.
pub struct InMemoryTransaction {
    persistence: InMemoryPersistence,
    aggregates: Vec<AggregateState>,
    records: Vec<OutboxRecord>,
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn save_aggregate(&mut self, state: AggregateState) -> Result<()> {
        self.aggregates.push(state);
        Ok(())
    }

    async fn insert_outbox(&mut self, records: Vec<OutboxRecord>) -> Result<()> {
        validate_records_for_insert(&records)?;
        self.records.extend(records);
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        if self.persistence.fail_commits.load(Ordering::SeqCst) {
            return Err(OutboxStoreError::CommitFailed(
                "commit failure injected".to_string(),
            ));
        }

        let mut aggregates = self.persistence.aggregates.write().await;
        let mut outbox = self.persistence.outbox.records.write().await;

        // The outbox append is the only step that can fail, so it runs first
        InMemoryOutboxStore::append_locked(&mut outbox, self.records)?;
        for state in self.aggregates {
            aggregates.insert((state.aggregate_type.clone(), state.aggregate_id), state);
        }
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_test_record(occurred_at: DateTime<Utc>) -> OutboxRecord {
        OutboxRecord::new("mission.created", r#"{"mission_id":"x"}"#, occurred_at)
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = InMemoryOutboxStore::new();
        let record = create_test_record(Utc::now());
        let id = record.id;

        store.insert(vec![record.clone()]).await.unwrap();

        assert_eq!(store.get(id).await.unwrap(), Some(record));
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn insert_rejects_existing_id() {
        let store = InMemoryOutboxStore::new();
        let record = create_test_record(Utc::now());

        store.insert(vec![record.clone()]).await.unwrap();
        let result = store.insert(vec![record]).await;

        assert!(matches!(result, Err(OutboxStoreError::DuplicateRecord(_))));
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn select_due_batch_orders_oldest_first_and_caps() {
        let store = InMemoryOutboxStore::new();
        let now = Utc::now();
        let newest = create_test_record(now);
        let oldest = create_test_record(now - Duration::minutes(10));
        let middle = create_test_record(now - Duration::minutes(5));

        store
            .insert(vec![newest.clone(), oldest.clone(), middle.clone()])
            .await
            .unwrap();

        let batch = store.select_due_batch(2, now).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id, oldest.id);
        assert_eq!(batch[1].id, middle.id);
    }

    #[tokio::test]
    async fn select_due_batch_skips_future_and_terminal_records() {
        let store = InMemoryOutboxStore::new();
        let now = Utc::now();

        let future = create_test_record(now).with_next_attempt_at(now + Duration::minutes(5));
        let due = create_test_record(now);
        let processed = create_test_record(now);
        store
            .insert(vec![future, due.clone(), processed.clone()])
            .await
            .unwrap();

        let mut done = processed;
        done.mark_processed(now);
        store.save_outcomes(&[done]).await.unwrap();

        let batch = store.select_due_batch(10, now).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, due.id);
    }

    #[tokio::test]
    async fn select_due_batch_zero_limit_returns_one() {
        let store = InMemoryOutboxStore::new();
        let now = Utc::now();
        store
            .insert(vec![create_test_record(now), create_test_record(now)])
            .await
            .unwrap();

        let batch = store.select_due_batch(0, now).await.unwrap();
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn save_outcomes_unknown_record_leaves_store_untouched() {
        let store = InMemoryOutboxStore::new();
        let now = Utc::now();
        let known = create_test_record(now);
        store.insert(vec![known.clone()]).await.unwrap();

        let mut updated = known.clone();
        updated.mark_processed(now);
        let unknown = create_test_record(now);

        let result = store.save_outcomes(&[updated, unknown]).await;
        assert!(matches!(result, Err(OutboxStoreError::RecordNotFound(_))));
        assert_eq!(
            store.get(known.id).await.unwrap().unwrap().state(),
            RecordState::Pending
        );
    }

    #[tokio::test]
    async fn counts_dead_letters_and_oldest_pending() {
        let store = InMemoryOutboxStore::new();
        let now = Utc::now();
        let old = create_test_record(now - Duration::minutes(30));
        let pending = create_test_record(now - Duration::minutes(2));
        store
            .insert(vec![old.clone(), pending.clone()])
            .await
            .unwrap();

        assert_eq!(store.dead_letter_count().await.unwrap(), 0);
        assert_eq!(
            store.oldest_pending_occurred_at().await.unwrap(),
            Some(old.occurred_at)
        );

        let mut dead = old;
        dead.record_failure("boom");
        dead.mark_dead_lettered(now);
        store.save_outcomes(&[dead.clone()]).await.unwrap();

        assert_eq!(store.dead_letter_count().await.unwrap(), 1);
        assert_eq!(
            store.oldest_pending_occurred_at().await.unwrap(),
            Some(pending.occurred_at)
        );

        let listed = store.list_dead_letters(10).await.unwrap();
        assert_eq!(listed, vec![dead]);
    }

    #[tokio::test]
    async fn oldest_pending_is_none_when_empty() {
        let store = InMemoryOutboxStore::new();
        assert!(store.oldest_pending_occurred_at().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transaction_commit_applies_all_writes() {
        let persistence = InMemoryPersistence::new();
        let aggregate_id = AggregateId::new();

        let mut tx = persistence.begin().await.unwrap();
        tx.save_aggregate(AggregateState {
            aggregate_type: "Mission".to_string(),
            aggregate_id,
            state: serde_json::json!({"name": "Apollo"}),
            updated_at: Utc::now(),
        })
        .await
        .unwrap();
        tx.insert_outbox(vec![create_test_record(Utc::now())])
            .await
            .unwrap();

        // Nothing is visible before commit
        assert_eq!(persistence.outbox().record_count().await, 0);
        assert_eq!(persistence.aggregate_count().await, 0);

        tx.commit().await.unwrap();

        assert_eq!(persistence.outbox().record_count().await, 1);
        let loaded = persistence
            .load_aggregate("Mission", aggregate_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.state["name"], "Apollo");
    }

    #[tokio::test]
    async fn failed_commit_writes_nothing() {
        let persistence = InMemoryPersistence::new();
        persistence.set_fail_commits(true);

        let mut tx = persistence.begin().await.unwrap();
        tx.insert_outbox(vec![create_test_record(Utc::now())])
            .await
            .unwrap();
        let result = tx.commit().await;

        assert!(matches!(result, Err(OutboxStoreError::CommitFailed(_))));
        assert_eq!(persistence.outbox().record_count().await, 0);
    }

    #[tokio::test]
    async fn rollback_discards_writes() {
        let persistence = InMemoryPersistence::new();
        let mut tx = persistence.begin().await.unwrap();
        tx.insert_outbox(vec![create_test_record(Utc::now())])
            .await
            .unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(persistence.outbox().record_count().await, 0);
    }
}
