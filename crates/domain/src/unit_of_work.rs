//! Atomic commit of aggregate state together with the events it raised.

use common::{AggregateId, SharedClock};
use outbox_store::{AggregateState, OutboxRecord, PersistenceProvider, StoreTransaction};
use serde::de::DeserializeOwned;

use crate::aggregate::{Aggregate, EventSource, TrackedAggregate};
use crate::codec;
use crate::error::DomainError;

/// Commits aggregates and their pending events in one transaction.
///
/// The unit of work:
/// 1. Captures the pending events of every participating aggregate, keeping
///    each aggregate's insertion order (no order is imposed across aggregates)
/// 2. Writes every aggregate's state
/// 3. Writes one outbox record per captured event in the same transaction
/// 4. Commits, then clears the captured buffers
///
/// A failed commit writes nothing and leaves the buffers intact.
pub struct UnitOfWork<P: PersistenceProvider> {
    provider: P,
    clock: SharedClock,
}

impl<P: PersistenceProvider> UnitOfWork<P> {
    /// Creates a unit of work over the given provider.
    pub fn new(provider: P, clock: SharedClock) -> Self {
        Self { provider, clock }
    }

    /// Returns a reference to the underlying persistence provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Commits the given aggregates and returns the outbox records written.
    #[tracing::instrument(skip_all, fields(aggregates = aggregates.len()))]
    pub async fn commit(
        &self,
        aggregates: &mut [&mut dyn TrackedAggregate],
    ) -> Result<Vec<OutboxRecord>, DomainError> {
        let now = self.clock.now();

        let mut records = Vec::new();
        for aggregate in aggregates.iter().filter(|a| a.has_pending_events()) {
            for event in aggregate.pending_events() {
                let encoded = codec::encode(event)?;
                records.push(OutboxRecord::new(
                    encoded.event_type.as_str(),
                    encoded.payload,
                    now,
                ));
            }
        }

        let mut states = Vec::with_capacity(aggregates.len());
        for aggregate in aggregates.iter() {
            states.push(AggregateState {
                aggregate_type: aggregate.aggregate_type().to_string(),
                aggregate_id: aggregate.aggregate_id(),
                state: aggregate.state()?,
                updated_at: now,
            });
        }

        let mut tx = self.provider.begin().await?;
        if let Err(e) = Self::write(&mut tx, states, records.clone()).await {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback after failed write also failed");
            }
            return Err(e);
        }
        tx.commit().await?;

        for aggregate in aggregates.iter_mut() {
            aggregate.clear_events();
        }

        metrics::counter!("outbox_events_captured_total").increment(records.len() as u64);
        tracing::debug!(events = records.len(), "unit of work committed");

        Ok(records)
    }

    /// Commits a single aggregate.
    pub async fn commit_one<A: Aggregate>(
        &self,
        aggregate: &mut A,
    ) -> Result<Vec<OutboxRecord>, DomainError> {
        self.commit(&mut [aggregate as &mut dyn TrackedAggregate]).await
    }

    /// Loads the last committed state of an aggregate.
    pub async fn load<A: Aggregate + DeserializeOwned>(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Option<A>, DomainError> {
        let state = self
            .provider
            .load_aggregate(<A as Aggregate>::aggregate_type(), aggregate_id)
            .await?;

        match state {
            Some(state) => Ok(Some(serde_json::from_value(state.state)?)),
            None => Ok(None),
        }
    }

    async fn write(
        tx: &mut P::Transaction,
        states: Vec<AggregateState>,
        records: Vec<OutboxRecord>,
    ) -> Result<(), DomainError> {
        for state in states {
            tx.save_aggregate(state).await?;
        }
        if !records.is_empty() {
            tx.insert_outbox(records).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::Mission;
    use chrono::Duration;
    use common::{Clock, ManualClock, UserId};
    use outbox_store::{InMemoryPersistence, OutboxStore, RecordState};
    use std::sync::Arc;

    fn create_unit_of_work() -> (UnitOfWork<InMemoryPersistence>, ManualClock) {
        let clock = ManualClock::starting_now();
        let uow = UnitOfWork::new(InMemoryPersistence::new(), Arc::new(clock.clone()));
        (uow, clock)
    }

    #[tokio::test]
    async fn commit_writes_one_record_per_event() {
        let (uow, clock) = create_unit_of_work();
        let owner = UserId::new();
        let mut mission = Mission::create("Apollo", owner).unwrap();
        mission.add_collaborator(UserId::new(), owner).unwrap();
        mission.add_objective("Orbit").unwrap();

        let records = uow.commit_one(&mut mission).await.unwrap();

        assert_eq!(records.len(), 3);
        for record in &records {
            assert_eq!(record.retry_count, 0);
            assert_eq!(record.next_attempt_at, Some(clock.now()));
            assert_eq!(record.occurred_at, clock.now());
            assert_eq!(record.state(), RecordState::Pending);
        }
        assert_eq!(uow.provider().outbox().record_count().await, 3);
        assert!(!mission.has_pending_events());
    }

    #[tokio::test]
    async fn commit_preserves_per_aggregate_order() {
        let (uow, _clock) = create_unit_of_work();
        let owner = UserId::new();
        let mut first = Mission::create("First", owner).unwrap();
        first.rename("First (renamed)").unwrap();
        let mut second = Mission::create("Second", owner).unwrap();
        second.add_objective("Orbit").unwrap();

        let records = uow
            .commit(&mut [
                &mut first as &mut dyn TrackedAggregate,
                &mut second as &mut dyn TrackedAggregate,
            ])
            .await
            .unwrap();

        let tags: Vec<_> = records.iter().map(|r| r.event_type.as_str()).collect();
        assert_eq!(
            tags,
            vec![
                "mission.created",
                "mission.renamed",
                "mission.created",
                "mission.objective_added",
            ]
        );
    }

    #[tokio::test]
    async fn commit_without_events_still_saves_state() {
        let (uow, _clock) = create_unit_of_work();
        let mut mission = Mission::create("Apollo", UserId::new()).unwrap();
        mission.clear_events();

        let records = uow.commit_one(&mut mission).await.unwrap();

        assert!(records.is_empty());
        assert_eq!(uow.provider().outbox().record_count().await, 0);
        let loaded: Mission = uow.load(mission.id()).await.unwrap().unwrap();
        assert_eq!(loaded.name(), "Apollo");
    }

    #[tokio::test]
    async fn failed_commit_writes_nothing_and_keeps_events() {
        let (uow, clock) = create_unit_of_work();
        let mut mission = Mission::create("Apollo", UserId::new()).unwrap();
        uow.provider().set_fail_commits(true);

        let result = uow.commit_one(&mut mission).await;

        assert!(matches!(result, Err(DomainError::Store(_))));
        assert_eq!(uow.provider().outbox().record_count().await, 0);
        assert!(uow.load::<Mission>(mission.id()).await.unwrap().is_none());
        assert_eq!(mission.pending_events().len(), 1);

        // Retrying once the store recovers commits the same events
        uow.provider().set_fail_commits(false);
        clock.advance(Duration::seconds(1));
        let records = uow.commit_one(&mut mission).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].occurred_at, clock.now());
    }

    #[tokio::test]
    async fn records_are_due_immediately() {
        let (uow, clock) = create_unit_of_work();
        let mut mission = Mission::create("Apollo", UserId::new()).unwrap();
        uow.commit_one(&mut mission).await.unwrap();

        let due = uow
            .provider()
            .outbox()
            .select_due_batch(10, clock.now())
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
    }
}
