use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{AggregateId, SystemClock, UserId};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use delivery::{
    CollaboratorNotificationSubscriber, EventEnvelope, InMemoryNotificationInbox, OutboxProcessor,
    RetryPolicy, Subscriber, SubscriberError, SubscriberRegistry,
};
use domain::event::CollaboratorAdded;
use domain::{DomainEvent, EventType, codec};
use outbox_store::{InMemoryOutboxStore, OutboxRecord, OutboxStore};

struct Failing;

#[async_trait]
impl Subscriber for Failing {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn handle(&self, _envelope: &EventEnvelope) -> Result<(), SubscriberError> {
        Err(SubscriberError::retryable("unavailable"))
    }
}

fn seeded_store(rt: &tokio::runtime::Runtime, count: usize) -> InMemoryOutboxStore {
    let store = InMemoryOutboxStore::new();
    let now = chrono::Utc::now();
    let records = (0..count)
        .map(|_| {
            let encoded = codec::encode(&DomainEvent::CollaboratorAdded(CollaboratorAdded {
                mission_id: AggregateId::new(),
                collaborator_id: UserId::new(),
                added_by: UserId::new(),
            }))
            .unwrap();
            OutboxRecord::new(encoded.event_type.as_str(), encoded.payload, now)
        })
        .collect();
    rt.block_on(store.insert(records)).unwrap();
    store
}

fn processor(
    store: InMemoryOutboxStore,
    registry: SubscriberRegistry,
) -> OutboxProcessor<InMemoryOutboxStore> {
    OutboxProcessor::new(
        store,
        Arc::new(registry),
        SystemClock::shared(),
        RetryPolicy::new(5, Duration::from_secs(5), Duration::from_secs(300)),
    )
}

fn bench_deliver_batch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("delivery/process_100_records", |b| {
        b.iter_batched(
            || {
                let mut registry = SubscriberRegistry::new();
                CollaboratorNotificationSubscriber::new(InMemoryNotificationInbox::new())
                    .register(&mut registry);
                processor(seeded_store(&rt, 100), registry)
            },
            |processor| rt.block_on(processor.process_pending(100)).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

fn bench_retry_batch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("delivery/reschedule_100_records", |b| {
        b.iter_batched(
            || {
                let registry =
                    SubscriberRegistry::new().with(EventType::CollaboratorAdded, Arc::new(Failing));
                processor(seeded_store(&rt, 100), registry)
            },
            |processor| rt.block_on(processor.process_pending(100)).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_deliver_batch, bench_retry_batch);
criterion_main!(benches);
