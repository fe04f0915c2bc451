pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;
pub mod transaction;

pub use common::{AggregateId, Clock};
pub use error::{OutboxStoreError, Result};
pub use memory::{InMemoryOutboxStore, InMemoryPersistence, InMemoryTransaction};
pub use postgres::{PostgresOutboxStore, PostgresPersistence, PostgresTransaction};
pub use record::{OutboxId, OutboxRecord, RecordState};
pub use store::{OutboxStore, OutboxStoreExt};
pub use transaction::{AggregateState, PersistenceProvider, StoreTransaction};
