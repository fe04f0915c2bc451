use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AggregateState, OutboxId, OutboxRecord, OutboxStoreError, Result,
    store::{OutboxStore, effective_limit, validate_records_for_insert},
    transaction::{PersistenceProvider, StoreTransaction},
};

const RECORD_COLUMNS: &str = "id, occurred_at, event_type, payload, retry_count, \
     next_attempt_at, processed_at, dead_lettered_at, last_error";

/// PostgreSQL-backed outbox store implementation.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
}

impl PostgresOutboxStore {
    /// Creates a new PostgreSQL outbox store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: PgRow) -> Result<OutboxRecord> {
        let retry_count: i32 = row.try_get("retry_count")?;

        Ok(OutboxRecord {
            id: OutboxId::from_uuid(row.try_get::<Uuid, _>("id")?),
            occurred_at: row.try_get("occurred_at")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            retry_count: u32::try_from(retry_count).unwrap_or_default(),
            next_attempt_at: row.try_get("next_attempt_at")?,
            processed_at: row.try_get("processed_at")?,
            dead_lettered_at: row.try_get("dead_lettered_at")?,
            last_error: row.try_get("last_error")?,
        })
    }

    /// Inserts records inside a caller-owned transaction.
    pub async fn insert_in_tx(
        tx: &mut Transaction<'static, Postgres>,
        records: &[OutboxRecord],
    ) -> Result<()> {
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO outbox_messages
                    (id, occurred_at, event_type, payload, retry_count, next_attempt_at,
                     processed_at, dead_lettered_at, last_error)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(record.id.as_uuid())
            .bind(record.occurred_at)
            .bind(&record.event_type)
            .bind(&record.payload)
            .bind(retry_count_column(record.retry_count))
            .bind(record.next_attempt_at)
            .bind(record.processed_at)
            .bind(record.dead_lettered_at)
            .bind(&record.last_error)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("outbox_messages_pkey")
                {
                    return OutboxStoreError::DuplicateRecord(record.id);
                }
                OutboxStoreError::Database(e)
            })?;
        }
        Ok(())
    }
}

fn retry_count_column(retry_count: u32) -> i32 {
    i32::try_from(retry_count).unwrap_or(i32::MAX)
}

fn limit_column(limit: usize) -> i64 {
    i64::try_from(effective_limit(limit)).unwrap_or(i64::MAX)
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    #[tracing::instrument(skip(self, records), fields(count = records.len()))]
    async fn insert(&self, records: Vec<OutboxRecord>) -> Result<()> {
        validate_records_for_insert(&records)?;

        let mut tx = self.pool.begin().await?;
        Self::insert_in_tx(&mut tx, &records).await?;
        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn select_due_batch(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboxRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM outbox_messages
            WHERE processed_at IS NULL
              AND dead_lettered_at IS NULL
              AND (next_attempt_at IS NULL OR next_attempt_at <= $1)
            ORDER BY occurred_at ASC, seq ASC
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(limit_column(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }

    #[tracing::instrument(skip(self, records), fields(count = records.len()))]
    async fn save_outcomes(&self, records: &[OutboxRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            let result = sqlx::query(
                r#"
                UPDATE outbox_messages
                SET retry_count = $2,
                    next_attempt_at = $3,
                    processed_at = $4,
                    dead_lettered_at = $5,
                    last_error = $6
                WHERE id = $1
                "#,
            )
            .bind(record.id.as_uuid())
            .bind(retry_count_column(record.retry_count))
            .bind(record.next_attempt_at)
            .bind(record.processed_at)
            .bind(record.dead_lettered_at)
            .bind(&record.last_error)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                tracing::warn!(record_id = %record.id, "outcome for unknown outbox record");
                return Err(OutboxStoreError::RecordNotFound(record.id));
            }
        }
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: OutboxId) -> Result<Option<OutboxRecord>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM outbox_messages WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn dead_letter_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM outbox_messages WHERE dead_lettered_at IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn oldest_pending_occurred_at(&self) -> Result<Option<DateTime<Utc>>> {
        let oldest: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            SELECT MIN(occurred_at)
            FROM outbox_messages
            WHERE processed_at IS NULL AND dead_lettered_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(oldest)
    }

    async fn list_dead_letters(&self, limit: usize) -> Result<Vec<OutboxRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM outbox_messages
            WHERE dead_lettered_at IS NOT NULL
            ORDER BY occurred_at ASC, seq ASC
            LIMIT $1
            "#
        ))
        .bind(limit_column(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
    }
}

/// PostgreSQL persistence provider; one database transaction per unit of work.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Creates a new provider on the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PersistenceProvider for PostgresPersistence {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Transaction> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }

    async fn load_aggregate(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Option<AggregateState>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT aggregate_type, aggregate_id, state, updated_at
            FROM aggregates
            WHERE aggregate_type = $1 AND aggregate_id = $2
            "#,
        )
        .bind(aggregate_type)
        .bind(aggregate_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(AggregateState {
                aggregate_type: row.try_get("aggregate_type")?,
                aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
                state: row.try_get("state")?,
                updated_at: row.try_get("updated_at")?,
            })),
            None => Ok(None),
        }
    }
}

/// An open PostgreSQL transaction.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn save_aggregate(&mut self, state: AggregateState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO aggregates (aggregate_type, aggregate_id, state, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (aggregate_type, aggregate_id) DO UPDATE SET
                state = EXCLUDED.state,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&state.aggregate_type)
        .bind(state.aggregate_id.as_uuid())
        .bind(&state.state)
        .bind(state.updated_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_outbox(&mut self, records: Vec<OutboxRecord>) -> Result<()> {
        validate_records_for_insert(&records)?;
        PostgresOutboxStore::insert_in_tx(&mut self.tx, &records).await
    }

    async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| OutboxStoreError::CommitFailed(e.to_string()))
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
