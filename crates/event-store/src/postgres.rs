use std::marker::PhantomData;

use async_trait::async_trait;
use common::{OrderId, SagaKey, TransactionId};
use domain::{Event, Order};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    EventStoreError, Result,
    store::{CompensationRecord, CompensationStore, OrderStore, SagaEventStore},
};

/// Runs the database migrations shared by every PostgreSQL store.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}

/// PostgreSQL-backed compensation store.
///
/// Records of every participant share one table; rows are scoped by
/// [`CompensationRecord::KIND`].
pub struct PostgresCompensationStore<R> {
    pool: PgPool,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for PostgresCompensationStore<R> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: CompensationRecord> PostgresCompensationStore<R> {
    /// Creates a new store on the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _record: PhantomData,
        }
    }

    fn row_to_record(row: PgRow) -> Result<R> {
        let record: serde_json::Value = row.try_get("record")?;
        Ok(serde_json::from_value(record)?)
    }
}

#[async_trait]
impl<R: CompensationRecord> CompensationStore<R> for PostgresCompensationStore<R> {
    async fn exists_by_order_and_transaction(&self, key: &SagaKey) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM compensation_records
                WHERE kind = $1 AND order_id = $2 AND transaction_id = $3
            )
            "#,
        )
        .bind(R::KIND)
        .bind(key.order_id.as_uuid())
        .bind(key.transaction_id.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn find_by_order_and_transaction(&self, key: &SagaKey) -> Result<Option<R>> {
        let row = sqlx::query(
            r#"
            SELECT record FROM compensation_records
            WHERE kind = $1 AND order_id = $2 AND transaction_id = $3
            "#,
        )
        .bind(R::KIND)
        .bind(key.order_id.as_uuid())
        .bind(key.transaction_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn find_latest_by_order(&self, order_id: OrderId) -> Result<Option<R>> {
        let row = sqlx::query(
            r#"
            SELECT record FROM compensation_records
            WHERE kind = $1 AND order_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(R::KIND)
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn find_latest_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<R>> {
        let row = sqlx::query(
            r#"
            SELECT record FROM compensation_records
            WHERE kind = $1 AND transaction_id = $2
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(R::KIND)
        .bind(transaction_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    #[tracing::instrument(skip(self, record), fields(kind = R::KIND, key = %record.key()))]
    async fn create(&self, record: &R) -> Result<()> {
        let key = record.key();
        let json = serde_json::to_value(record)?;

        sqlx::query(
            r#"
            INSERT INTO compensation_records (kind, order_id, transaction_id, record, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(R::KIND)
        .bind(key.order_id.as_uuid())
        .bind(key.transaction_id.as_str())
        .bind(json)
        .bind(record.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_compensation_key")
            {
                tracing::debug!("compensation record already exists");
                metrics::counter!("store_duplicate_keys_total", "kind" => R::KIND).increment(1);
                return EventStoreError::DuplicateKey {
                    kind: R::KIND,
                    key: key.to_string(),
                };
            }
            EventStoreError::Database(e)
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self, record), fields(kind = R::KIND, key = %record.key()))]
    async fn save(&self, record: &R) -> Result<()> {
        let key = record.key();
        let json = serde_json::to_value(record)?;

        sqlx::query(
            r#"
            INSERT INTO compensation_records (kind, order_id, transaction_id, record, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (kind, order_id, transaction_id) DO UPDATE SET
                record = EXCLUDED.record,
                updated_at = NOW()
            "#,
        )
        .bind(R::KIND)
        .bind(key.order_id.as_uuid())
        .bind(key.transaction_id.as_str())
        .bind(json)
        .bind(record.created_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new order store on the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn save(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, transaction_id, payload, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                transaction_id = EXCLUDED.transaction_id,
                payload = EXCLUDED.payload
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.transaction_id.as_str())
        .bind(serde_json::to_value(order)?)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        let payload: Option<serde_json::Value> =
            sqlx::query_scalar("SELECT payload FROM orders WHERE id = $1")
                .bind(order_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        Ok(payload.map(serde_json::from_value).transpose()?)
    }
}

/// PostgreSQL-backed saga audit log.
#[derive(Clone)]
pub struct PostgresSagaEventStore {
    pool: PgPool,
}

impl PostgresSagaEventStore {
    /// Creates a new audit log on the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: PgRow) -> Result<Event> {
        let event: serde_json::Value = row.try_get("event")?;
        Ok(serde_json::from_value(event)?)
    }
}

#[async_trait]
impl SagaEventStore for PostgresSagaEventStore {
    async fn save(&self, event: &Event) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO saga_events (id, order_id, transaction_id, event, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                event = EXCLUDED.event,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.order_id.as_uuid())
        .bind(event.transaction_id.as_str())
        .bind(serde_json::to_value(event)?)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_latest_by_order(&self, order_id: OrderId) -> Result<Option<Event>> {
        let row = sqlx::query(
            r#"
            SELECT event FROM saga_events
            WHERE order_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_event).transpose()
    }

    async fn find_latest_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<Event>> {
        let row = sqlx::query(
            r#"
            SELECT event FROM saga_events
            WHERE transaction_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(transaction_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_event).transpose()
    }

    async fn find_all(&self) -> Result<Vec<Event>> {
        let rows = sqlx::query("SELECT event FROM saga_events ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }
}
