//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{OrderId, SagaKey, TransactionId};
use domain::{Event, EventSource, Money, Order, OrderLine, Product, SagaStatus};
use event_store::{
    CompensationRecord, CompensationStore, EventStoreError, OrderStore,
    PostgresCompensationStore, PostgresOrderStore, PostgresSagaEventStore, SagaEventStore,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_saga_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh pool with cleared tables
async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE orders, saga_events, compensation_records")
        .execute(&pool)
        .await
        .unwrap();

    pool
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Ledger {
    key: SagaKey,
    refunded: bool,
    created_at: DateTime<Utc>,
}

impl CompensationRecord for Ledger {
    const KIND: &'static str = "ledger";

    fn key(&self) -> &SagaKey {
        &self.key
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Marker {
    key: SagaKey,
    created_at: DateTime<Utc>,
}

impl CompensationRecord for Marker {
    const KIND: &'static str = "marker";

    fn key(&self) -> &SagaKey {
        &self.key
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

fn ledger(order_id: OrderId, tx: &str, age_secs: i64) -> Ledger {
    Ledger {
        key: SagaKey::new(order_id, TransactionId::new(tx)),
        refunded: false,
        created_at: Utc::now() - Duration::seconds(age_secs),
    }
}

fn sample_order() -> Order {
    Order::new(vec![OrderLine::new(
        Product::new("COMIC_BOOKS", Money::from_cents(1500)),
        3,
    )])
}

#[tokio::test]
async fn compensation_create_and_find() {
    let store = PostgresCompensationStore::<Ledger>::new(get_test_pool().await);
    let record = ledger(OrderId::new(), "100_a", 0);

    assert!(
        !store
            .exists_by_order_and_transaction(&record.key)
            .await
            .unwrap()
    );
    store.create(&record).await.unwrap();
    assert!(
        store
            .exists_by_order_and_transaction(&record.key)
            .await
            .unwrap()
    );

    let found = store
        .find_by_order_and_transaction(&record.key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.key, record.key);
    assert!(!found.refunded);
}

#[tokio::test]
async fn compensation_create_rejects_duplicate_key() {
    let store = PostgresCompensationStore::<Ledger>::new(get_test_pool().await);
    let record = ledger(OrderId::new(), "100_a", 0);
    store.create(&record).await.unwrap();

    let result = store.create(&record).await;
    assert!(matches!(
        result,
        Err(EventStoreError::DuplicateKey { kind: "ledger", .. })
    ));
}

#[tokio::test]
async fn compensation_save_updates_existing_row() {
    let store = PostgresCompensationStore::<Ledger>::new(get_test_pool().await);
    let mut record = ledger(OrderId::new(), "100_a", 0);
    store.create(&record).await.unwrap();

    record.refunded = true;
    store.save(&record).await.unwrap();

    let found = store
        .find_by_order_and_transaction(&record.key)
        .await
        .unwrap()
        .unwrap();
    assert!(found.refunded);
}

#[tokio::test]
async fn compensation_kinds_do_not_collide() {
    let pool = get_test_pool().await;
    let ledgers = PostgresCompensationStore::<Ledger>::new(pool.clone());
    let markers = PostgresCompensationStore::<Marker>::new(pool);

    let record = ledger(OrderId::new(), "100_a", 0);
    ledgers.create(&record).await.unwrap();

    assert!(
        !markers
            .exists_by_order_and_transaction(&record.key)
            .await
            .unwrap()
    );
    markers
        .create(&Marker {
            key: record.key.clone(),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn compensation_find_latest() {
    let store = PostgresCompensationStore::<Ledger>::new(get_test_pool().await);
    let order_id = OrderId::new();
    store.create(&ledger(order_id, "100_old", 60)).await.unwrap();
    store.create(&ledger(order_id, "200_new", 0)).await.unwrap();

    let latest = store.find_latest_by_order(order_id).await.unwrap().unwrap();
    assert_eq!(latest.key.transaction_id.as_str(), "200_new");

    let by_tx = store
        .find_latest_by_transaction(&TransactionId::new("100_old"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_tx.key.order_id, order_id);

    assert!(
        store
            .find_latest_by_order(OrderId::new())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn order_store_roundtrip() {
    let store = PostgresOrderStore::new(get_test_pool().await);
    let order = sample_order();

    store.save(&order).await.unwrap();
    let found = store.find_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(found.id, order.id);
    assert_eq!(found.transaction_id, order.transaction_id);
    assert_eq!(found.products, order.products);

    assert!(store.find_by_id(OrderId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn saga_event_store_upserts_by_id() {
    let store = PostgresSagaEventStore::new(get_test_pool().await);
    let mut event = Event::start(sample_order());
    store.save(&event).await.unwrap();

    event.record(
        EventSource::Orchestrator,
        SagaStatus::Fail,
        "Saga finished with errors!",
    );
    store.save(&event).await.unwrap();

    let all = store.find_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, SagaStatus::Fail);
    assert_eq!(all[0].history().len(), 1);
}

#[tokio::test]
async fn saga_event_store_queries_latest_and_orders_newest_first() {
    let store = PostgresSagaEventStore::new(get_test_pool().await);

    let mut older = Event::start(sample_order());
    older.created_at = Utc::now() - Duration::seconds(30);
    let newer = Event::start(sample_order());
    store.save(&older).await.unwrap();
    store.save(&newer).await.unwrap();

    let all = store.find_all().await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, newer.id);
    assert_eq!(all[1].id, older.id);

    let by_order = store
        .find_latest_by_order(older.order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_order.id, older.id);

    let by_tx = store
        .find_latest_by_transaction(&newer.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_tx.id, newer.id);
}
