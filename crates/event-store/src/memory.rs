use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{EventId, OrderId, SagaKey, TransactionId};
use domain::{Event, Order};
use tokio::sync::RwLock;

use crate::{
    EventStoreError, Result,
    store::{CompensationRecord, CompensationStore, OrderStore, SagaEventStore},
};

struct InMemoryCompensationState<R> {
    records: HashMap<SagaKey, R>,
    fail_on_save: bool,
}

/// In-memory compensation store.
///
/// Provides the same interface as the PostgreSQL implementation and supports
/// failure injection for tests.
pub struct InMemoryCompensationStore<R> {
    state: Arc<RwLock<InMemoryCompensationState<R>>>,
}

impl<R> Clone for InMemoryCompensationStore<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<R> Default for InMemoryCompensationStore<R> {
    fn default() -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryCompensationState {
                records: HashMap::new(),
                fail_on_save: false,
            })),
        }
    }
}

impl<R: CompensationRecord> InMemoryCompensationStore<R> {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `create`/`save` fail while set.
    pub async fn set_fail_on_save(&self, fail: bool) {
        self.state.write().await.fail_on_save = fail;
    }

    /// Returns the number of stored records.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }

    fn latest_by<'a>(records: impl Iterator<Item = &'a R>) -> Option<R> {
        records.max_by_key(|r| r.created_at()).cloned()
    }
}

#[async_trait]
impl<R: CompensationRecord> CompensationStore<R> for InMemoryCompensationStore<R> {
    async fn exists_by_order_and_transaction(&self, key: &SagaKey) -> Result<bool> {
        Ok(self.state.read().await.records.contains_key(key))
    }

    async fn find_by_order_and_transaction(&self, key: &SagaKey) -> Result<Option<R>> {
        Ok(self.state.read().await.records.get(key).cloned())
    }

    async fn find_latest_by_order(&self, order_id: OrderId) -> Result<Option<R>> {
        let state = self.state.read().await;
        Ok(Self::latest_by(
            state.records.values().filter(|r| r.key().order_id == order_id),
        ))
    }

    async fn find_latest_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<R>> {
        let state = self.state.read().await;
        Ok(Self::latest_by(
            state
                .records
                .values()
                .filter(|r| &r.key().transaction_id == transaction_id),
        ))
    }

    async fn create(&self, record: &R) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_save {
            return Err(EventStoreError::Unavailable(format!(
                "{} store rejected write",
                R::KIND
            )));
        }
        if state.records.contains_key(record.key()) {
            metrics::counter!("store_duplicate_keys_total", "kind" => R::KIND).increment(1);
            return Err(EventStoreError::DuplicateKey {
                kind: R::KIND,
                key: record.key().to_string(),
            });
        }
        state.records.insert(record.key().clone(), record.clone());
        Ok(())
    }

    async fn save(&self, record: &R) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_save {
            return Err(EventStoreError::Unavailable(format!(
                "{} store rejected write",
                R::KIND
            )));
        }
        state.records.insert(record.key().clone(), record.clone());
        Ok(())
    }
}

/// In-memory order store.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, order: &Order) -> Result<()> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }
}

/// In-memory saga audit log.
#[derive(Clone, Default)]
pub struct InMemorySagaEventStore {
    events: Arc<RwLock<HashMap<EventId, Event>>>,
}

impl InMemorySagaEventStore {
    /// Creates a new empty audit log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored events.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl SagaEventStore for InMemorySagaEventStore {
    async fn save(&self, event: &Event) -> Result<()> {
        self.events.write().await.insert(event.id, event.clone());
        Ok(())
    }

    async fn find_latest_by_order(&self, order_id: OrderId) -> Result<Option<Event>> {
        let events = self.events.read().await;
        Ok(events
            .values()
            .filter(|e| e.order_id == order_id)
            .max_by_key(|e| e.created_at)
            .cloned())
    }

    async fn find_latest_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<Event>> {
        let events = self.events.read().await;
        Ok(events
            .values()
            .filter(|e| &e.transaction_id == transaction_id)
            .max_by_key(|e| e.created_at)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Event>> {
        let mut events: Vec<Event> = self.events.read().await.values().cloned().collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use domain::{Money, OrderLine, Product};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct TestRecord {
        key: SagaKey,
        applied: bool,
        created_at: DateTime<Utc>,
    }

    impl CompensationRecord for TestRecord {
        const KIND: &'static str = "test";

        fn key(&self) -> &SagaKey {
            &self.key
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }
    }

    fn record(order_id: OrderId, tx: &str, age_secs: i64) -> TestRecord {
        TestRecord {
            key: SagaKey::new(order_id, TransactionId::new(tx)),
            applied: true,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    fn sample_order() -> Order {
        Order::new(vec![OrderLine::new(
            Product::new("BOOKS", Money::from_dollars(10)),
            1,
        )])
    }

    #[tokio::test]
    async fn create_then_exists() {
        let store = InMemoryCompensationStore::new();
        let rec = record(OrderId::new(), "1_a", 0);

        assert!(!store.exists_by_order_and_transaction(&rec.key).await.unwrap());
        store.create(&rec).await.unwrap();
        assert!(store.exists_by_order_and_transaction(&rec.key).await.unwrap());
        assert_eq!(
            store.find_by_order_and_transaction(&rec.key).await.unwrap(),
            Some(rec)
        );
    }

    #[tokio::test]
    async fn create_rejects_duplicate_key() {
        let store = InMemoryCompensationStore::new();
        let rec = record(OrderId::new(), "1_a", 0);
        store.create(&rec).await.unwrap();

        let result = store.create(&rec).await;
        assert!(matches!(
            result,
            Err(EventStoreError::DuplicateKey { kind: "test", .. })
        ));
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn save_updates_in_place() {
        let store = InMemoryCompensationStore::new();
        let mut rec = record(OrderId::new(), "1_a", 0);
        store.create(&rec).await.unwrap();

        rec.applied = false;
        store.save(&rec).await.unwrap();

        let stored = store
            .find_by_order_and_transaction(&rec.key)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.applied);
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn find_latest_by_order_and_transaction() {
        let store = InMemoryCompensationStore::new();
        let order_id = OrderId::new();
        store.create(&record(order_id, "1_old", 60)).await.unwrap();
        store.create(&record(order_id, "2_new", 0)).await.unwrap();
        store.create(&record(OrderId::new(), "3_other", 0)).await.unwrap();

        let latest = store.find_latest_by_order(order_id).await.unwrap().unwrap();
        assert_eq!(latest.key.transaction_id.as_str(), "2_new");

        let by_tx = store
            .find_latest_by_transaction(&TransactionId::new("1_old"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_tx.key.order_id, order_id);
    }

    #[tokio::test]
    async fn fail_on_save_rejects_writes() {
        let store = InMemoryCompensationStore::new();
        store.set_fail_on_save(true).await;

        let rec = record(OrderId::new(), "1_a", 0);
        assert!(matches!(
            store.create(&rec).await,
            Err(EventStoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.save(&rec).await,
            Err(EventStoreError::Unavailable(_))
        ));
        assert_eq!(store.record_count().await, 0);
    }

    #[tokio::test]
    async fn order_store_roundtrip() {
        let store = InMemoryOrderStore::new();
        let order = sample_order();
        store.save(&order).await.unwrap();

        assert_eq!(store.find_by_id(order.id).await.unwrap(), Some(order));
        assert!(store.find_by_id(OrderId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saga_event_store_replaces_revision_with_same_id() {
        let store = InMemorySagaEventStore::new();
        let mut event = Event::start(sample_order());
        store.save(&event).await.unwrap();

        event.record(
            domain::EventSource::Orchestrator,
            domain::SagaStatus::Success,
            "Saga finished successfully!",
        );
        store.save(&event).await.unwrap();

        assert_eq!(store.event_count().await, 1);
        let latest = store
            .find_latest_by_order(event.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.history().len(), 1);
    }

    #[tokio::test]
    async fn saga_event_store_lists_newest_first() {
        let store = InMemorySagaEventStore::new();
        let mut older = Event::start(sample_order());
        older.created_at = Utc::now() - Duration::seconds(30);
        let newer = Event::start(sample_order());
        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();

        let all = store.find_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, newer.id);
        assert_eq!(all[1].id, older.id);

        let by_tx = store
            .find_latest_by_transaction(&older.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_tx.id, older.id);
    }
}
