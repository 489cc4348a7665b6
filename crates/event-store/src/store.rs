//! Storage traits for orders, the saga audit log and compensation records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, SagaKey, TransactionId};
use domain::{Event, Order};
use serde::{Serialize, de::DeserializeOwned};

use crate::Result;

/// A persisted snapshot that lets a participant reverse its local step.
///
/// Each participant owns exactly one record type and never reads another
/// participant's records.
pub trait CompensationRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Name of the record kind, used to scope rows in shared storage.
    const KIND: &'static str;

    /// Returns the `(order, transaction)` pair this record belongs to.
    fn key(&self) -> &SagaKey;

    /// Returns when the record was first created.
    fn created_at(&self) -> DateTime<Utc>;
}

/// Store of compensation records for a single participant.
///
/// At most one record exists per [`SagaKey`]. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait CompensationStore<R: CompensationRecord>: Send + Sync {
    /// Returns true if a record exists for the key.
    async fn exists_by_order_and_transaction(&self, key: &SagaKey) -> Result<bool>;

    /// Retrieves the record for the key.
    async fn find_by_order_and_transaction(&self, key: &SagaKey) -> Result<Option<R>>;

    /// Retrieves the most recently created record for an order.
    async fn find_latest_by_order(&self, order_id: OrderId) -> Result<Option<R>>;

    /// Retrieves the most recently created record for a transaction.
    async fn find_latest_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<R>>;

    /// Inserts a new record.
    ///
    /// Fails with `DuplicateKey` if a record already exists for the key, so
    /// two concurrent deliveries of the same step cannot both apply.
    async fn create(&self, record: &R) -> Result<()>;

    /// Inserts or replaces the record for its key.
    async fn save(&self, record: &R) -> Result<()>;
}

/// Store of orders accepted by intake.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists an order, replacing any previous version.
    async fn save(&self, order: &Order) -> Result<()>;

    /// Retrieves an order by ID.
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<Order>>;
}

/// Audit log of saga envelopes.
///
/// Read-only reporting: nothing in the routing path consults this store.
#[async_trait]
pub trait SagaEventStore: Send + Sync {
    /// Persists an event, replacing any earlier revision with the same ID.
    async fn save(&self, event: &Event) -> Result<()>;

    /// Retrieves the latest event for an order, by `created_at`.
    async fn find_latest_by_order(&self, order_id: OrderId) -> Result<Option<Event>>;

    /// Retrieves the latest event for a transaction, by `created_at`.
    async fn find_latest_by_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<Event>>;

    /// Retrieves all events, newest first.
    async fn find_all(&self) -> Result<Vec<Event>>;
}
