//! Inventory: decrements stock line by line.
//!
//! Lines are applied one at a time and the compensation record is saved after
//! each line. When a later line is out of stock, the lines already applied
//! stay applied; the backward pass restores them from the record.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::SagaKey;
use domain::Event;
use event_store::{CompensationRecord, CompensationStore, EventStoreError};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{Result, SagaError};
use crate::handler::Participant;
use crate::stage::Stage;

const INVENTORY_NOT_FOUND: &str = "Inventory not found by informed product.";
const OUT_OF_STOCK: &str = "Product is out of stock!";

/// Stock change applied for one order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineAdjustment {
    pub product_code: String,
    pub old_quantity: u32,
    pub order_quantity: u32,
    pub new_quantity: u32,
}

/// Stock changes applied for one saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryAdjustment {
    pub key: SagaKey,
    pub lines: Vec<LineAdjustment>,
    /// True once every line has been restored.
    pub restored: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryAdjustment {
    pub fn new(key: SagaKey) -> Self {
        let now = Utc::now();
        Self {
            key,
            lines: Vec::new(),
            restored: false,
            created_at: now,
            updated_at: now,
        }
    }
}

impl CompensationRecord for InventoryAdjustment {
    const KIND: &'static str = "inventory_adjustment";

    fn key(&self) -> &SagaKey {
        &self.key
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Outcome of [`StockStore::try_decrement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decrement {
    /// Stock was taken; quantities before and after.
    Applied { old_quantity: u32, new_quantity: u32 },
    /// Less stock than requested; nothing changed.
    OutOfStock,
    UnknownProduct,
}

/// Available stock per product code.
///
/// Changes are relative so that concurrent sagas on the same product never
/// overwrite each other.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Returns the available quantity, or `None` for an unknown product.
    async fn available(&self, code: &str) -> std::result::Result<Option<u32>, EventStoreError>;

    /// Takes `quantity` units if that many are available, as one step.
    async fn try_decrement(
        &self,
        code: &str,
        quantity: u32,
    ) -> std::result::Result<Decrement, EventStoreError>;

    /// Puts `quantity` units back and returns the new available quantity.
    async fn increment(
        &self,
        code: &str,
        quantity: u32,
    ) -> std::result::Result<u32, EventStoreError>;
}

/// In-memory stock store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStockStore {
    stock: Arc<RwLock<HashMap<String, u32>>>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given `(code, available)` pairs.
    pub fn with_stock<I, S>(stock: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        Self {
            stock: Arc::new(RwLock::new(
                stock
                    .into_iter()
                    .map(|(code, qty)| (code.into(), qty))
                    .collect(),
            )),
        }
    }

    /// Returns the available quantity of a product, for inspection.
    pub async fn quantity_of(&self, code: &str) -> Option<u32> {
        self.stock.read().await.get(code).copied()
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn available(&self, code: &str) -> std::result::Result<Option<u32>, EventStoreError> {
        Ok(self.quantity_of(code).await)
    }

    async fn try_decrement(
        &self,
        code: &str,
        quantity: u32,
    ) -> std::result::Result<Decrement, EventStoreError> {
        let mut stock = self.stock.write().await;
        let Some(available) = stock.get_mut(code) else {
            return Ok(Decrement::UnknownProduct);
        };
        if quantity > *available {
            return Ok(Decrement::OutOfStock);
        }

        let old_quantity = *available;
        *available -= quantity;
        Ok(Decrement::Applied {
            old_quantity,
            new_quantity: *available,
        })
    }

    async fn increment(
        &self,
        code: &str,
        quantity: u32,
    ) -> std::result::Result<u32, EventStoreError> {
        let mut stock = self.stock.write().await;
        let available = stock.entry(code.to_string()).or_default();
        *available = available.saturating_add(quantity);
        Ok(*available)
    }
}

/// The inventory participant.
pub struct InventoryService {
    stock: Arc<dyn StockStore>,
    adjustments: Arc<dyn CompensationStore<InventoryAdjustment>>,
}

impl InventoryService {
    pub fn new(
        stock: Arc<dyn StockStore>,
        adjustments: Arc<dyn CompensationStore<InventoryAdjustment>>,
    ) -> Self {
        Self { stock, adjustments }
    }

    async fn available(&self, code: &str) -> Result<u32> {
        self.stock
            .available(code)
            .await?
            .ok_or_else(|| SagaError::precondition(INVENTORY_NOT_FOUND))
    }
}

#[async_trait]
impl Participant for InventoryService {
    const STAGE: Stage = Stage::Inventory;
    const SUCCESS_MESSAGE: &'static str = "Inventory updated successfully!";
    const FAILURE_MESSAGE: &'static str = "Fail to update inventory";
    const ROLLBACK_MESSAGE: &'static str = "Rollback executed for inventory!";
    const ROLLBACK_FAILURE_MESSAGE: &'static str = "Rollback not executed for inventory";

    async fn has_processed(&self, key: &SagaKey) -> Result<bool> {
        Ok(self.adjustments.exists_by_order_and_transaction(key).await?)
    }

    async fn check(&self, event: &Event) -> Result<()> {
        for line in &event.payload.products {
            self.available(&line.product.code).await?;
        }
        Ok(())
    }

    async fn apply(&self, event: &mut Event) -> Result<()> {
        let mut adjustment = InventoryAdjustment::new(event.key());

        for line in &event.payload.products {
            let code = &line.product.code;
            let (old_quantity, new_quantity) =
                match self.stock.try_decrement(code, line.quantity).await? {
                    Decrement::Applied {
                        old_quantity,
                        new_quantity,
                    } => (old_quantity, new_quantity),
                    Decrement::OutOfStock => return Err(SagaError::precondition(OUT_OF_STOCK)),
                    Decrement::UnknownProduct => {
                        return Err(SagaError::precondition(INVENTORY_NOT_FOUND));
                    }
                };

            adjustment.lines.push(LineAdjustment {
                product_code: code.clone(),
                old_quantity,
                order_quantity: line.quantity,
                new_quantity,
            });
            adjustment.updated_at = Utc::now();

            // The first write claims the key so a concurrent duplicate cannot
            // apply the same lines again.
            let recorded = if adjustment.lines.len() == 1 {
                self.adjustments.create(&adjustment).await
            } else {
                self.adjustments.save(&adjustment).await
            };
            if let Err(e) = recorded {
                // A decrement without a record could never be compensated.
                self.stock.increment(code, line.quantity).await?;
                return Err(e.into());
            }

            tracing::debug!(
                product_code = %code,
                old_quantity,
                new_quantity,
                "Stock decremented"
            );
        }

        Ok(())
    }

    async fn compensate(&self, event: &mut Event) -> Result<()> {
        let key = event.key();
        let Some(mut adjustment) = self.adjustments.find_by_order_and_transaction(&key).await?
        else {
            let mut adjustment = InventoryAdjustment::new(key);
            adjustment.restored = true;
            self.adjustments.save(&adjustment).await?;
            return Ok(());
        };

        if adjustment.restored {
            tracing::debug!("Inventory already restored");
            return Ok(());
        }

        for line in adjustment.lines.iter().rev() {
            let available = self
                .stock
                .increment(&line.product_code, line.order_quantity)
                .await?;
            tracing::info!(
                product_code = %line.product_code,
                returned = line.order_quantity,
                available,
                "Stock restored"
            );
        }

        adjustment.restored = true;
        adjustment.updated_at = Utc::now();
        self.adjustments.save(&adjustment).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{Money, Order, OrderLine, Product};
    use event_store::InMemoryCompensationStore;

    fn setup(
        stock: Vec<(&str, u32)>,
    ) -> (
        InMemoryStockStore,
        InMemoryCompensationStore<InventoryAdjustment>,
        InventoryService,
    ) {
        let stock = InMemoryStockStore::with_stock(stock);
        let adjustments = InMemoryCompensationStore::new();
        let service = InventoryService::new(Arc::new(stock.clone()), Arc::new(adjustments.clone()));
        (stock, adjustments, service)
    }

    fn event(lines: Vec<(&str, u32)>) -> Event {
        Event::start(Order::new(
            lines
                .into_iter()
                .map(|(code, qty)| OrderLine::new(Product::new(code, Money::from_dollars(10)), qty))
                .collect(),
        ))
    }

    #[tokio::test]
    async fn test_apply_decrements_stock() {
        let (stock, adjustments, service) = setup(vec![("BOOKS", 5), ("MOVIES", 4)]);
        let mut event = event(vec![("BOOKS", 2), ("MOVIES", 4)]);

        service.check(&event).await.unwrap();
        service.apply(&mut event).await.unwrap();

        assert_eq!(stock.quantity_of("BOOKS").await, Some(3));
        assert_eq!(stock.quantity_of("MOVIES").await, Some(0));

        let record = adjustments
            .find_by_order_and_transaction(&event.key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            record.lines[0],
            LineAdjustment {
                product_code: "BOOKS".to_string(),
                old_quantity: 5,
                order_quantity: 2,
                new_quantity: 3,
            }
        );
        assert_eq!(record.lines.len(), 2);
        assert!(!record.restored);
    }

    #[tokio::test]
    async fn test_unknown_product_is_rejected_before_any_change() {
        let (stock, adjustments, service) = setup(vec![("BOOKS", 5)]);
        let event = event(vec![("BOOKS", 1), ("GAMES", 1)]);

        let err = service.check(&event).await.unwrap_err();
        assert_eq!(err.to_string(), INVENTORY_NOT_FOUND);
        assert_eq!(stock.quantity_of("BOOKS").await, Some(5));
        assert_eq!(adjustments.record_count().await, 0);
    }

    #[tokio::test]
    async fn test_out_of_stock_keeps_earlier_lines_applied() {
        let (stock, adjustments, service) = setup(vec![("BOOKS", 5), ("MOVIES", 1)]);
        let mut event = event(vec![("BOOKS", 2), ("MOVIES", 3)]);

        let err = service.apply(&mut event).await.unwrap_err();
        assert_eq!(err.to_string(), OUT_OF_STOCK);

        assert_eq!(stock.quantity_of("BOOKS").await, Some(3));
        assert_eq!(stock.quantity_of("MOVIES").await, Some(1));
        let record = adjustments
            .find_by_order_and_transaction(&event.key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.lines.len(), 1);

        service.compensate(&mut event).await.unwrap();
        assert_eq!(stock.quantity_of("BOOKS").await, Some(5));
        assert_eq!(stock.quantity_of("MOVIES").await, Some(1));
    }

    #[tokio::test]
    async fn test_first_line_out_of_stock_changes_nothing() {
        let (stock, adjustments, service) = setup(vec![("BOOKS", 5)]);
        let mut event = event(vec![("BOOKS", 10)]);

        assert!(service.apply(&mut event).await.is_err());
        assert_eq!(stock.quantity_of("BOOKS").await, Some(5));
        assert_eq!(adjustments.record_count().await, 0);

        service.compensate(&mut event).await.unwrap();
        let record = adjustments
            .find_by_order_and_transaction(&event.key())
            .await
            .unwrap()
            .unwrap();
        assert!(record.restored);
        assert!(record.lines.is_empty());
    }

    #[tokio::test]
    async fn test_compensation_is_idempotent() {
        let (stock, _adjustments, service) = setup(vec![("BOOKS", 5)]);
        let mut event = event(vec![("BOOKS", 2)]);
        service.apply(&mut event).await.unwrap();

        service.compensate(&mut event).await.unwrap();
        assert_eq!(stock.quantity_of("BOOKS").await, Some(5));

        // A redelivered compensation must not return the units twice.
        service.compensate(&mut event).await.unwrap();
        assert_eq!(stock.quantity_of("BOOKS").await, Some(5));
    }

    #[tokio::test]
    async fn test_compensation_keeps_other_sagas_decrements() {
        let (stock, _adjustments, service) = setup(vec![("BOOKS", 5)]);
        let mut first = event(vec![("BOOKS", 2)]);
        let mut second = event(vec![("BOOKS", 2)]);

        service.apply(&mut first).await.unwrap();
        service.apply(&mut second).await.unwrap();
        assert_eq!(stock.quantity_of("BOOKS").await, Some(1));

        service.compensate(&mut first).await.unwrap();
        assert_eq!(stock.quantity_of("BOOKS").await, Some(3));

        service.compensate(&mut second).await.unwrap();
        assert_eq!(stock.quantity_of("BOOKS").await, Some(5));
    }

    #[tokio::test]
    async fn test_concurrent_applies_never_oversell() {
        let (stock, _adjustments, service) = setup(vec![("BOOKS", 5)]);
        let service = Arc::new(service);

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                let mut event = event(vec![("BOOKS", 1)]);
                service.apply(&mut event).await.is_ok()
            }));
        }

        let mut applied = 0;
        for task in tasks {
            if task.await.unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 5);
        assert_eq!(stock.quantity_of("BOOKS").await, Some(0));
    }

    #[tokio::test]
    async fn test_stock_store_decrement_is_all_or_nothing() {
        let stock = InMemoryStockStore::with_stock([("BOOKS", 3)]);

        assert_eq!(
            stock.try_decrement("BOOKS", 2).await.unwrap(),
            Decrement::Applied {
                old_quantity: 3,
                new_quantity: 1
            }
        );
        assert_eq!(stock.try_decrement("BOOKS", 2).await.unwrap(), Decrement::OutOfStock);
        assert_eq!(stock.try_decrement("GAMES", 1).await.unwrap(), Decrement::UnknownProduct);
        assert_eq!(stock.increment("BOOKS", 4).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_same_product_on_two_lines_restores_original_quantity() {
        let (stock, _adjustments, service) = setup(vec![("BOOKS", 5)]);
        let mut event = event(vec![("BOOKS", 2), ("BOOKS", 1)]);

        service.apply(&mut event).await.unwrap();
        assert_eq!(stock.quantity_of("BOOKS").await, Some(2));

        service.compensate(&mut event).await.unwrap();
        assert_eq!(stock.quantity_of("BOOKS").await, Some(5));
    }
}
