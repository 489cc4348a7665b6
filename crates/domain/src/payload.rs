//! Order snapshot carried as the saga payload.

use chrono::{DateTime, Utc};
use common::{OrderId, TransactionId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A product as referenced by an order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Product code (SKU).
    pub code: String,
    /// Price of a single unit.
    pub unit_value: Money,
}

impl Product {
    pub fn new(code: impl Into<String>, unit_value: Money) -> Self {
        Self {
            code: code.into(),
            unit_value,
        }
    }
}

/// A single line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product: Product,
    pub quantity: u32,
}

impl OrderLine {
    pub fn new(product: Product, quantity: u32) -> Self {
        Self { product, quantity }
    }

    /// Returns `unit_value * quantity` for this line, or `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.product.unit_value.checked_mul(self.quantity)
    }
}

/// Order snapshot.
///
/// `total_amount` and `total_items` are zero until the payment participant
/// computes and fills them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub transaction_id: TransactionId,
    pub products: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub total_amount: Money,
    #[serde(default)]
    pub total_items: u32,
}

impl Order {
    /// Creates a new order with a fresh order ID and transaction ID.
    pub fn new(products: Vec<OrderLine>) -> Self {
        Self {
            id: OrderId::new(),
            transaction_id: TransactionId::generate(),
            products,
            created_at: Utc::now(),
            total_amount: Money::zero(),
            total_items: 0,
        }
    }

    /// Returns `Σ(unit_value × quantity)` over all lines, or `None` when
    /// the total does not fit.
    pub fn computed_amount(&self) -> Option<Money> {
        self.products.iter().try_fold(Money::zero(), |acc, line| {
            acc.checked_add(line.line_total()?)
        })
    }

    /// Returns `Σ(quantity)` over all lines, or `None` on overflow.
    pub fn computed_items(&self) -> Option<u32> {
        self.products
            .iter()
            .try_fold(0u32, |acc, line| acc.checked_add(line.quantity))
    }
}
