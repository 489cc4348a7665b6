//! Payment: computes the order totals and charges them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::SagaKey;
use domain::{Event, Money, Order};
use event_store::{CompensationRecord, CompensationStore};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SagaError};
use crate::handler::Participant;
use crate::stage::Stage;

/// Lifecycle of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Refund,
}

/// Payment ledger row for one saga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub key: SagaKey,
    pub total_amount: Money,
    pub total_items: u32,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const TOTALS_OUT_OF_RANGE: &str = "Order totals are out of range";

/// Computes `(total_amount, total_items)` for an order.
fn order_totals(order: &Order) -> Result<(Money, u32)> {
    match (order.computed_amount(), order.computed_items()) {
        (Some(amount), Some(items)) => Ok((amount, items)),
        _ => Err(SagaError::precondition(TOTALS_OUT_OF_RANGE)),
    }
}

impl Payment {
    /// Creates a payment carrying the given totals.
    pub fn new(
        key: SagaKey,
        (total_amount, total_items): (Money, u32),
        status: PaymentStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            key,
            total_amount,
            total_items,
            status,
            created_at: now,
            updated_at: now,
        }
    }
}

impl CompensationRecord for Payment {
    const KIND: &'static str = "payment";

    fn key(&self) -> &SagaKey {
        &self.key
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Payment rules.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Smallest total that can be charged.
    pub min_amount: Money,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            min_amount: Money::from_cents(10),
        }
    }
}

/// The payment participant.
pub struct PaymentService {
    payments: Arc<dyn CompensationStore<Payment>>,
    config: PaymentConfig,
}

impl PaymentService {
    pub fn new(payments: Arc<dyn CompensationStore<Payment>>, config: PaymentConfig) -> Self {
        Self { payments, config }
    }

    fn copy_totals(order: &mut Order, payment: &Payment) {
        order.total_amount = payment.total_amount;
        order.total_items = payment.total_items;
    }
}

#[async_trait]
impl Participant for PaymentService {
    const STAGE: Stage = Stage::Payment;
    const SUCCESS_MESSAGE: &'static str = "Payment realized successfully!";
    const FAILURE_MESSAGE: &'static str = "Fail to realize the payment";
    const ROLLBACK_MESSAGE: &'static str = "Rollback executed for payment!";
    const ROLLBACK_FAILURE_MESSAGE: &'static str = "Rollback not executed for payment";

    async fn has_processed(&self, key: &SagaKey) -> Result<bool> {
        Ok(self.payments.exists_by_order_and_transaction(key).await?)
    }

    async fn check(&self, event: &Event) -> Result<()> {
        let (amount, _) = order_totals(&event.payload)?;
        if amount < self.config.min_amount {
            return Err(SagaError::precondition(format!(
                "Amount must be greater than or equal to {}",
                self.config.min_amount
            )));
        }
        Ok(())
    }

    async fn apply(&self, event: &mut Event) -> Result<()> {
        let totals = order_totals(&event.payload)?;
        let payment = Payment::new(event.key(), totals, PaymentStatus::Success);
        self.payments.create(&payment).await?;

        Self::copy_totals(&mut event.payload, &payment);
        tracing::debug!(amount = %payment.total_amount, items = payment.total_items, "Payment charged");
        Ok(())
    }

    async fn compensate(&self, event: &mut Event) -> Result<()> {
        let key = event.key();
        let payment = match self.payments.find_by_order_and_transaction(&key).await? {
            Some(mut payment) => {
                payment.status = PaymentStatus::Refund;
                payment.updated_at = Utc::now();
                payment
            }
            None => {
                // Nothing was charged; keep whatever totals the payload carries.
                let totals = order_totals(&event.payload).unwrap_or((
                    event.payload.total_amount,
                    event.payload.total_items,
                ));
                Payment::new(key, totals, PaymentStatus::Refund)
            }
        };

        self.payments.save(&payment).await?;
        Self::copy_totals(&mut event.payload, &payment);
        Ok(())
    }
}
