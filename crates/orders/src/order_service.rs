//! Order intake, the saga initiator.

use std::sync::Arc;

use broker::{MessageBroker, Topic};
use domain::{Event, Order, OrderLine};
use event_store::{OrderStore, SagaEventStore};
use serde::Deserialize;

use crate::error::{OrderError, Result};

/// An order as submitted by a client.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub products: Vec<OrderLine>,
}

/// Accepts orders and starts their sagas.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    events: Arc<dyn SagaEventStore>,
    broker: Arc<dyn MessageBroker>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        events: Arc<dyn SagaEventStore>,
        broker: Arc<dyn MessageBroker>,
    ) -> Self {
        Self {
            orders,
            events,
            broker,
        }
    }

    /// Creates an order and emits its start trigger.
    ///
    /// The order gets a fresh order ID and transaction ID. The initial event
    /// is stored in the audit log before it is published to `start-saga`.
    #[tracing::instrument(skip_all, fields(lines = request.products.len()))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
        if request.products.is_empty() {
            return Err(OrderError::Validation(
                "Order must have at least one product".to_string(),
            ));
        }
        if request.products.iter().any(|line| line.quantity == 0) {
            return Err(OrderError::Validation(
                "Product quantity must be greater than zero".to_string(),
            ));
        }

        let order = Order::new(request.products);
        if order.computed_amount().is_none() || order.computed_items().is_none() {
            return Err(OrderError::Validation(
                "Order total is too large".to_string(),
            ));
        }
        self.orders.save(&order).await?;

        let event = Event::start(order.clone());
        self.events.save(&event).await?;

        let payload = domain::encode(&event)?;
        self.broker
            .publish(Topic::StartSaga, event.transaction_id.as_str(), payload)
            .await?;

        tracing::info!(
            order_id = %order.id,
            transaction_id = %order.transaction_id,
            "Order created, saga start requested"
        );
        metrics::counter!("orders_created_total").increment(1);

        Ok(order)
    }
}
