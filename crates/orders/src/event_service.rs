//! Completion notifier and audit queries over the saga event log.

use std::sync::Arc;

use chrono::Utc;
use common::{OrderId, TransactionId};
use domain::{Event, SagaStatus};
use event_store::SagaEventStore;
use serde::Deserialize;

use crate::error::{OrderError, Result};

/// Audit query; at least one field is required.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub order_id: Option<OrderId>,
    pub transaction_id: Option<TransactionId>,
}

/// Records terminal saga events and serves read-only queries over them.
#[derive(Clone)]
pub struct EventService {
    events: Arc<dyn SagaEventStore>,
}

impl EventService {
    pub fn new(events: Arc<dyn SagaEventStore>) -> Self {
        Self { events }
    }

    /// Stores a terminal event, stamped with the time it was received.
    #[tracing::instrument(skip_all, fields(order_id = %event.order_id, transaction_id = %event.transaction_id))]
    pub async fn notify_ending(&self, mut event: Event) -> Result<Event> {
        event.created_at = Utc::now();
        self.events.save(&event).await?;

        match event.status {
            SagaStatus::Success => tracing::info!("Order saga completed"),
            _ => tracing::warn!(status = %event.status, "Order saga ended with errors"),
        }
        Ok(event)
    }

    /// Returns the latest event matching the filter.
    ///
    /// The order ID takes precedence when both fields are set.
    pub async fn find_by_filter(&self, filter: &EventFilter) -> Result<Event> {
        let transaction_id = filter
            .transaction_id
            .as_ref()
            .filter(|tx| !tx.is_empty());

        let found = match (filter.order_id, transaction_id) {
            (Some(order_id), _) => self.events.find_latest_by_order(order_id).await?,
            (None, Some(transaction_id)) => {
                self.events.find_latest_by_transaction(transaction_id).await?
            }
            (None, None) => {
                return Err(OrderError::Validation(
                    "OrderID or TransactionID must be informed.".to_string(),
                ));
            }
        };

        found.ok_or_else(|| OrderError::NotFound("Event not found by informed filter.".to_string()))
    }

    /// Returns every stored event, newest first.
    pub async fn find_all(&self) -> Result<Vec<Event>> {
        Ok(self.events.find_all().await?)
    }
}
