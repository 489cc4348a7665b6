//! The saga envelope and its audit trail.

use chrono::{DateTime, Utc};
use common::{EventId, OrderId, SagaKey, TransactionId};
use serde::{Deserialize, Serialize};

use crate::payload::Order;

/// The component that produced the current revision of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventSource {
    /// Order intake, the saga initiator.
    OrderService,
    Orchestrator,
    ProductValidationService,
    PaymentService,
    InventoryService,
}

impl EventSource {
    /// Returns the wire name of this source.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSource::OrderService => "ORDER_SERVICE",
            EventSource::Orchestrator => "ORCHESTRATOR",
            EventSource::ProductValidationService => "PRODUCT_VALIDATION_SERVICE",
            EventSource::PaymentService => "PAYMENT_SERVICE",
            EventSource::InventoryService => "INVENTORY_SERVICE",
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the step that produced the current revision.
///
/// ```text
/// SUCCESS ──► next stage
/// ROLLBACK_PENDING ──► same stage compensates ──► FAIL ──► previous stage
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    Success,
    /// The local step failed; the same stage must compensate itself.
    RollbackPending,
    /// Compensation completed; the previous stage must compensate next.
    Fail,
}

impl SagaStatus {
    /// Returns the wire name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Success => "SUCCESS",
            SagaStatus::RollbackPending => "ROLLBACK_PENDING",
            SagaStatus::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the saga audit trail. Never edited once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub source: EventSource,
    pub status: SagaStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl History {
    /// Creates a history entry stamped with the current time.
    pub fn new(source: EventSource, status: SagaStatus, message: impl Into<String>) -> Self {
        Self {
            source,
            status,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

/// The saga envelope carried through every hop.
///
/// Whoever consumes an event owns it until it is published again, so a
/// revision is never mutated by two components at once. The history is only
/// reachable through [`Event::history`] and [`Event::add_to_history`], which
/// keeps it append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub transaction_id: TransactionId,
    pub order_id: OrderId,
    pub payload: Order,
    pub source: EventSource,
    pub status: SagaStatus,
    #[serde(default)]
    event_history: Vec<History>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Builds the start trigger for a freshly created order.
    pub fn start(order: Order) -> Self {
        Self {
            id: EventId::new(),
            transaction_id: order.transaction_id.clone(),
            order_id: order.id,
            payload: order,
            source: EventSource::OrderService,
            status: SagaStatus::Success,
            event_history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Returns the key participants use for their compensation records.
    pub fn key(&self) -> SagaKey {
        SagaKey::new(self.order_id, self.transaction_id.clone())
    }

    /// Returns the audit trail, oldest entry first.
    pub fn history(&self) -> &[History] {
        &self.event_history
    }

    /// Returns the most recent history entry.
    pub fn last_history(&self) -> Option<&History> {
        self.event_history.last()
    }

    /// Appends an entry to the audit trail.
    pub fn add_to_history(&mut self, history: History) {
        self.event_history.push(history);
    }

    /// Stamps this revision with `source`/`status` and appends a matching
    /// history entry.
    pub fn record(&mut self, source: EventSource, status: SagaStatus, message: impl Into<String>) {
        self.source = source;
        self.status = status;
        self.add_to_history(History::new(source, status, message));
    }
}
