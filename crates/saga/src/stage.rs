//! The ordered stage table and the routing decision.
//!
//! ```text
//!            SUCCESS               SUCCESS             SUCCESS
//! start ──► ProductValidation ──► Payment ──► Inventory ──► finish-success
//!                 ▲   │ ROLLBACK_PENDING ▲      │              │
//!                 │   ▼                  │      ▼              ▼
//! finish-fail ◄── fail ◄──── FAIL ───── fail ◄── FAIL ────── fail
//! ```
//!
//! A stage that reports `ROLLBACK_PENDING` is asked to compensate itself; a
//! stage that reports `FAIL` has compensated, so the previous stage goes next.

use broker::Topic;
use domain::{EventSource, SagaStatus};

use crate::error::{Result, SagaError};

/// One participant step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    ProductValidation,
    Payment,
    Inventory,
}

/// Stages in execution order.
pub const PIPELINE: [Stage; 3] = [Stage::ProductValidation, Stage::Payment, Stage::Inventory];

impl Stage {
    /// Returns the source a participant stamps on events it produces.
    pub fn source(&self) -> EventSource {
        match self {
            Stage::ProductValidation => EventSource::ProductValidationService,
            Stage::Payment => EventSource::PaymentService,
            Stage::Inventory => EventSource::InventoryService,
        }
    }

    /// Returns the stage owned by a participant source.
    pub fn from_source(source: EventSource) -> Option<Stage> {
        PIPELINE.into_iter().find(|stage| stage.source() == source)
    }

    /// Topic that asks this stage to run its forward step.
    pub fn success_topic(&self) -> Topic {
        match self {
            Stage::ProductValidation => Topic::ProductValidationSuccess,
            Stage::Payment => Topic::PaymentSuccess,
            Stage::Inventory => Topic::InventorySuccess,
        }
    }

    /// Topic that asks this stage to compensate.
    pub fn fail_topic(&self) -> Topic {
        match self {
            Stage::ProductValidation => Topic::ProductValidationFail,
            Stage::Payment => Topic::PaymentFail,
            Stage::Inventory => Topic::InventoryFail,
        }
    }

    fn position(&self) -> usize {
        match self {
            Stage::ProductValidation => 0,
            Stage::Payment => 1,
            Stage::Inventory => 2,
        }
    }

    /// Returns the stage after this one, if any.
    pub fn next(&self) -> Option<Stage> {
        PIPELINE.get(self.position() + 1).copied()
    }

    /// Returns the stage before this one, if any.
    pub fn previous(&self) -> Option<Stage> {
        self.position()
            .checked_sub(1)
            .and_then(|i| PIPELINE.get(i).copied())
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::ProductValidation => "product-validation",
            Stage::Payment => "payment",
            Stage::Inventory => "inventory",
        })
    }
}

/// Computes where an event goes next from its `(source, status)` alone.
///
/// `ORCHESTRATOR` is the source of a freshly started saga (`SUCCESS`) and of
/// a saga that cannot start (`FAIL`). Every other combination not covered by
/// the stage table is rejected.
pub fn next_topic(source: EventSource, status: SagaStatus) -> Result<Topic> {
    let unroutable = || SagaError::UnroutableEvent {
        origin: source,
        status,
    };

    if source == EventSource::Orchestrator {
        return match status {
            SagaStatus::Success => Ok(PIPELINE[0].success_topic()),
            SagaStatus::Fail => Ok(Topic::FinishFail),
            SagaStatus::RollbackPending => Err(unroutable()),
        };
    }

    let stage = Stage::from_source(source).ok_or_else(unroutable)?;
    let topic = match status {
        SagaStatus::Success => stage
            .next()
            .map_or(Topic::FinishSuccess, |next| next.success_topic()),
        SagaStatus::RollbackPending => stage.fail_topic(),
        SagaStatus::Fail => stage
            .previous()
            .map_or(Topic::FinishFail, |previous| previous.fail_topic()),
    };

    Ok(topic)
}
