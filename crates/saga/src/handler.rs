//! The participant handler template.
//!
//! Every participant runs the same lifecycle; only the local strategies
//! differ. [`SagaHandler`] owns the lifecycle and guarantees that each
//! decoded message produces exactly one event on the orchestrator topic.
//!
//! Forward:
//! 1. idempotency guard
//! 2. precondition check
//! 3. apply, persisting a compensation record
//! 4. `SUCCESS` on success, `ROLLBACK_PENDING` with the reason otherwise
//! 5. publish to the orchestrator
//!
//! Compensation:
//! 1. reverse the local step from the compensation record
//! 2. `FAIL` with a rollback history entry
//! 3. publish to the orchestrator

use std::sync::Arc;

use async_trait::async_trait;
use broker::{HandlerError, Message, MessageBroker, MessageHandler, Topic};
use common::SagaKey;
use domain::{Event, SagaStatus};

use crate::error::{Result, SagaError};
use crate::stage::Stage;
use crate::transport::{decode_message, publish_event};

/// Local strategies of one saga participant.
#[async_trait]
pub trait Participant: Send + Sync + 'static {
    /// The pipeline stage this participant owns.
    const STAGE: Stage;
    /// History message for a successful forward step.
    const SUCCESS_MESSAGE: &'static str;
    /// History prefix for a failed forward step; the reason is appended.
    const FAILURE_MESSAGE: &'static str;
    /// History message for a completed compensation.
    const ROLLBACK_MESSAGE: &'static str;
    /// History prefix for a compensation that hit an error.
    const ROLLBACK_FAILURE_MESSAGE: &'static str;

    /// Returns true if a compensation record already exists for the key.
    async fn has_processed(&self, key: &SagaKey) -> Result<bool>;

    /// Checks the business preconditions without mutating anything.
    async fn check(&self, event: &Event) -> Result<()>;

    /// Performs the local step and persists its compensation record.
    async fn apply(&self, event: &mut Event) -> Result<()>;

    /// Reverses the local step.
    ///
    /// When no compensation record exists, one is created already marked as
    /// failed.
    async fn compensate(&self, event: &mut Event) -> Result<()>;
}

/// Drives a [`Participant`] from its forward and compensation topics.
pub struct SagaHandler<P> {
    participant: P,
    broker: Arc<dyn MessageBroker>,
}

impl<P: Participant> SagaHandler<P> {
    pub fn new(participant: P, broker: Arc<dyn MessageBroker>) -> Self {
        Self {
            participant,
            broker,
        }
    }

    /// Returns the wrapped participant.
    pub fn participant(&self) -> &P {
        &self.participant
    }

    /// Topics this handler consumes.
    pub fn topics(&self) -> [Topic; 2] {
        [P::STAGE.success_topic(), P::STAGE.fail_topic()]
    }

    /// Runs the forward step and reports the outcome to the orchestrator.
    ///
    /// Business failures never escape: they become `ROLLBACK_PENDING`. Only
    /// a failed publish is returned as an error.
    #[tracing::instrument(skip_all, fields(
        stage = %P::STAGE,
        order_id = %event.order_id,
        transaction_id = %event.transaction_id,
    ))]
    pub async fn handle_forward(&self, mut event: Event) -> Result<Event> {
        let source = P::STAGE.source();

        match self.run_forward(&mut event).await {
            Ok(()) => {
                tracing::info!("Local step applied");
                event.record(source, SagaStatus::Success, P::SUCCESS_MESSAGE);
            }
            Err(e) => {
                if matches!(e, SagaError::DuplicateTransaction { .. }) {
                    metrics::counter!(
                        "participant_duplicate_transactions_total",
                        "source" => source.as_str()
                    )
                    .increment(1);
                }
                tracing::warn!(error = %e, "Local step failed");
                event.record(
                    source,
                    SagaStatus::RollbackPending,
                    format!("{}: {}", P::FAILURE_MESSAGE, e),
                );
            }
        }

        self.report(&event).await?;
        Ok(event)
    }

    /// Runs the compensation step and reports `FAIL` to the orchestrator.
    ///
    /// A compensation that errors is still reported as `FAIL`, with the
    /// error in the history entry, so the backward pass keeps moving.
    #[tracing::instrument(skip_all, fields(
        stage = %P::STAGE,
        order_id = %event.order_id,
        transaction_id = %event.transaction_id,
    ))]
    pub async fn handle_compensation(&self, mut event: Event) -> Result<Event> {
        let message = match self.participant.compensate(&mut event).await {
            Ok(()) => {
                tracing::info!("Local step compensated");
                P::ROLLBACK_MESSAGE.to_string()
            }
            Err(e) => {
                tracing::error!(error = %e, "Compensation failed");
                format!("{}: {}", P::ROLLBACK_FAILURE_MESSAGE, e)
            }
        };
        event.record(P::STAGE.source(), SagaStatus::Fail, message);

        self.report(&event).await?;
        Ok(event)
    }

    async fn run_forward(&self, event: &mut Event) -> Result<()> {
        let key = event.key();
        if self.participant.has_processed(&key).await? {
            return Err(SagaError::DuplicateTransaction {
                key: key.to_string(),
            });
        }

        self.participant.check(event).await?;
        self.participant.apply(event).await
    }

    async fn report(&self, event: &Event) -> Result<()> {
        metrics::counter!(
            "saga_stage_outcomes_total",
            "source" => event.source.as_str(),
            "status" => event.status.as_str()
        )
        .increment(1);

        publish_event(self.broker.as_ref(), Topic::Orchestrator, event).await
    }
}

#[async_trait]
impl<P: Participant> MessageHandler for SagaHandler<P> {
    async fn handle(&self, message: &Message) -> std::result::Result<(), HandlerError> {
        let Some(event) = decode_message(message) else {
            return Ok(());
        };

        let result = if message.topic == P::STAGE.success_topic() {
            self.handle_forward(event).await
        } else if message.topic == P::STAGE.fail_topic() {
            self.handle_compensation(event).await
        } else {
            tracing::warn!(topic = %message.topic, stage = %P::STAGE, "Unexpected topic");
            return Ok(());
        };

        result.map(|_| ()).map_err(Into::into)
    }
}
