//! The orchestrator: starts sagas, routes every participant outcome, and
//! closes sagas with a terminal notification.

use std::sync::Arc;

use async_trait::async_trait;
use broker::{HandlerError, Message, MessageBroker, MessageHandler, Topic};
use domain::{Event, EventSource, SagaStatus};

use crate::error::{Result, SagaError};
use crate::stage::next_topic;
use crate::transport::{decode_message, publish_event};

pub const SAGA_STARTED: &str = "Saga started!";
pub const SAGA_FINISHED_SUCCESS: &str = "Saga finished successfully!";
pub const SAGA_FINISHED_FAIL: &str = "Saga finished with errors!";

/// Topics the orchestrator consumes.
pub const ORCHESTRATOR_TOPICS: [Topic; 4] = [
    Topic::StartSaga,
    Topic::Orchestrator,
    Topic::FinishSuccess,
    Topic::FinishFail,
];

/// Stateless saga orchestrator.
///
/// All saga progress lives inside the [`Event`]; the orchestrator only picks
/// the next topic. Publish failures are returned to the caller so the
/// consumer can redeliver.
#[derive(Clone)]
pub struct Orchestrator {
    broker: Arc<dyn MessageBroker>,
}

impl Orchestrator {
    pub fn new(broker: Arc<dyn MessageBroker>) -> Self {
        Self { broker }
    }

    /// Takes ownership of a start trigger and sends it to the first stage.
    #[tracing::instrument(skip_all, fields(order_id = %event.order_id, transaction_id = %event.transaction_id))]
    pub async fn start_saga(&self, mut event: Event) -> Result<Topic> {
        event.record(EventSource::Orchestrator, SagaStatus::Success, SAGA_STARTED);
        let topic = next_topic(event.source, event.status)?;

        publish_event(self.broker.as_ref(), topic, &event).await?;

        tracing::info!(%topic, "Saga started");
        metrics::counter!("saga_started_total").increment(1);
        Ok(topic)
    }

    /// Routes a participant outcome to its next topic, unmodified.
    #[tracing::instrument(skip_all, fields(
        order_id = %event.order_id,
        transaction_id = %event.transaction_id,
        source = %event.source,
        status = %event.status,
    ))]
    pub async fn continue_saga(&self, event: Event) -> Result<Topic> {
        let topic = next_topic(event.source, event.status)?;
        publish_event(self.broker.as_ref(), topic, &event).await?;
        Ok(topic)
    }

    /// Closes a saga whose every stage succeeded.
    #[tracing::instrument(skip_all, fields(order_id = %event.order_id, transaction_id = %event.transaction_id))]
    pub async fn finish_saga_success(&self, mut event: Event) -> Result<()> {
        event.record(
            EventSource::Orchestrator,
            SagaStatus::Success,
            SAGA_FINISHED_SUCCESS,
        );
        publish_event(self.broker.as_ref(), Topic::NotifyEnding, &event).await?;

        tracing::info!("Saga finished successfully");
        metrics::counter!("saga_finished_total", "outcome" => "success").increment(1);
        Ok(())
    }

    /// Closes a saga whose compensation has run back to the first stage.
    #[tracing::instrument(skip_all, fields(order_id = %event.order_id, transaction_id = %event.transaction_id))]
    pub async fn finish_saga_fail(&self, mut event: Event) -> Result<()> {
        event.record(EventSource::Orchestrator, SagaStatus::Fail, SAGA_FINISHED_FAIL);
        publish_event(self.broker.as_ref(), Topic::NotifyEnding, &event).await?;

        tracing::warn!("Saga finished with errors");
        metrics::counter!("saga_finished_total", "outcome" => "fail").increment(1);
        Ok(())
    }

    /// Dispatches an inbound event to the operation owning its topic.
    pub async fn dispatch(&self, topic: Topic, event: Event) -> Result<()> {
        match topic {
            Topic::StartSaga => self.start_saga(event).await.map(|_| ()),
            Topic::Orchestrator => self.continue_saga(event).await.map(|_| ()),
            Topic::FinishSuccess => self.finish_saga_success(event).await,
            Topic::FinishFail => self.finish_saga_fail(event).await,
            other => {
                tracing::warn!(topic = %other, "Orchestrator does not consume this topic");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl MessageHandler for Orchestrator {
    async fn handle(&self, message: &Message) -> std::result::Result<(), HandlerError> {
        let Some(event) = decode_message(message) else {
            return Ok(());
        };

        match self.dispatch(message.topic, event).await {
            Ok(()) => Ok(()),
            // Redelivery cannot make an unroutable event routable.
            Err(e @ SagaError::UnroutableEvent { .. }) => {
                tracing::error!(topic = %message.topic, key = %message.key, error = %e, "Dropping unroutable event");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
