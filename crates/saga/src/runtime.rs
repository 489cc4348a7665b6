//! Wires the orchestrator and every participant to their topics.

use std::sync::Arc;

use broker::{Consumer, ConsumerConfig, MessageBroker, MessageHandler, Topic};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::handler::{Participant, SagaHandler};
use crate::orchestrator::{ORCHESTRATOR_TOPICS, Orchestrator};
use crate::participants::{InventoryService, PaymentService, ProductValidationService};

/// The participants a runtime drives.
pub struct SagaParticipants {
    pub product_validation: ProductValidationService,
    pub payment: PaymentService,
    pub inventory: InventoryService,
}

/// Running consumers of the saga core, one per topic.
pub struct SagaRuntime {
    consumers: Vec<(Topic, JoinHandle<()>)>,
}

impl SagaRuntime {
    /// Subscribes every component and starts consuming.
    ///
    /// All subscriptions are in place when this returns.
    pub async fn start(
        broker: Arc<dyn MessageBroker>,
        participants: SagaParticipants,
        config: ConsumerConfig,
    ) -> Result<Self> {
        let mut runtime = Self {
            consumers: Vec::new(),
        };

        let orchestrator: Arc<dyn MessageHandler> = Arc::new(Orchestrator::new(broker.clone()));
        for topic in ORCHESTRATOR_TOPICS {
            runtime
                .spawn(broker.as_ref(), topic, orchestrator.clone(), &config)
                .await?;
        }

        runtime
            .spawn_participant(&broker, participants.product_validation, &config)
            .await?;
        runtime
            .spawn_participant(&broker, participants.payment, &config)
            .await?;
        runtime
            .spawn_participant(&broker, participants.inventory, &config)
            .await?;

        tracing::info!(consumers = runtime.consumers.len(), "Saga runtime started");
        Ok(runtime)
    }

    /// Returns the topics being consumed.
    pub fn topics(&self) -> Vec<Topic> {
        self.consumers.iter().map(|(topic, _)| *topic).collect()
    }

    /// Waits for every consumer to finish, which happens once the broker
    /// closes.
    pub async fn join(self) {
        for (topic, handle) in self.consumers {
            if let Err(e) = handle.await {
                tracing::error!(%topic, error = %e, "Consumer task failed");
            }
        }
    }

    /// Stops every consumer immediately.
    pub fn abort(&self) {
        for (_, handle) in &self.consumers {
            handle.abort();
        }
    }

    async fn spawn_participant<P: Participant>(
        &mut self,
        broker: &Arc<dyn MessageBroker>,
        participant: P,
        config: &ConsumerConfig,
    ) -> Result<()> {
        let handler = SagaHandler::new(participant, broker.clone());
        let topics = handler.topics();
        let handler: Arc<dyn MessageHandler> = Arc::new(handler);

        for topic in topics {
            self.spawn(broker.as_ref(), topic, handler.clone(), config)
                .await?;
        }
        Ok(())
    }

    async fn spawn(
        &mut self,
        broker: &dyn MessageBroker,
        topic: Topic,
        handler: Arc<dyn MessageHandler>,
        config: &ConsumerConfig,
    ) -> Result<()> {
        let handle = Consumer::new(topic, handler, config.clone())
            .start(broker)
            .await?;
        self.consumers.push((topic, handle));
        Ok(())
    }
}
