//! Records every terminal saga event published on `notify-ending`.

use async_trait::async_trait;
use broker::{HandlerError, Message, MessageHandler};

use crate::event_service::EventService;

/// Consumes `notify-ending` and records each terminal event.
#[derive(Clone)]
pub struct CompletionNotifier {
    events: EventService,
}

impl CompletionNotifier {
    pub fn new(events: EventService) -> Self {
        Self { events }
    }
}

#[async_trait]
impl MessageHandler for CompletionNotifier {
    async fn handle(&self, message: &Message) -> std::result::Result<(), HandlerError> {
        let event = match domain::decode(&message.payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(key = %message.key, error = %e, "Discarding undecodable terminal event");
                metrics::counter!("saga_decode_failures_total", "topic" => message.topic.as_str())
                    .increment(1);
                return Ok(());
            }
        };

        self.events.notify_ending(event).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker::Topic;
    use domain::{Event, EventSource, Money, Order, OrderLine, Product, SagaStatus};
    use event_store::InMemorySagaEventStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_terminal_event_is_recorded() {
        let store = InMemorySagaEventStore::new();
        let notifier = CompletionNotifier::new(EventService::new(Arc::new(store.clone())));

        let mut event = Event::start(Order::new(vec![OrderLine::new(
            Product::new("BOOKS", Money::from_dollars(10)),
            1,
        )]));
        event.record(EventSource::Orchestrator, SagaStatus::Success, "Saga finished successfully!");
        let message = Message::new(
            Topic::NotifyEnding,
            event.transaction_id.as_str(),
            domain::encode(&event).unwrap(),
        );

        notifier.handle(&message).await.unwrap();
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_garbage_is_dropped() {
        let store = InMemorySagaEventStore::new();
        let notifier = CompletionNotifier::new(EventService::new(Arc::new(store.clone())));

        notifier
            .handle(&Message::new(Topic::NotifyEnding, "k", b"nope".to_vec()))
            .await
            .unwrap();
        assert_eq!(store.event_count().await, 0);
    }
}
