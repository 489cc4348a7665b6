//! Glue between the saga envelope and the broker.

use broker::{Message, MessageBroker, Topic};
use domain::Event;

use crate::error::Result;

/// Encodes an event and publishes it keyed by its transaction ID.
pub(crate) async fn publish_event(
    broker: &dyn MessageBroker,
    topic: Topic,
    event: &Event,
) -> Result<()> {
    let payload = domain::encode(event)?;
    broker
        .publish(topic, event.transaction_id.as_str(), payload)
        .await?;

    tracing::info!(
        %topic,
        order_id = %event.order_id,
        transaction_id = %event.transaction_id,
        source = %event.source,
        status = %event.status,
        "Event published"
    );
    Ok(())
}

/// Decodes an inbound message.
///
/// A malformed message is logged, counted and discarded; it is never turned
/// into an outcome.
pub(crate) fn decode_message(message: &Message) -> Option<Event> {
    match domain::decode(&message.payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::error!(
                topic = %message.topic,
                key = %message.key,
                error = %e,
                "Discarding undecodable message"
            );
            metrics::counter!("saga_decode_failures_total", "topic" => message.topic.as_str())
                .increment(1);
            None
        }
    }
}
