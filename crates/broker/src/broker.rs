use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{Result, message::Message, topic::Topic};

/// Stream of messages delivered to one subscriber.
pub type MessageStream = Pin<Box<dyn Stream<Item = Message> + Send>>;

/// Named-topic message broker.
///
/// Delivery is at-least-once. Ordering is only preserved for messages
/// published to the same topic. All implementations must be thread-safe
/// (Send + Sync).
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publishes a payload to a topic under the given partitioning key.
    async fn publish(&self, topic: Topic, key: &str, payload: Vec<u8>) -> Result<()>;

    /// Subscribes to a topic.
    ///
    /// Only messages published after the call returns are delivered. The
    /// stream ends when the broker is closed.
    async fn subscribe(&self, topic: Topic) -> Result<MessageStream>;
}
