//! Consumer loop with bounded redelivery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use crate::{
    Result,
    broker::{MessageBroker, MessageStream},
    message::Message,
    topic::Topic,
};

/// Error returned by a [`MessageHandler`]; any error triggers redelivery.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Processes messages consumed from a topic.
///
/// Returning `Err` asks the consumer to deliver the same message again.
/// Handlers must therefore tolerate receiving a message more than once.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> std::result::Result<(), HandlerError>;
}

/// Redelivery policy for a [`Consumer`].
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Total delivery attempts per message, including the first.
    pub max_attempts: u32,
    /// Base delay between attempts; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// Feeds every message of one topic to a handler.
pub struct Consumer {
    topic: Topic,
    handler: Arc<dyn MessageHandler>,
    config: ConsumerConfig,
}

impl Consumer {
    pub fn new(topic: Topic, handler: Arc<dyn MessageHandler>, config: ConsumerConfig) -> Self {
        Self {
            topic,
            handler,
            config,
        }
    }

    /// Returns the topic this consumer reads.
    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Subscribes to the topic and processes messages on a background task.
    ///
    /// The subscription is in place when this returns, so nothing published
    /// afterwards is missed. The task ends when the broker closes the stream.
    pub async fn start(self, broker: &dyn MessageBroker) -> Result<JoinHandle<()>> {
        let stream = broker.subscribe(self.topic).await?;
        tracing::info!(topic = %self.topic, "Consumer started");
        Ok(tokio::spawn(self.run(stream)))
    }

    /// Processes messages until the stream ends.
    pub async fn run(self, mut stream: MessageStream) {
        while let Some(message) = stream.next().await {
            self.deliver(&message).await;
        }
        tracing::info!(topic = %self.topic, "Consumer stopped");
    }

    /// Delivers one message, retrying on handler error.
    ///
    /// Returns false when every attempt failed and the message was dropped.
    pub async fn deliver(&self, message: &Message) -> bool {
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.handler.handle(message).await {
                Ok(()) => return true,
                Err(e) if attempt < max_attempts => {
                    tracing::warn!(
                        topic = %self.topic,
                        key = %message.key,
                        attempt,
                        error = %e,
                        "Handler failed, redelivering"
                    );
                    metrics::counter!("broker_redeliveries_total", "topic" => self.topic.as_str())
                        .increment(1);
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                }
                Err(e) => {
                    tracing::error!(
                        topic = %self.topic,
                        key = %message.key,
                        attempts = max_attempts,
                        error = %e,
                        "Handler failed on every attempt, dropping message"
                    );
                    metrics::counter!("broker_messages_dropped_total", "topic" => self.topic.as_str())
                        .increment(1);
                }
            }
        }

        false
    }
}
