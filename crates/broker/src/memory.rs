//! In-process [`MessageBroker`] with per-topic fan-out.
//!
//! Carries fault injection for redelivery tests and an opt-in publish log.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::{RwLock, mpsc};

use crate::{
    BrokerError, Result,
    broker::{MessageBroker, MessageStream},
    message::Message,
    topic::Topic,
};

#[derive(Default)]
struct InMemoryBrokerState {
    subscribers: HashMap<Topic, Vec<mpsc::UnboundedSender<Message>>>,
    published: Option<Vec<Message>>,
    fail_on_publish: bool,
    fail_next: usize,
    closed: bool,
}

/// In-process broker.
///
/// Fans every published message out to all current subscribers of its topic.
/// A broker built with [`InMemoryBroker::with_publish_log`] also records every
/// published message; one built with [`InMemoryBroker::new`] retains nothing.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<RwLock<InMemoryBrokerState>>,
}

impl InMemoryBroker {
    /// Creates a new broker with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a broker that records every published message.
    pub fn with_publish_log() -> Self {
        let state = InMemoryBrokerState {
            published: Some(Vec::new()),
            ..InMemoryBrokerState::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Makes every publish fail while set.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().await.fail_on_publish = fail;
    }

    /// Makes the next `count` publishes fail.
    pub async fn fail_next_publishes(&self, count: usize) {
        self.state.write().await.fail_next = count;
    }

    /// Closes the broker. Subscriptions end and further publishes fail.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        state.closed = true;
        state.subscribers.clear();
    }

    /// Returns every message published so far, in publish order.
    ///
    /// Always empty unless the broker was built with a publish log.
    pub async fn published(&self) -> Vec<Message> {
        self.state
            .read()
            .await
            .published
            .clone()
            .unwrap_or_default()
    }

    /// Returns the topics of every message published so far, in publish order.
    pub async fn published_topics(&self) -> Vec<Topic> {
        self.published().await.iter().map(|m| m.topic).collect()
    }

    /// Returns the messages published to one topic.
    pub async fn published_to(&self, topic: Topic) -> Vec<Message> {
        self.published()
            .await
            .into_iter()
            .filter(|m| m.topic == topic)
            .collect()
    }

    /// Returns the number of live subscriptions on a topic.
    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        self.state
            .read()
            .await
            .subscribers
            .get(&topic)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, topic: Topic, key: &str, payload: Vec<u8>) -> Result<()> {
        let mut state = self.state.write().await;

        if state.closed {
            return Err(BrokerError::Closed);
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(BrokerError::Unavailable(format!(
                "publish to {topic} rejected"
            )));
        }
        if state.fail_on_publish {
            return Err(BrokerError::Unavailable(format!(
                "publish to {topic} rejected"
            )));
        }

        let message = Message::new(topic, key, payload);
        if let Some(log) = state.published.as_mut() {
            log.push(message.clone());
        }

        if let Some(subscribers) = state.subscribers.get_mut(&topic) {
            subscribers.retain(|tx| tx.send(message.clone()).is_ok());
        }

        tracing::debug!(%topic, key, "Message published");
        metrics::counter!("broker_messages_published_total", "topic" => topic.as_str())
            .increment(1);

        Ok(())
    }

    async fn subscribe(&self, topic: Topic) -> Result<MessageStream> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(BrokerError::Closed);
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        state.subscribers.entry(topic).or_default().push(tx);

        Ok(Box::pin(stream::poll_fn(move |cx| rx.poll_recv(cx))))
    }
}
