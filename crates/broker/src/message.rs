use crate::topic::Topic;

/// A message as delivered by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: Topic,
    /// Partitioning key; saga traffic is keyed by transaction ID.
    pub key: String,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(topic: Topic, key: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            topic,
            key: key.into(),
            payload,
        }
    }
}
