use thiserror::Error;

/// Errors that can occur when talking to the broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The broker could not accept the message.
    #[error("Broker unavailable: {0}")]
    Unavailable(String),

    /// The broker has been shut down.
    #[error("Broker is closed")]
    Closed,

    /// A topic name outside the catalogue.
    #[error("Unknown topic: {0}")]
    UnknownTopic(String),
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
