//! Saga error types.

use broker::BrokerError;
use domain::{DecodeError, EncodeError, EventSource, SagaStatus};
use event_store::EventStoreError;
use thiserror::Error;

/// Errors that can occur while processing a saga step.
#[derive(Debug, Error)]
pub enum SagaError {
    /// A business rule of the local step was violated.
    #[error("{0}")]
    Precondition(String),

    /// The step already ran for this `(order, transaction)` pair.
    #[error("There's another transactionId for this validation.")]
    DuplicateTransaction { key: String },

    /// The stage table has no destination for this outcome.
    #[error("No route for source {origin} with status {status}")]
    UnroutableEvent {
        origin: EventSource,
        status: SagaStatus,
    },

    /// Publishing to the broker failed.
    #[error("Publish error: {0}")]
    Publish(#[from] BrokerError),

    /// A participant store failed.
    #[error("Store error: {0}")]
    Store(#[source] EventStoreError),

    /// An inbound message could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// An outbound event could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),
}

impl SagaError {
    pub fn precondition(message: impl Into<String>) -> Self {
        SagaError::Precondition(message.into())
    }
}

impl From<EventStoreError> for SagaError {
    fn from(err: EventStoreError) -> Self {
        match err {
            EventStoreError::DuplicateKey { key, .. } => SagaError::DuplicateTransaction { key },
            other => SagaError::Store(other),
        }
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
