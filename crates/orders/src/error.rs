//! Order intake error types.

use broker::BrokerError;
use domain::EncodeError;
use event_store::EventStoreError;
use thiserror::Error;

/// Errors that can occur in order intake and audit queries.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request is missing required data.
    #[error("{0}")]
    Validation(String),

    /// No event matches the query.
    #[error("{0}")]
    NotFound(String),

    /// A store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] EventStoreError),

    /// Emitting the start trigger failed.
    #[error("Publish error: {0}")]
    Publish(#[from] BrokerError),

    /// The start trigger could not be encoded.
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),
}

/// Result type for order operations.
pub type Result<T> = std::result::Result<T, OrderError>;
