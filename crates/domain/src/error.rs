//! Codec error types.

use thiserror::Error;

/// An inbound message could not be turned into an [`Event`](crate::Event).
///
/// Consumers must treat this as "nothing was received": a failed decode is
/// never a status-bearing event.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The message body was empty.
    #[error("Empty saga event payload")]
    Empty,

    /// The message body is not a valid saga event.
    #[error("Malformed saga event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// An [`Event`](crate::Event) could not be serialized.
#[derive(Debug, Error)]
#[error("Failed to encode saga event: {0}")]
pub struct EncodeError(#[from] pub serde_json::Error);
