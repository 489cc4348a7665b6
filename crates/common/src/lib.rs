//! Identifier types shared by every saga participant.

pub mod types;

pub use types::{EventId, OrderId, SagaKey, TransactionId};
