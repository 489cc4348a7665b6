//! Saga envelope shared by the orchestrator and every participant.
//!
//! This crate provides:
//! - [`Event`], the envelope carried through every hop of the saga
//! - [`History`], the append-only audit trail inside the envelope
//! - [`Order`], the order snapshot carried as payload
//! - [`codec`], the JSON wire format with explicit decode failures

pub mod codec;
pub mod error;
pub mod event;
pub mod money;
pub mod payload;

pub use codec::{decode, encode};
pub use error::{DecodeError, EncodeError};
pub use event::{Event, EventSource, History, SagaStatus};
pub use money::Money;
pub use payload::{Order, OrderLine, Product};
