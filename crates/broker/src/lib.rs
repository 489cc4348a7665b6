//! Asynchronous messaging for the saga.
//!
//! Every component talks to the others only through named topics:
//!
//! - [`Topic`]: the fixed topic catalogue
//! - [`MessageBroker`]: publish to and subscribe to a topic
//! - [`InMemoryBroker`]: at-least-once in-process broker with fault injection
//! - [`Consumer`]: drives a [`MessageHandler`] from a subscription, redelivering on error

pub mod broker;
pub mod consumer;
pub mod error;
pub mod memory;
pub mod message;
pub mod topic;

pub use broker::{MessageBroker, MessageStream};
pub use consumer::{Consumer, ConsumerConfig, HandlerError, MessageHandler};
pub use error::{BrokerError, Result};
pub use memory::InMemoryBroker;
pub use message::Message;
pub use topic::Topic;
