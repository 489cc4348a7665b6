//! The edges of the saga: order intake starts it, the completion notifier
//! records how it ended.
//!
//! - [`OrderService`]: accepts an order and emits the start trigger
//! - [`EventService`]: stores terminal events and answers audit queries
//! - [`CompletionNotifier`]: consumes `notify-ending`

pub mod error;
pub mod event_service;
pub mod notifier;
pub mod order_service;

pub use error::{OrderError, Result};
pub use event_service::{EventFilter, EventService};
pub use notifier::CompletionNotifier;
pub use order_service::{CreateOrderRequest, OrderService};
