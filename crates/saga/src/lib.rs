//! Orchestrated saga for order fulfillment.
//!
//! A central [`Orchestrator`] decides, after every participant step, which
//! step runs next: forward on success, backward (compensating) on failure.
//! Components only talk through broker topics.
//!
//! The pipeline is fixed:
//! 1. Validate products
//! 2. Realize payment
//! 3. Update inventory
//!
//! Routing lives in one place, [`stage::next_topic`]. The participant
//! lifecycle lives in one place, [`SagaHandler`].

pub mod error;
pub mod handler;
pub mod orchestrator;
pub mod participants;
pub mod runtime;
pub mod stage;
mod transport;

pub use error::{Result, SagaError};
pub use handler::{Participant, SagaHandler};
pub use orchestrator::Orchestrator;
pub use participants::{
    Decrement, InMemoryProductCatalog, InMemoryStockStore, InventoryAdjustment, InventoryService,
    LineAdjustment, Payment, PaymentConfig, PaymentService, PaymentStatus, ProductCatalog,
    ProductValidationService, StockStore, Validation,
};
pub use runtime::{SagaParticipants, SagaRuntime};
pub use stage::{PIPELINE, Stage, next_topic};
