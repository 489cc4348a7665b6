//! Persistence collaborators for the saga services.
//!
//! - [`CompensationStore`]: per-participant records keyed by `(order, transaction)`
//! - [`OrderStore`]: orders accepted by intake
//! - [`SagaEventStore`]: the audit log of saga envelopes, queried by order or transaction
//!
//! Each store has an in-memory and a PostgreSQL implementation.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{EventStoreError, Result};
pub use memory::{InMemoryCompensationStore, InMemoryOrderStore, InMemorySagaEventStore};
pub use postgres::{
    PostgresCompensationStore, PostgresOrderStore, PostgresSagaEventStore, run_migrations,
};
pub use store::{CompensationRecord, CompensationStore, OrderStore, SagaEventStore};
