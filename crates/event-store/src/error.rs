use thiserror::Error;

/// Errors that can occur when interacting with a store.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// A record already exists for this `(order, transaction)` pair.
    #[error("Duplicate {kind} record for {key}")]
    DuplicateKey { kind: &'static str, key: String },

    /// The store refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
