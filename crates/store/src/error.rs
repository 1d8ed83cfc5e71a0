use thiserror::Error;

use crate::ProductId;

/// Errors raised by storage adapters.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional quantity update found a different quantity than expected.
    /// No update in the batch was applied.
    #[error("Quantity of product {0} changed concurrently")]
    QuantityConflict(ProductId),

    /// A failure injected by the in-memory adapter.
    #[error("Injected failure: {0}")]
    Injected(String),

    /// A stored row could not be mapped back to a record.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
