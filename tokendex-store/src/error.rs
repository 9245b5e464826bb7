//! Storage layer errors

use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Debug, Error)]
pub enum StoreError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error (reading persisted records)
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Simulated failure (fault injection in the memory store)
    #[error("Injected failure: {operation}")]
    Injected {
        /// Operation that was configured to fail
        operation: String,
    },
}

impl StoreError {
    /// Create an injected-failure error
    pub fn injected(operation: impl Into<String>) -> Self {
        Self::Injected {
            operation: operation.into(),
        }
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
