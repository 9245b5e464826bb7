//! Daemon error types.

use thiserror::Error;
use tokendex_engine::EngineError;
use tokendex_store::StoreError;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Engine error
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Console I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unparseable console input
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Item reference matching nothing or several items
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
