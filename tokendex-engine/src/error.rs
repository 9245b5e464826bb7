//! Engine error types.

use thiserror::Error;

use tokendex_domain::ItemId;
use tokendex_store::StoreError;

use crate::events::Notice;
use crate::ports::GatewayError;

/// Errors returned by engine operations.
///
/// Validation errors are raised before any side effect. Every other
/// variant describes how far an operation got and what was compensated.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Balance does not cover the operation
    #[error("You need {required} tokens, but only have {available}.")]
    InsufficientBalance { required: u64, available: u64 },

    /// Sale requested with no items
    #[error("No items selected to sell.")]
    EmptySale,

    /// Sale requested for an item that is not in the collection
    #[error("Item {0} is not in your collection.")]
    ItemNotOwned(ItemId),

    /// No sale within its undo window
    #[error("There is no sale to undo.")]
    UndoUnavailable,

    /// Generation failed after the debit; the debit was refunded
    #[error("Failed to generate item: {reason}. Tokens refunded.")]
    GenerationRefunded { reason: String },

    /// Generation failed after the debit and the refund could not be saved
    #[error("Failed to generate item: {reason}. The refund could not be saved: {refund_error}")]
    RefundFailed { reason: String, refund_error: String },

    /// Generation failed before the balance was committed
    #[error("Failed to generate {what}: {reason}. No tokens were deducted.")]
    GenerationNotCharged { what: &'static str, reason: String },

    /// Sale could not be persisted; compensation was attempted
    #[error("Failed to sell items: {0}")]
    SaleFailed(String),

    /// Undo could not be persisted; the sale stands
    #[error("Failed to undo sale: {0}")]
    UndoFailed(String),

    /// Startup load or migration failed
    #[error("Failed to load app data: {0}")]
    Load(String),

    /// Generation gateway error
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Whether the error was raised before any side effect.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::InsufficientBalance { .. }
                | EngineError::EmptySale
                | EngineError::ItemNotOwned(_)
                | EngineError::UndoUnavailable
        )
    }

    /// User-facing notice for this error.
    pub fn notice(&self) -> Notice {
        if self.is_validation() {
            Notice::warning(self.to_string())
        } else {
            Notice::error(self.to_string())
        }
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
