//! Engine port definitions.
//!
//! Ports define the interfaces for external services the engine consumes.
//! Adapters implement these ports for specific services (stub, remote
//! generator, etc.). The record store port lives in `tokendex-store`.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use tokendex_domain::Item;

// =============================================================================
// Generation Gateway
// =============================================================================

/// Failures reported by a generation gateway.
///
/// Failures carry no partial-success state: a batch call either returns
/// every requested item or fails with none usable.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The generator could not be reached or refused the request
    #[error("Generator unavailable: {0}")]
    Unavailable(String),

    /// The generator did not answer in time
    #[error("Generator timed out after {0:?}")]
    Timeout(Duration),

    /// The generator answered with something unusable
    #[error("Invalid generator response: {0}")]
    Invalid(String),
}

/// Port for producing new collectibles.
///
/// Implementations:
/// - `StubGateway` - For testing and offline play (local random rolls)
///
/// Calls have no side effects on local state; the engine owns all
/// persistence of the returned items.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Produce a single new item.
    async fn generate_one(&self) -> Result<Item, GatewayError>;

    /// Produce exactly `count` new items.
    ///
    /// # Returns
    ///
    /// All `count` items, or an error with none of them usable.
    async fn generate_batch(&self, count: usize) -> Result<Vec<Item>, GatewayError>;
}
