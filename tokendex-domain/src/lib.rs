//! Tokendex Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains the collectible item model, rarity tiers, and resale pricing.

#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod pricing;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{sort_newest_first, Item, ItemRecord, ItemStatus};
pub use pricing::{
    compute_price, compute_price_for_label, is_valid_price, BASE_VALUE, MAX_PRICE, MIN_PRICE,
    ROUND_TO,
};
pub use value_objects::{DomainError, ItemId, RarityTier};
