//! Value Objects for the Tokendex Domain
//!
//! Immutable, validated domain primitives.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Rarity label is not one of the known tiers
    #[error("Unknown rarity tier: {0}")]
    UnknownRarity(String),

    /// Record has no resale price attached
    #[error("Item {0} has no price")]
    MissingPrice(ItemId),

    /// Record carries a price outside the allowed range
    #[error("Item {id} has price {price} outside [{min}, {max}]")]
    PriceOutOfRange {
        /// Offending item
        id: ItemId,
        /// Stored price
        price: u64,
        /// Lower bound
        min: u64,
        /// Upper bound
        max: u64,
    },

    /// Record belongs to a retired feature or legacy sale model
    #[error("Item {0} is not an owned item")]
    NotOwned(ItemId),
}

// =============================================================================
// ItemId
// =============================================================================

/// Opaque, immutable item identifier.
///
/// New items get a time-ordered UUIDv7; legacy records keep whatever
/// identifier they were stored with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Wrap an existing identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh identifier
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// RarityTier
// =============================================================================

/// Rarity tier of a collectible, ordered lowest to highest.
///
/// The derived `Ord` follows declaration order, so `F < E < ... < S < S+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RarityTier {
    /// Lowest tier
    F,
    /// E tier
    E,
    /// D tier
    D,
    /// C tier
    C,
    /// B tier
    B,
    /// A tier
    A,
    /// S tier
    S,
    /// Highest tier
    #[serde(rename = "S+")]
    SPlus,
}

impl RarityTier {
    /// Every tier in ascending order
    pub const ALL: [RarityTier; 8] = [
        RarityTier::F,
        RarityTier::E,
        RarityTier::D,
        RarityTier::C,
        RarityTier::B,
        RarityTier::A,
        RarityTier::S,
        RarityTier::SPlus,
    ];

    /// Stored label of this tier
    pub fn as_str(&self) -> &'static str {
        match self {
            RarityTier::F => "F",
            RarityTier::E => "E",
            RarityTier::D => "D",
            RarityTier::C => "C",
            RarityTier::B => "B",
            RarityTier::A => "A",
            RarityTier::S => "S",
            RarityTier::SPlus => "S+",
        }
    }

    /// Tiers rare enough to deserve a celebration when pulled
    pub fn is_showcase(&self) -> bool {
        matches!(self, RarityTier::S | RarityTier::SPlus)
    }
}

impl FromStr for RarityTier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "F" => Ok(RarityTier::F),
            "E" => Ok(RarityTier::E),
            "D" => Ok(RarityTier::D),
            "C" => Ok(RarityTier::C),
            "B" => Ok(RarityTier::B),
            "A" => Ok(RarityTier::A),
            "S" => Ok(RarityTier::S),
            "S+" | "S_PLUS" => Ok(RarityTier::SPlus),
            other => Err(DomainError::UnknownRarity(other.to_string())),
        }
    }
}

impl fmt::Display for RarityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
