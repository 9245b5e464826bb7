//! Domain Entities for Tokendex
//!
//! `Item` is the validated, owned collectible held by the active inventory.
//! `ItemRecord` is the persisted shape, which may still carry fields written
//! by earlier versions of the game (fusion flags, the `resold` status).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pricing::{compute_price, compute_price_for_label, is_valid_price, MAX_PRICE, MIN_PRICE};
use crate::value_objects::{DomainError, ItemId, RarityTier};

// =============================================================================
// Item Status
// =============================================================================

/// Lifecycle flag stored on records.
///
/// `Resold` belongs to the retired in-place sale model and is only ever read,
/// never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Item is part of the collection
    Owned,
    /// Legacy marker for an item sold under the old model
    Resold,
}

// =============================================================================
// Item
// =============================================================================

/// An owned collectible.
///
/// # Invariants
/// - `price` is within `[MIN_PRICE, MAX_PRICE]`
/// - every field except the ones the engine moves between inventory and
///   sale backup is immutable after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    /// Stored rarity label, kept verbatim even when it names no known tier
    pub rarity: String,
    pub price: u64,
    #[serde(rename = "imageBase64")]
    pub image_data: String,
    pub generated_at: DateTime<Utc>,
    /// Fields this version does not model, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// Create a freshly generated item, priced from its tier.
    pub fn new(name: impl Into<String>, tier: RarityTier, image_data: impl Into<String>) -> Self {
        Self {
            id: ItemId::generate(),
            name: name.into(),
            rarity: tier.as_str().to_string(),
            price: compute_price(tier),
            image_data: image_data.into(),
            generated_at: Utc::now(),
            extra: Map::new(),
        }
    }

    /// Override the generation timestamp
    pub fn with_generated_at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    /// Override the price (no validation, used for fixtures and imports)
    pub fn with_price(mut self, price: u64) -> Self {
        self.price = price;
        self
    }

    /// Parsed rarity tier, `None` for unrecognized labels
    pub fn tier(&self) -> Option<RarityTier> {
        self.rarity.parse().ok()
    }

    /// Whether the price satisfies the inventory invariant
    pub fn has_valid_price(&self) -> bool {
        is_valid_price(self.price)
    }

    /// Replace an out-of-range price with the computed one.
    ///
    /// Returns `true` if the price changed.
    pub fn normalize_price(&mut self) -> bool {
        if self.has_valid_price() {
            return false;
        }
        self.price = compute_price_for_label(&self.rarity);
        true
    }

    /// Persisted form of this item
    pub fn to_record(&self) -> ItemRecord {
        ItemRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            rarity: self.rarity.clone(),
            price: Some(self.price),
            image_data: self.image_data.clone(),
            generated_at: self.generated_at,
            status: Some(ItemStatus::Owned),
            is_fused: None,
            used_in_fusion: None,
            parent_ids: None,
            extra: self.extra.clone(),
        }
    }
}

/// Sort items newest first by `generated_at`.
///
/// The sort is stable, so items generated at the same instant keep their
/// relative order.
pub fn sort_newest_first(items: &mut [Item]) {
    items.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
}

// =============================================================================
// Item Record
// =============================================================================

/// Persisted item, as read from the record store.
///
/// Legacy records may lack `price` and may carry fusion fields; those are
/// repaired by the load-time migration before becoming `Item`s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: ItemId,
    pub name: String,
    pub rarity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
    #[serde(rename = "imageBase64", default)]
    pub image_data: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_in_fusion: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_ids: Option<Vec<ItemId>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemRecord {
    /// Record produced by the retired fusion feature
    pub fn is_fused(&self) -> bool {
        self.is_fused.unwrap_or(false)
    }

    /// Record that was consumed as a fusion parent
    pub fn is_used_in_fusion(&self) -> bool {
        self.used_in_fusion.unwrap_or(false)
    }

    /// Record sold under the legacy in-place model
    pub fn is_resold(&self) -> bool {
        matches!(self.status, Some(ItemStatus::Resold))
    }

    /// Record whose price is absent or violates the price range
    pub fn needs_price(&self) -> bool {
        !self.price.is_some_and(is_valid_price)
    }

    /// Copy without any fusion-related field
    pub fn without_fusion_fields(&self) -> Self {
        Self {
            is_fused: None,
            used_in_fusion: None,
            parent_ids: None,
            ..self.clone()
        }
    }

    /// Copy with a price computed from the stored rarity label
    pub fn with_computed_price(&self) -> Self {
        Self {
            price: Some(compute_price_for_label(&self.rarity)),
            ..self.clone()
        }
    }

    /// Convert into an owned `Item`.
    ///
    /// # Errors
    /// - `DomainError::NotOwned` for fused or resold records
    /// - `DomainError::MissingPrice` / `PriceOutOfRange` when unpriced
    pub fn into_item(self) -> Result<Item, DomainError> {
        if self.is_fused() || self.is_resold() {
            return Err(DomainError::NotOwned(self.id));
        }

        let price = self.price.ok_or_else(|| DomainError::MissingPrice(self.id.clone()))?;
        if !is_valid_price(price) {
            return Err(DomainError::PriceOutOfRange {
                id: self.id,
                price,
                min: MIN_PRICE,
                max: MAX_PRICE,
            });
        }

        Ok(Item {
            id: self.id,
            name: self.name,
            rarity: self.rarity,
            price,
            image_data: self.image_data,
            generated_at: self.generated_at,
            extra: self.extra,
        })
    }
}

impl From<&Item> for ItemRecord {
    fn from(item: &Item) -> Self {
        item.to_record()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn legacy_json() -> &'static str {
        r#"{
            "id": "p-1",
            "name": "Emberling",
            "rarity": "B",
            "imageBase64": "AAAA",
            "generatedAt": "2024-05-01T10:00:00Z",
            "usedInFusion": true,
            "parentIds": ["p-0"],
            "nickname": "Sparky"
        }"#
    }

    #[test]
    fn test_new_item_is_priced() {
        let item = Item::new("Mossling", RarityTier::A, "img");
        assert_eq!(item.price, compute_price(RarityTier::A));
        assert_eq!(item.tier(), Some(RarityTier::A));
        assert!(item.has_valid_price());
    }

    #[test]
    fn test_legacy_record_parses() {
        let record: ItemRecord = serde_json::from_str(legacy_json()).unwrap();
        assert!(record.is_used_in_fusion());
        assert!(!record.is_fused());
        assert!(record.needs_price());
        assert_eq!(record.extra.get("nickname"), Some(&Value::from("Sparky")));
    }

    #[test]
    fn test_strip_fusion_fields() -> anyhow::Result<()> {
        let record: ItemRecord = serde_json::from_str(legacy_json())?;
        let cleaned = record.without_fusion_fields();

        let json = serde_json::to_value(&cleaned)?;
        assert!(json.get("usedInFusion").is_none());
        assert!(json.get("parentIds").is_none());
        assert!(json.get("isFused").is_none());
        assert_eq!(json.get("nickname"), Some(&Value::from("Sparky")));
        Ok(())
    }

    #[test]
    fn test_into_item_requires_price() {
        let record: ItemRecord = serde_json::from_str(legacy_json()).unwrap();
        assert!(matches!(record.clone().into_item(), Err(DomainError::MissingPrice(_))));

        let item = record.with_computed_price().into_item().unwrap();
        assert_eq!(item.price, compute_price(RarityTier::B));
    }

    #[test]
    fn test_out_of_range_price_needs_repricing() {
        let mut record = Item::new("Glim", RarityTier::C, "img").to_record();
        record.price = Some(3);
        assert!(record.needs_price());
        assert!(matches!(record.into_item(), Err(DomainError::PriceOutOfRange { .. })));
    }

    #[test]
    fn test_resold_record_is_not_owned() {
        let mut record = Item::new("Glim", RarityTier::C, "img").to_record();
        record.status = Some(ItemStatus::Resold);
        assert!(record.is_resold());
        assert!(matches!(record.into_item(), Err(DomainError::NotOwned(_))));
    }

    #[test]
    fn test_record_roundtrip_preserves_item() {
        let item = Item::new("Tidepup", RarityTier::S, "img");
        let restored = item.to_record().into_item().unwrap();
        assert_eq!(restored, item);
    }

    #[test]
    fn test_sort_newest_first() {
        let now = Utc::now();
        let old = Item::new("Old", RarityTier::F, "").with_generated_at(now - Duration::hours(2));
        let mid = Item::new("Mid", RarityTier::F, "").with_generated_at(now - Duration::hours(1));
        let new = Item::new("New", RarityTier::F, "").with_generated_at(now);

        let mut items = vec![mid.clone(), old.clone(), new.clone()];
        sort_newest_first(&mut items);

        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["New", "Mid", "Old"]);
    }

    #[test]
    fn test_normalize_price() {
        let mut item = Item::new("Glim", RarityTier::D, "").with_price(0);
        assert!(item.normalize_price());
        assert_eq!(item.price, compute_price(RarityTier::D));
        assert!(!item.normalize_price());
    }
}
