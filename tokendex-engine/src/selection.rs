//! Multi-item selection for bulk sales.

use std::collections::HashSet;

use tokendex_domain::{Item, ItemId};

use crate::inventory::Inventory;

/// Ordered set of item IDs picked for a bulk sale.
///
/// The selection is not validated on change; items that leave the
/// collection are simply skipped by `resolve`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSelection {
    ids: Vec<ItemId>,
}

impl BulkSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `id`. Returns `true` if it is now selected.
    pub fn toggle(&mut self, id: ItemId) -> bool {
        match self.ids.iter().position(|selected| selected == &id) {
            Some(index) => {
                self.ids.remove(index);
                false
            },
            None => {
                self.ids.push(id);
                true
            },
        }
    }

    /// Add every ID not already selected.
    pub fn select_all<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = ItemId>,
    {
        let mut present: HashSet<ItemId> = self.ids.iter().cloned().collect();
        for id in ids {
            if present.insert(id.clone()) {
                self.ids.push(id);
            }
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn is_selected(&self, id: &ItemId) -> bool {
        self.ids.contains(id)
    }

    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected items still in the collection, in selection order
    pub fn resolve(&self, inventory: &Inventory) -> Vec<Item> {
        self.ids.iter().filter_map(|id| inventory.get(id)).collect()
    }

    /// Value of the selected items still in the collection
    pub fn total_value(&self, inventory: &Inventory) -> u64 {
        self.resolve(inventory).iter().map(|item| item.price).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokendex_domain::RarityTier;

    #[test]
    fn test_toggle() {
        let mut selection = BulkSelection::new();
        let id = ItemId::new("a");

        assert!(selection.toggle(id.clone()));
        assert!(selection.is_selected(&id));
        assert!(!selection.toggle(id.clone()));
        assert!(selection.is_empty());
    }

    #[test]
    fn test_select_all_skips_duplicates() {
        let mut selection = BulkSelection::new();
        selection.toggle(ItemId::new("a"));
        selection.select_all(["a", "b", "c"].map(ItemId::new));

        assert_eq!(selection.len(), 3);
        selection.clear();
        assert!(selection.is_empty());
    }

    #[test]
    fn test_resolve_skips_missing_items() {
        let kept = Item::new("Kept", RarityTier::A, "");
        let inventory = Inventory::new(vec![kept.clone()]);

        let mut selection = BulkSelection::new();
        selection.select_all([kept.id.clone(), ItemId::new("gone")]);

        assert_eq!(selection.resolve(&inventory), vec![kept]);
        assert_eq!(selection.total_value(&inventory), 175);
    }
}
