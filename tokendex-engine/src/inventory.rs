//! In-memory view of the active collection.
//!
//! Items are kept newest first. The inventory only changes after the
//! corresponding store write has succeeded; callers enforce that order.

use parking_lot::RwLock;
use std::collections::HashSet;

use tokendex_domain::{sort_newest_first, Item, ItemId};

#[derive(Debug, Default)]
pub struct Inventory {
    items: RwLock<Vec<Item>>,
}

impl Inventory {
    pub fn new(mut items: Vec<Item>) -> Self {
        sort_newest_first(&mut items);
        Self {
            items: RwLock::new(items),
        }
    }

    /// Copy of every item, newest first
    pub fn snapshot(&self) -> Vec<Item> {
        self.items.read().clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.read().iter().any(|item| &item.id == id)
    }

    pub fn get(&self, id: &ItemId) -> Option<Item> {
        self.items.read().iter().find(|item| &item.id == id).cloned()
    }

    /// Look up `ids` in order, skipping duplicates.
    ///
    /// Returns the first ID that is not in the collection as the error.
    pub fn resolve(&self, ids: &[ItemId]) -> Result<Vec<Item>, ItemId> {
        let items = self.items.read();
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(ids.len());

        for id in ids {
            if !seen.insert(id) {
                continue;
            }
            match items.iter().find(|item| &item.id == id) {
                Some(item) => resolved.push(item.clone()),
                None => return Err(id.clone()),
            }
        }
        Ok(resolved)
    }

    /// Add items, replacing any with the same ID.
    pub fn insert(&self, new_items: Vec<Item>) {
        let mut items = self.items.write();
        let incoming: HashSet<ItemId> = new_items.iter().map(|item| item.id.clone()).collect();
        items.retain(|item| !incoming.contains(&item.id));
        items.extend(new_items);
        sort_newest_first(&mut items);
    }

    /// Remove items by ID, returning the ones that were present.
    pub fn remove(&self, ids: &[ItemId]) -> Vec<Item> {
        let ids: HashSet<&ItemId> = ids.iter().collect();
        let mut items = self.items.write();
        let (removed, kept): (Vec<Item>, Vec<Item>) =
            items.drain(..).partition(|item| ids.contains(&item.id));
        *items = kept;
        removed
    }

    /// Sum of every item's price
    pub fn total_value(&self) -> u64 {
        self.items.read().iter().map(|item| item.price).sum()
    }
}
