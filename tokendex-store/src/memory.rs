//! In-memory store implementation
//!
//! Used for testing and development without a file on disk.
//! Supports fault injection per operation so tests can exercise every
//! compensation path of the engine.

use crate::error::StoreError;
use crate::repository::RecordStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokendex_domain::{ItemId, ItemRecord};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetAllItems,
    GetItem,
    GetBalance,
    SetBalance,
    AddItem,
    AddItems,
    UpdateItem,
    DeleteItems,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOp::GetAllItems => "get_all_items",
            StoreOp::GetItem => "get_item",
            StoreOp::GetBalance => "get_balance",
            StoreOp::SetBalance => "set_balance",
            StoreOp::AddItem => "add_item",
            StoreOp::AddItems => "add_items",
            StoreOp::UpdateItem => "update_item",
            StoreOp::DeleteItems => "delete_items",
        };
        f.write_str(name)
    }
}

/// In-memory store for testing
pub struct MemoryStore {
    records: RwLock<Vec<ItemRecord>>,
    balance: RwLock<u64>,
    /// Operations that fail once, then recover
    fail_next: RwLock<HashSet<StoreOp>>,
    /// Operations that fail until cleared
    fail_always: RwLock<HashSet<StoreOp>>,
    /// Successful write calls
    writes: AtomicU64,
}

impl MemoryStore {
    /// Create a new empty in-memory store with a zero balance
    pub fn new() -> Self {
        Self::with_state(Vec::new(), 0)
    }

    /// Create a store with an initial balance
    pub fn with_balance(balance: u64) -> Self {
        Self::with_state(Vec::new(), balance)
    }

    /// Create a store seeded with records and a balance
    pub fn with_state(records: Vec<ItemRecord>, balance: u64) -> Self {
        Self {
            records: RwLock::new(records),
            balance: RwLock::new(balance),
            fail_next: RwLock::new(HashSet::new()),
            fail_always: RwLock::new(HashSet::new()),
            writes: AtomicU64::new(0),
        }
    }

    /// Make the next call of `op` fail.
    pub fn fail_next(&self, op: StoreOp) {
        self.fail_next.write().insert(op);
    }

    /// Make every call of `op` fail until `clear_failures` is called.
    pub fn fail_always(&self, op: StoreOp) {
        self.fail_always.write().insert(op);
    }

    /// Remove every configured failure
    pub fn clear_failures(&self) {
        self.fail_next.write().clear();
        self.fail_always.write().clear();
    }

    /// Snapshot of the stored records
    pub fn records(&self) -> Vec<ItemRecord> {
        self.records.read().clone()
    }

    /// Current stored balance
    pub fn balance(&self) -> u64 {
        *self.balance.read()
    }

    /// Number of stored records
    pub fn item_count(&self) -> usize {
        self.records.read().len()
    }

    /// Whether a record with this ID is stored
    pub fn contains(&self, id: &ItemId) -> bool {
        self.records.read().iter().any(|r| &r.id == id)
    }

    /// Number of successful write calls since creation or last reset
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Reset the write counter
    pub fn reset_write_count(&self) {
        self.writes.store(0, Ordering::SeqCst);
    }

    /// Check if the operation should fail, consuming a one-shot failure.
    fn check(&self, op: StoreOp) -> Result<(), StoreError> {
        if self.fail_always.read().contains(&op) || self.fail_next.write().remove(&op) {
            return Err(StoreError::injected(op.to_string()));
        }
        Ok(())
    }

    fn upsert(records: &mut Vec<ItemRecord>, record: &ItemRecord) {
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Record Store Implementation
// =============================================================================

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_all_items(&self) -> Result<Vec<ItemRecord>, StoreError> {
        self.check(StoreOp::GetAllItems)?;
        Ok(self.records.read().clone())
    }

    async fn get_item(&self, id: &ItemId) -> Result<Option<ItemRecord>, StoreError> {
        self.check(StoreOp::GetItem)?;
        Ok(self.records.read().iter().find(|r| &r.id == id).cloned())
    }

    async fn get_balance(&self) -> Result<u64, StoreError> {
        self.check(StoreOp::GetBalance)?;
        Ok(*self.balance.read())
    }

    async fn set_balance(&self, amount: u64) -> Result<(), StoreError> {
        self.check(StoreOp::SetBalance)?;
        *self.balance.write() = amount;
        self.record_write();
        Ok(())
    }

    async fn add_item(&self, record: &ItemRecord) -> Result<(), StoreError> {
        self.check(StoreOp::AddItem)?;
        Self::upsert(&mut self.records.write(), record);
        self.record_write();
        Ok(())
    }

    async fn add_items(&self, records: &[ItemRecord]) -> Result<(), StoreError> {
        self.check(StoreOp::AddItems)?;
        let mut stored = self.records.write();
        for record in records {
            Self::upsert(&mut stored, record);
        }
        self.record_write();
        Ok(())
    }

    async fn update_item(&self, record: &ItemRecord) -> Result<(), StoreError> {
        self.check(StoreOp::UpdateItem)?;
        Self::upsert(&mut self.records.write(), record);
        self.record_write();
        Ok(())
    }

    async fn delete_items(&self, ids: &[ItemId]) -> Result<(), StoreError> {
        self.check(StoreOp::DeleteItems)?;
        let ids: HashSet<&ItemId> = ids.iter().collect();
        self.records.write().retain(|r| !ids.contains(&r.id));
        self.record_write();
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokendex_domain::{Item, RarityTier};

    fn create_test_record(name: &str) -> ItemRecord {
        Item::new(name, RarityTier::C, "img").to_record()
    }

    #[tokio::test]
    async fn test_add_and_get_item() {
        let store = MemoryStore::new();
        let record = create_test_record("Pebblit");

        store.add_item(&record).await.unwrap();

        let found = store.get_item(&record.id).await.unwrap();
        assert_eq!(found, Some(record));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn test_add_items_upserts() {
        let store = MemoryStore::new();
        let mut record = create_test_record("Pebblit");
        store.add_item(&record).await.unwrap();

        record.name = "Pebblit II".to_string();
        let other = create_test_record("Flitter");
        store.add_items(&[record.clone(), other]).await.unwrap();

        assert_eq!(store.item_count(), 2);
        let found = store.get_item(&record.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Pebblit II");
    }

    #[tokio::test]
    async fn test_delete_items_ignores_unknown() {
        let a = create_test_record("A");
        let b = create_test_record("B");
        let store = MemoryStore::with_state(vec![a.clone(), b.clone()], 0);

        store.delete_items(&[a.id.clone(), ItemId::new("missing")]).await.unwrap();

        assert!(!store.contains(&a.id));
        assert!(store.contains(&b.id));
    }

    #[tokio::test]
    async fn test_balance_roundtrip() {
        let store = MemoryStore::with_balance(100);
        assert_eq!(store.get_balance().await.unwrap(), 100);

        store.set_balance(70).await.unwrap();
        assert_eq!(store.balance(), 70);
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot() {
        let store = MemoryStore::with_balance(100);
        store.fail_next(StoreOp::SetBalance);

        assert!(store.set_balance(50).await.is_err());
        assert_eq!(store.balance(), 100);
        assert_eq!(store.write_count(), 0);

        store.set_balance(50).await.unwrap();
        assert_eq!(store.balance(), 50);
    }

    #[tokio::test]
    async fn test_fail_always_until_cleared() {
        let store = MemoryStore::new();
        store.fail_always(StoreOp::DeleteItems);

        assert!(store.delete_items(&[]).await.is_err());
        assert!(store.delete_items(&[]).await.is_err());

        store.clear_failures();
        assert!(store.delete_items(&[]).await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_error_names_operation() {
        let store = MemoryStore::new();
        store.fail_next(StoreOp::GetAllItems);

        let err = store.get_all_items().await.unwrap_err();
        assert!(err.to_string().contains("get_all_items"));
    }
}
