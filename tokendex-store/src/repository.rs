//! Repository trait definitions (Ports)
//!
//! The record store is the single shared resource of the engine. Every call
//! is independently durable on success; there are no multi-call
//! transactions, so callers reach atomicity by sequencing and compensation.

use crate::error::StoreError;
use async_trait::async_trait;
use tokendex_domain::{ItemId, ItemRecord};

/// Durable storage for the item collection and the token balance.
///
/// Implementations:
/// - `MemoryStore` - For testing (fault injection, write counting)
/// - `JsonFileStore` - Single JSON document on disk
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load every persisted item record, legacy ones included
    async fn get_all_items(&self) -> Result<Vec<ItemRecord>, StoreError>;

    /// Load a single record
    async fn get_item(&self, id: &ItemId) -> Result<Option<ItemRecord>, StoreError>;

    /// Read the persisted token balance
    async fn get_balance(&self) -> Result<u64, StoreError>;

    /// Overwrite the persisted token balance
    async fn set_balance(&self, amount: u64) -> Result<(), StoreError>;

    /// Insert (or replace) one record
    async fn add_item(&self, record: &ItemRecord) -> Result<(), StoreError>;

    /// Insert (or replace) several records in one call
    async fn add_items(&self, records: &[ItemRecord]) -> Result<(), StoreError>;

    /// Replace an existing record (upsert)
    async fn update_item(&self, record: &ItemRecord) -> Result<(), StoreError>;

    /// Delete several records in one call. Unknown IDs are ignored.
    async fn delete_items(&self, ids: &[ItemId]) -> Result<(), StoreError>;
}
