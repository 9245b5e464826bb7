//! JSON file store implementation
//!
//! Keeps the whole collection and the balance in one JSON document.
//! Every write serializes the next state, writes and fsyncs a sibling temp
//! file, renames it over the live file and fsyncs the directory. A call is
//! durable once it returns `Ok`, and a failed call leaves the previous
//! document in place.
//!
//! Writers are serialized and each one rewrites the whole document, so N
//! concurrent `update_item` calls (a price backfill at load) cost N full
//! rewrites in a row.

use crate::error::StoreError;
use crate::repository::RecordStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokendex_domain::{ItemId, ItemRecord};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// On-disk document layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    balance: u64,
    #[serde(default)]
    items: Vec<ItemRecord>,
}

/// Record store persisted as a single JSON file.
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<Document>,
}

impl JsonFileStore {
    /// Open the store at `path`.
    ///
    /// A missing file starts an empty collection with `starting_balance`;
    /// nothing is written until the first mutation.
    pub async fn open(
        path: impl AsRef<Path>,
        starting_balance: u64,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let document = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Document>(&bytes)
                .map_err(|e| StoreError::Deserialization(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), starting_balance, "No data file, starting fresh");
                Document {
                    balance: starting_balance,
                    items: Vec::new(),
                }
            },
            Err(e) => return Err(e.into()),
        };

        debug!(
            path = %path.display(),
            items = document.items.len(),
            balance = document.balance,
            "Data file opened"
        );

        Ok(Self {
            path,
            state: Mutex::new(document),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `mutate` to a copy of the document, persist it, then commit.
    async fn write_with<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Document),
    {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        mutate(&mut next);

        self.persist(&next).await?;
        *state = next;
        Ok(())
    }

    async fn persist(&self, document: &Document) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Self::sync_parent(&self.path).await?;
        Ok(())
    }

    #[cfg(target_family = "unix")]
    async fn sync_parent(path: &Path) -> Result<(), StoreError> {
        let parent = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        tokio::fs::File::open(parent).await?.sync_all().await?;
        Ok(())
    }

    #[cfg(not(target_family = "unix"))]
    async fn sync_parent(_path: &Path) -> Result<(), StoreError> {
        Ok(())
    }

    fn upsert(items: &mut Vec<ItemRecord>, record: &ItemRecord) {
        match items.iter_mut().find(|r| r.id == record.id) {
            Some(existing) => *existing = record.clone(),
            None => items.push(record.clone()),
        }
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn get_all_items(&self) -> Result<Vec<ItemRecord>, StoreError> {
        Ok(self.state.lock().await.items.clone())
    }

    async fn get_item(&self, id: &ItemId) -> Result<Option<ItemRecord>, StoreError> {
        Ok(self.state.lock().await.items.iter().find(|r| &r.id == id).cloned())
    }

    async fn get_balance(&self) -> Result<u64, StoreError> {
        Ok(self.state.lock().await.balance)
    }

    async fn set_balance(&self, amount: u64) -> Result<(), StoreError> {
        self.write_with(|doc| doc.balance = amount).await
    }

    async fn add_item(&self, record: &ItemRecord) -> Result<(), StoreError> {
        self.write_with(|doc| Self::upsert(&mut doc.items, record)).await
    }

    async fn add_items(&self, records: &[ItemRecord]) -> Result<(), StoreError> {
        self.write_with(|doc| {
            for record in records {
                Self::upsert(&mut doc.items, record);
            }
        })
        .await
    }

    async fn update_item(&self, record: &ItemRecord) -> Result<(), StoreError> {
        self.write_with(|doc| Self::upsert(&mut doc.items, record)).await
    }

    async fn delete_items(&self, ids: &[ItemId]) -> Result<(), StoreError> {
        let ids: HashSet<&ItemId> = ids.iter().collect();
        self.write_with(|doc| doc.items.retain(|r| !ids.contains(&r.id))).await
    }
}

// =============================================================================
// Tests
// =============================================================================
