//! Tokendex Storage Layer
//!
//! Provides persistence for the item collection and the token balance.
//!
//! # Architecture
//!
//! - **Repository trait**: `RecordStore`, the storage interface (port)
//! - **In-memory store**: Fast implementation for testing, with fault injection
//! - **JSON file store**: Durable single-document implementation
//!
//! # Usage
//!
//! ```rust
//! use tokendex_store::{MemoryStore, RecordStore};
//! use tokendex_domain::{Item, RarityTier};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::with_balance(100);
//!
//!     let item = Item::new("Sproutle", RarityTier::B, "");
//!     store.add_item(&item.to_record()).await.unwrap();
//!
//!     let records = store.get_all_items().await.unwrap();
//!     println!("Stored items: {}", records.len());
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod file;
mod memory;
mod repository;

// Re-exports
pub use error::{StoreError, StoreResult};
pub use file::JsonFileStore;
pub use memory::{MemoryStore, StoreOp};
pub use repository::RecordStore;
