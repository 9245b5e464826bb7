//! Tokendex Engine
//!
//! Token economy, generation, sales with time-boxed undo, and load-time
//! migration of legacy records.
//!
//! # Architecture
//!
//! ```text
//! Command → Engine → (Gateway) → RecordStore → in-memory state → EventBus
//! ```
//!
//! # Components
//!
//! - **Ports**: `GenerationGateway`, the generation service interface
//! - **Ledger**: Token balance mirrored to the store
//! - **Inventory**: Active collection, newest first
//! - **Sale coordinator**: Sales, undo window, finalization
//! - **Migration**: Repairs legacy records on load
//! - **Scheduler**: Timers, real (`TokioScheduler`) or manual (`ManualScheduler`)
//! - **Stub**: Local gateway for tests and offline play
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tokendex_engine::{Engine, EngineConfig, EventBus, StubGateway, TokioScheduler};
//! use tokendex_store::MemoryStore;
//!
//! let engine = Engine::open(
//!     Arc::new(MemoryStore::with_balance(100)),
//!     Arc::new(StubGateway::new()),
//!     Arc::new(TokioScheduler),
//!     Arc::new(EventBus::default()),
//!     EngineConfig::default(),
//! )
//! .await?;
//!
//! let receipt = engine.generate_one().await?;
//! engine.sell_one(&receipt.items[0].id).await?;
//! engine.undo_sale().await?;
//! ```

#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod events;
pub mod generation;
pub mod inventory;
pub mod ledger;
pub mod migration;
pub mod ports;
pub mod sale;
pub mod scheduler;
pub mod selection;
pub mod stub;

// Re-exports for convenience
pub use engine::{
    Engine, EngineConfig, EngineSnapshot, BATCH_SIZE, GATEWAY_TIMEOUT_SECS, GENERATION_COST,
    UNDO_WINDOW_SECS,
};
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, EventBus, EventReceiver, Notice, NoticeLevel, NOTICE_TTL};
pub use generation::GenerationReceipt;
pub use inventory::Inventory;
pub use ledger::{Ledger, LedgerError};
pub use migration::{migrate, MigrationError, MigrationPlan, MigrationReport};
pub use ports::{GatewayError, GenerationGateway};
pub use sale::{
    SaleBackup, SaleCoordinator, SaleQuote, SaleReceipt, SaleState, UndoReceipt, UndoStatus,
};
pub use scheduler::{ManualScheduler, Scheduler, TimerHandle, TimerTask, TokioScheduler};
pub use selection::BulkSelection;
pub use stub::StubGateway;
