//! The collection engine.
//!
//! Owns the balance, the collection and the pending sale, and exposes every
//! user action as one async call. Each call publishes a notice describing
//! its outcome on the event bus.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use tokendex_domain::{Item, ItemId};
use tokendex_store::RecordStore;

use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus, EventReceiver, Notice};
use crate::inventory::Inventory;
use crate::ledger::Ledger;
use crate::migration::{migrate, MigrationReport};
use crate::ports::GenerationGateway;
use crate::sale::{
    items_label, SaleBackup, SaleCoordinator, SaleQuote, SaleReceipt, SaleState, UndoReceipt,
    UndoStatus,
};
use crate::scheduler::Scheduler;
use crate::selection::BulkSelection;

/// Tokens charged per generated item
pub const GENERATION_COST: u64 = 10;

/// Items per batch generation
pub const BATCH_SIZE: usize = 4;

/// Seconds a sale stays undoable
pub const UNDO_WINDOW_SECS: u64 = 10;

/// Upper bound on a single gateway call
pub const GATEWAY_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub generation_cost: u64,
    pub batch_size: usize,
    pub undo_window: Duration,
    pub gateway_timeout: Duration,
}

impl EngineConfig {
    /// Price of one batch generation
    pub fn batch_cost(&self) -> u64 {
        self.generation_cost.saturating_mul(self.batch_size as u64)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            generation_cost: GENERATION_COST,
            batch_size: BATCH_SIZE,
            undo_window: Duration::from_secs(UNDO_WINDOW_SECS),
            gateway_timeout: Duration::from_secs(GATEWAY_TIMEOUT_SECS),
        }
    }
}

/// Point-in-time view for presentation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub balance: u64,
    pub items: Vec<Item>,
    pub undo: Option<UndoStatus>,
}

// =============================================================================
// Engine
// =============================================================================

pub struct Engine<S: RecordStore, G: GenerationGateway> {
    pub(crate) config: EngineConfig,
    pub(crate) store: Arc<S>,
    pub(crate) gateway: Arc<G>,
    pub(crate) ledger: Arc<Ledger<S>>,
    pub(crate) inventory: Arc<Inventory>,
    pub(crate) events: Arc<EventBus>,
    sales: SaleCoordinator<S>,
    load_report: MigrationReport,
}

impl<S: RecordStore, G: GenerationGateway> Engine<S, G> {
    /// Load the collection, migrating legacy records, and read the balance.
    ///
    /// On failure a notice is published and `EngineError::Load` returned;
    /// the store is not otherwise touched.
    pub async fn open(
        store: Arc<S>,
        gateway: Arc<G>,
        scheduler: Arc<dyn Scheduler>,
        events: Arc<EventBus>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let loaded = async {
            let (items, report) = migrate(store.as_ref()).await.map_err(|e| e.to_string())?;
            let ledger = Ledger::load(Arc::clone(&store)).await.map_err(|e| e.to_string())?;
            Ok::<_, String>((items, report, ledger))
        }
        .await;

        let (items, load_report, ledger) = match loaded {
            Ok(loaded) => loaded,
            Err(reason) => {
                let err = EngineError::Load(reason);
                error!(error = %err, "Failed to load collection");
                events.notify(Notice::error(
                    "Failed to load app data. Please try again.".to_string(),
                ));
                return Err(err);
            },
        };

        let ledger = Arc::new(ledger);
        let inventory = Arc::new(Inventory::new(items));
        let sales = SaleCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::clone(&inventory),
            scheduler,
            Arc::clone(&events),
            config.undo_window,
        );

        info!(
            items = inventory.len(),
            balance = ledger.balance(),
            "Engine ready"
        );
        events.send(EngineEvent::Loaded {
            item_count: inventory.len(),
            balance: ledger.balance(),
        });

        Ok(Self {
            config,
            store,
            gateway,
            ledger,
            inventory,
            events,
            sales,
            load_report,
        })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn balance(&self) -> u64 {
        self.ledger.balance()
    }

    /// Active collection, newest first
    pub fn items(&self) -> Vec<Item> {
        self.inventory.snapshot()
    }

    pub fn item(&self, id: &ItemId) -> Option<Item> {
        self.inventory.get(id)
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn undo_status(&self) -> Option<UndoStatus> {
        self.sales.undo_status()
    }

    pub fn sale_backup(&self) -> Option<SaleBackup> {
        self.sales.backup()
    }

    pub fn sale_state(&self, sale_id: Uuid) -> Option<SaleState> {
        self.sales.sale_state(sale_id)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            balance: self.balance(),
            items: self.items(),
            undo: self.undo_status(),
        }
    }

    /// What the last load changed
    pub fn load_report(&self) -> MigrationReport {
        self.load_report
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Preview a sale for confirmation.
    pub fn quote_sale(&self, ids: &[ItemId]) -> EngineResult<SaleQuote> {
        self.sales.quote(ids)
    }

    pub async fn sell_one(&self, id: &ItemId) -> EngineResult<SaleReceipt> {
        self.sell(std::slice::from_ref(id)).await
    }

    /// Sell a set of items as one undoable sale.
    pub async fn sell(&self, ids: &[ItemId]) -> EngineResult<SaleReceipt> {
        let result = self.sales.sell(ids).await;
        self.report(result, |receipt| {
            format!(
                "Sold {} for {} tokens. Undo available for {}s.",
                items_label(receipt.item_count),
                receipt.total_value,
                receipt.undo_window.as_secs()
            )
        })
    }

    /// Sell every selected item still in the collection.
    ///
    /// The selection is cleared once the sale was attempted, whatever the
    /// outcome. An empty selection is rejected and left as is.
    pub async fn sell_selection(&self, selection: &mut BulkSelection) -> EngineResult<SaleReceipt> {
        let ids: Vec<ItemId> = selection
            .resolve(&self.inventory)
            .into_iter()
            .map(|item| item.id)
            .collect();

        if ids.is_empty() {
            return self.report(Err(EngineError::EmptySale), |_: &SaleReceipt| String::new());
        }

        let result = self.sell(&ids).await;
        selection.clear();
        result
    }

    /// Undo the most recent sale while its window is open.
    pub async fn undo_sale(&self) -> EngineResult<UndoReceipt> {
        let result = self.sales.undo().await;
        self.report(result, |_| "Sale undone successfully!".to_string())
    }

    /// Publish the outcome notice and pass the result through.
    pub(crate) fn report<T>(
        &self,
        result: EngineResult<T>,
        success: impl FnOnce(&T) -> String,
    ) -> EngineResult<T> {
        let notice = match &result {
            Ok(value) => Notice::success(success(value)),
            Err(e) => e.notice(),
        };
        self.events.notify(notice);
        result
    }
}
