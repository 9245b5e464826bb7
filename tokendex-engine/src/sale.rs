//! Sale coordination with a time-boxed undo.
//!
//! A sale removes items from the collection and credits their value right
//! away, then keeps a backup for the undo window. At most one sale is
//! undoable at a time:
//!
//! ```text
//! quote ──► sell ──► ExecutedWithUndoWindow ──┬── timer fires ──► Finalized
//!                                             ├── newer sale ───► Finalized
//!                                             └── undo ─────────► Reversed
//! ```
//!
//! Store writes always come before in-memory changes. When a later step of
//! a multi-step write fails, earlier steps are compensated.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tokendex_domain::{Item, ItemId, ItemRecord};
use tokendex_store::RecordStore;

use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, EventBus, Notice};
use crate::inventory::Inventory;
use crate::ledger::{Ledger, LedgerError};
use crate::scheduler::{Scheduler, TimerHandle};

/// Closed sales remembered for `sale_state`
const CLOSED_HISTORY: usize = 16;

// =============================================================================
// Types
// =============================================================================

/// Where a sale is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SaleState {
    PendingConfirmation,
    ExecutedWithUndoWindow,
    Finalized,
    Reversed,
}

impl std::fmt::Display for SaleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SaleState::PendingConfirmation => "pending confirmation",
            SaleState::ExecutedWithUndoWindow => "undo available",
            SaleState::Finalized => "final",
            SaleState::Reversed => "undone",
        };
        f.write_str(label)
    }
}

/// Items and value of a sale awaiting confirmation. Nothing is mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleQuote {
    pub items: Vec<Item>,
    pub total_value: u64,
}

impl SaleQuote {
    pub fn state(&self) -> SaleState {
        SaleState::PendingConfirmation
    }
}

/// Everything needed to reverse a sale
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleBackup {
    pub sale_id: Uuid,
    pub items: Vec<Item>,
    pub total_value: u64,
}

impl SaleBackup {
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    fn records(&self) -> Vec<ItemRecord> {
        self.items.iter().map(Item::to_record).collect()
    }
}

/// Result of a completed sale
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaleReceipt {
    pub sale_id: Uuid,
    pub item_count: usize,
    pub total_value: u64,
    pub balance: u64,
    pub undo_window: Duration,
}

/// Result of an undone sale
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndoReceipt {
    pub sale_id: Uuid,
    pub item_count: usize,
    pub total_value: u64,
    pub balance: u64,
}

/// Undo offer shown while a sale is reversible
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoStatus {
    pub sale_id: Uuid,
    pub item_count: usize,
    pub total_value: u64,
    /// Whole seconds left, rounded up; the offer disappears at zero
    pub remaining_secs: u64,
}

struct PendingSale {
    backup: SaleBackup,
    deadline: Instant,
    timer: TimerHandle,
}

type PendingSlot = Arc<Mutex<Option<PendingSale>>>;
type ClosedSales = Arc<Mutex<VecDeque<(Uuid, SaleState)>>>;

/// Human count, "1 item" / "3 items"
pub(crate) fn items_label(count: usize) -> String {
    if count == 1 {
        "1 item".to_string()
    } else {
        format!("{} items", count)
    }
}

// =============================================================================
// Sale Coordinator
// =============================================================================

pub struct SaleCoordinator<S: RecordStore> {
    store: Arc<S>,
    ledger: Arc<Ledger<S>>,
    inventory: Arc<Inventory>,
    scheduler: Arc<dyn Scheduler>,
    events: Arc<EventBus>,
    undo_window: Duration,
    pending: PendingSlot,
    closed: ClosedSales,
}

impl<S: RecordStore> SaleCoordinator<S> {
    pub fn new(
        store: Arc<S>,
        ledger: Arc<Ledger<S>>,
        inventory: Arc<Inventory>,
        scheduler: Arc<dyn Scheduler>,
        events: Arc<EventBus>,
        undo_window: Duration,
    ) -> Self {
        Self {
            store,
            ledger,
            inventory,
            scheduler,
            events,
            undo_window,
            pending: Arc::new(Mutex::new(None)),
            closed: Arc::new(Mutex::new(VecDeque::with_capacity(CLOSED_HISTORY))),
        }
    }

    /// Resolve the items of a prospective sale.
    pub fn quote(&self, ids: &[ItemId]) -> EngineResult<SaleQuote> {
        if ids.is_empty() {
            return Err(EngineError::EmptySale);
        }
        let items = self.inventory.resolve(ids).map_err(EngineError::ItemNotOwned)?;
        let total_value = items.iter().map(|item| item.price).sum();
        Ok(SaleQuote { items, total_value })
    }

    /// Sell `ids`: delete them, credit their value, open the undo window.
    ///
    /// A still-open undo window of an earlier sale is closed first, and
    /// that sale becomes permanent.
    pub async fn sell(&self, ids: &[ItemId]) -> EngineResult<SaleReceipt> {
        let SaleQuote { items, total_value } = self.quote(ids)?;
        let sold_ids: Vec<ItemId> = items.iter().map(|item| item.id.clone()).collect();

        self.supersede_pending();

        if let Err(e) = self.store.delete_items(&sold_ids).await {
            error!(error = %e, count = sold_ids.len(), "Failed to delete sold items");
            return Err(EngineError::SaleFailed(e.to_string()));
        }

        let balance = match self.ledger.settle_credit(total_value).await {
            Ok(balance) => balance,
            Err(e) => {
                error!(error = %e, total_value, "Failed to credit sale, restoring items");
                let records: Vec<ItemRecord> = items.iter().map(Item::to_record).collect();
                if let Err(restore) = self.store.add_items(&records).await {
                    error!(error = %restore, "Failed to restore sold items");
                }
                return Err(EngineError::SaleFailed(e.to_string()));
            },
        };

        self.inventory.remove(&sold_ids);

        let backup = SaleBackup {
            sale_id: Uuid::now_v7(),
            items,
            total_value,
        };
        let receipt = SaleReceipt {
            sale_id: backup.sale_id,
            item_count: backup.items.len(),
            total_value,
            balance,
            undo_window: self.undo_window,
        };
        self.open_undo_window(backup);

        info!(
            sale_id = %receipt.sale_id,
            items = receipt.item_count,
            total_value,
            balance,
            "Sale executed"
        );
        self.events.send(EngineEvent::SaleExecuted {
            sale_id: receipt.sale_id,
            item_count: receipt.item_count,
            total_value,
            balance,
        });

        Ok(receipt)
    }

    /// Reverse the pending sale.
    ///
    /// # Errors
    ///
    /// - `UndoUnavailable` if no sale is inside its window
    /// - `InsufficientBalance` if the credit was already spent; the undo
    ///   stays available
    /// - `UndoFailed` if persisting failed; the sale then stands
    pub async fn undo(&self) -> EngineResult<UndoReceipt> {
        let sale = self.take_undoable()?;
        let backup = sale.backup;

        match self.reinstate(&backup).await {
            Ok(balance) => {
                self.inventory.insert(backup.items.clone());
                self.close(backup.sale_id, SaleState::Reversed);

                let receipt = UndoReceipt {
                    sale_id: backup.sale_id,
                    item_count: backup.items.len(),
                    total_value: backup.total_value,
                    balance,
                };
                info!(sale_id = %receipt.sale_id, items = receipt.item_count, balance, "Sale undone");
                self.events.send(EngineEvent::SaleReversed {
                    sale_id: receipt.sale_id,
                    item_count: receipt.item_count,
                    total_value: receipt.total_value,
                    balance,
                });
                Ok(receipt)
            },
            Err(e) => {
                error!(sale_id = %backup.sale_id, error = %e, "Undo failed, sale stands");
                self.close(backup.sale_id, SaleState::Finalized);
                Err(EngineError::UndoFailed(e.to_string()))
            },
        }
    }

    /// Undo offer for the pending sale, if still inside its window
    pub fn undo_status(&self) -> Option<UndoStatus> {
        let now = self.scheduler.now();
        let slot = self.pending.lock();
        let sale = slot.as_ref()?;

        let remaining = sale.deadline.saturating_duration_since(now);
        let remaining_secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        if remaining_secs == 0 {
            return None;
        }

        Some(UndoStatus {
            sale_id: sale.backup.sale_id,
            item_count: sale.backup.items.len(),
            total_value: sale.backup.total_value,
            remaining_secs,
        })
    }

    /// Backup of the pending sale, until it finalizes or is undone
    pub fn backup(&self) -> Option<SaleBackup> {
        self.pending.lock().as_ref().map(|sale| sale.backup.clone())
    }

    /// Lifecycle state of a recent sale
    pub fn sale_state(&self, sale_id: Uuid) -> Option<SaleState> {
        if self
            .pending
            .lock()
            .as_ref()
            .is_some_and(|sale| sale.backup.sale_id == sale_id)
        {
            return Some(SaleState::ExecutedWithUndoWindow);
        }
        self.closed
            .lock()
            .iter()
            .rev()
            .find(|(id, _)| *id == sale_id)
            .map(|(_, state)| *state)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Persist the reversal: items back, then the debit. Compensates the
    /// first step if the second fails.
    async fn reinstate(&self, backup: &SaleBackup) -> Result<u64, LedgerError> {
        self.store.add_items(&backup.records()).await?;

        match self.ledger.settle_debit(backup.total_value).await {
            Ok(balance) => Ok(balance),
            Err(e) => {
                if let Err(cleanup) = self.store.delete_items(&backup.item_ids()).await {
                    error!(error = %cleanup, "Failed to remove re-added items after undo failure");
                }
                Err(e)
            },
        }
    }

    fn take_undoable(&self) -> EngineResult<PendingSale> {
        let now = self.scheduler.now();
        let mut slot = self.pending.lock();

        let (deadline, total_value) = match slot.as_ref() {
            Some(sale) => (sale.deadline, sale.backup.total_value),
            None => return Err(EngineError::UndoUnavailable),
        };
        if now >= deadline {
            // The timer will finalize it
            return Err(EngineError::UndoUnavailable);
        }

        let available = self.ledger.balance();
        if available < total_value {
            return Err(EngineError::InsufficientBalance {
                required: total_value,
                available,
            });
        }

        let sale = slot.take().ok_or(EngineError::UndoUnavailable)?;
        sale.timer.cancel();
        Ok(sale)
    }

    fn supersede_pending(&self) {
        let previous = self.pending.lock().take();
        if let Some(previous) = previous {
            self.retire(previous);
        }
    }

    fn retire(&self, previous: PendingSale) {
        previous.timer.cancel();
        let sale_id = previous.backup.sale_id;
        self.close(sale_id, SaleState::Finalized);
        debug!(%sale_id, "Undo window closed by a newer sale");
        self.events.send(EngineEvent::SaleSuperseded { sale_id });
    }

    fn open_undo_window(&self, backup: SaleBackup) {
        let sale_id = backup.sale_id;
        let item_count = backup.items.len();

        let pending = Arc::clone(&self.pending);
        let closed = Arc::clone(&self.closed);
        let events = Arc::clone(&self.events);

        let mut slot = self.pending.lock();
        let deadline = self.scheduler.now() + self.undo_window;
        let timer = self.scheduler.schedule(
            self.undo_window,
            Box::new(move || finalize(&pending, &closed, &events, sale_id, item_count)),
        );

        let replaced = slot.replace(PendingSale {
            backup,
            deadline,
            timer,
        });
        drop(slot);

        // A concurrent sale got in between supersede and here
        if let Some(previous) = replaced {
            warn!(sale_id = %previous.backup.sale_id, "Pending sale replaced concurrently");
            self.retire(previous);
        }
    }

    fn close(&self, sale_id: Uuid, state: SaleState) {
        record_closed(&self.closed, sale_id, state);
    }
}

fn record_closed(closed: &Mutex<VecDeque<(Uuid, SaleState)>>, sale_id: Uuid, state: SaleState) {
    let mut closed = closed.lock();
    if closed.len() == CLOSED_HISTORY {
        closed.pop_front();
    }
    closed.push_back((sale_id, state));
}

/// Timer body: clear the backup if it still belongs to `sale_id`.
fn finalize(
    pending: &Mutex<Option<PendingSale>>,
    closed: &Mutex<VecDeque<(Uuid, SaleState)>>,
    events: &EventBus,
    sale_id: Uuid,
    item_count: usize,
) {
    let finalized = {
        let mut slot = pending.lock();
        if slot.as_ref().is_some_and(|sale| sale.backup.sale_id == sale_id) {
            slot.take()
        } else {
            None
        }
    };

    if finalized.is_none() {
        debug!(%sale_id, "Finalize timer fired for a closed sale");
        return;
    }

    record_closed(closed, sale_id, SaleState::Finalized);
    info!(%sale_id, items = item_count, "Sale finalized");
    events.send(EngineEvent::SaleFinalized { sale_id, item_count });
    events.notify(Notice::success(format!("Sale of {} finalized.", items_label(item_count))));
}
