//! Token balance ledger.
//!
//! Holds the in-memory balance and mirrors every change to the store.
//! Two styles of update exist:
//!
//! - `debit` / `credit`: apply in memory first, then persist. Used where
//!   the caller refunds on failure (single generation).
//! - `settle_debit` / `settle_credit`: persist first, then apply in memory.
//!   Used where a store failure must leave memory untouched (batch
//!   generation, sale, undo).
//!
//! Balance writes are serialized, and a debit larger than the balance is
//! refused rather than clamped.

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use tokendex_store::{RecordStore, StoreError, StoreResult};

/// Why a debit did not go through
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The balance no longer covers the debit
    #[error("balance of {available} tokens does not cover {required}")]
    Insufficient { required: u64, available: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct Ledger<S: RecordStore> {
    store: Arc<S>,
    balance: Mutex<u64>,
    /// Held from reading the balance until its new value is persisted
    writes: tokio::sync::Mutex<()>,
}

impl<S: RecordStore> Ledger<S> {
    pub fn new(store: Arc<S>, balance: u64) -> Self {
        Self {
            store,
            balance: Mutex::new(balance),
            writes: tokio::sync::Mutex::new(()),
        }
    }

    /// Read the persisted balance.
    pub async fn load(store: Arc<S>) -> StoreResult<Self> {
        let balance = store.get_balance().await?;
        Ok(Self::new(store, balance))
    }

    pub fn balance(&self) -> u64 {
        *self.balance.lock()
    }

    /// Subtract in memory, then persist the new value.
    ///
    /// On `LedgerError::Store` the in-memory balance stays debited; callers
    /// refund with `credit`. `LedgerError::Insufficient` changes nothing.
    pub async fn debit(&self, amount: u64) -> Result<u64, LedgerError> {
        let _writing = self.writes.lock().await;
        let next = {
            let mut balance = self.balance.lock();
            *balance = Self::subtract(*balance, amount)?;
            *balance
        };
        debug!(amount, balance = next, "Debit");
        self.store.set_balance(next).await?;
        Ok(next)
    }

    /// Add in memory, then persist the new value.
    pub async fn credit(&self, amount: u64) -> StoreResult<u64> {
        let _writing = self.writes.lock().await;
        let next = {
            let mut balance = self.balance.lock();
            *balance = balance.saturating_add(amount);
            *balance
        };
        debug!(amount, balance = next, "Credit");
        self.store.set_balance(next).await?;
        Ok(next)
    }

    /// Persist the debited value, then apply it in memory.
    ///
    /// On `Err` nothing changed.
    pub async fn settle_debit(&self, amount: u64) -> Result<u64, LedgerError> {
        let _writing = self.writes.lock().await;
        let next = Self::subtract(self.balance(), amount)?;
        self.store.set_balance(next).await?;
        *self.balance.lock() = next;
        debug!(amount, balance = next, "Debit settled");
        Ok(next)
    }

    /// Persist the credited value, then apply it in memory.
    ///
    /// On `Err` nothing changed.
    pub async fn settle_credit(&self, amount: u64) -> StoreResult<u64> {
        let _writing = self.writes.lock().await;
        let next = self.balance().saturating_add(amount);
        self.store.set_balance(next).await?;
        *self.balance.lock() = next;
        debug!(amount, balance = next, "Credit settled");
        Ok(next)
    }

    fn subtract(balance: u64, amount: u64) -> Result<u64, LedgerError> {
        balance.checked_sub(amount).ok_or_else(|| {
            warn!(balance, amount, "Debit exceeds balance, refused");
            LedgerError::Insufficient {
                required: amount,
                available: balance,
            }
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
