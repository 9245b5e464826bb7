//! Load-time repair of persisted records.
//!
//! Earlier versions of the game wrote fused items, fusion markers on their
//! parents, unpriced items and items flagged `resold` in place. On load the
//! collection is normalized:
//!
//! 1. fused records are deleted
//! 2. fusion markers are stripped from the remaining records
//! 3. unpriced (or out-of-range) owned records get the computed price
//! 4. legacy resold records are left in the store but kept out of the
//!    active collection
//!
//! Planning is pure; `apply` issues the writes. A clean collection plans no
//! writes, so running the migration twice is harmless.

use futures_util::future::join_all;
use thiserror::Error;
use tracing::{info, warn};

use tokendex_domain::{sort_newest_first, DomainError, Item, ItemId, ItemRecord};
use tokendex_store::{RecordStore, StoreError};

/// Migration failure
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Failed to read records: {0}")]
    Read(#[from] StoreError),

    #[error("Invalid record: {0}")]
    Invalid(#[from] DomainError),

    #[error("{failed} of {attempted} migration writes failed (first: {first})")]
    Writes {
        failed: usize,
        attempted: usize,
        first: StoreError,
    },
}

/// Counts of what a migration changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub deleted_fused: usize,
    pub cleaned: usize,
    pub repriced: usize,
    pub skipped_resold: usize,
    pub item_count: usize,
}

/// Writes needed to normalize a collection, plus the resulting items.
#[derive(Debug, Default)]
pub struct MigrationPlan {
    /// Fused records to delete
    pub fused: Vec<ItemId>,
    /// Records with fusion markers stripped
    pub cleaned: Vec<ItemRecord>,
    /// Records with a backfilled price
    pub repriced: Vec<ItemRecord>,
    /// Legacy resold records left untouched
    pub skipped_resold: usize,
    /// Active collection, newest first
    pub items: Vec<Item>,
}

impl MigrationPlan {
    /// Compute the writes for `records` without touching the store.
    pub fn plan(records: Vec<ItemRecord>) -> Result<Self, DomainError> {
        let mut plan = MigrationPlan::default();

        for record in records {
            if record.is_fused() {
                plan.fused.push(record.id);
                continue;
            }

            let mut record = record;
            if record.is_used_in_fusion() || record.parent_ids.is_some() {
                record = record.without_fusion_fields();
                plan.cleaned.push(record.clone());
            }

            if record.is_resold() {
                plan.skipped_resold += 1;
                continue;
            }

            if record.needs_price() {
                if let Some(price) = record.price {
                    warn!(id = %record.id, price, "Stored price out of range, recomputing");
                }
                record = record.with_computed_price();
                plan.repriced.push(record.clone());
            }

            plan.items.push(record.into_item()?);
        }

        sort_newest_first(&mut plan.items);
        Ok(plan)
    }

    /// Number of store calls `apply` will issue
    pub fn write_count(&self) -> usize {
        self.cleaned.len() + usize::from(!self.fused.is_empty()) + self.repriced.len()
    }

    pub fn is_noop(&self) -> bool {
        self.write_count() == 0
    }

    pub fn report(&self) -> MigrationReport {
        MigrationReport {
            deleted_fused: self.fused.len(),
            cleaned: self.cleaned.len(),
            repriced: self.repriced.len(),
            skipped_resold: self.skipped_resold,
            item_count: self.items.len(),
        }
    }

    /// Issue the planned writes.
    ///
    /// Each phase runs its writes concurrently; every write is attempted
    /// and failures are reported together.
    pub async fn apply<S: RecordStore + ?Sized>(&self, store: &S) -> Result<(), MigrationError> {
        let mut results: Vec<Result<(), StoreError>> = Vec::with_capacity(self.write_count());

        results.extend(join_all(self.cleaned.iter().map(|r| store.update_item(r))).await);

        if !self.fused.is_empty() {
            results.push(store.delete_items(&self.fused).await);
        }

        results.extend(join_all(self.repriced.iter().map(|r| store.update_item(r))).await);

        let attempted = results.len();
        let mut errors = results.into_iter().filter_map(Result::err);
        match errors.next() {
            None => Ok(()),
            Some(first) => Err(MigrationError::Writes {
                failed: 1 + errors.count(),
                attempted,
                first,
            }),
        }
    }
}

/// Read, plan and apply. Returns the active collection.
pub async fn migrate<S: RecordStore + ?Sized>(
    store: &S,
) -> Result<(Vec<Item>, MigrationReport), MigrationError> {
    let records = store.get_all_items().await?;
    let plan = MigrationPlan::plan(records)?;
    let report = plan.report();

    if plan.is_noop() {
        info!(items = report.item_count, "Collection loaded");
    } else {
        plan.apply(store).await?;
        info!(
            items = report.item_count,
            deleted_fused = report.deleted_fused,
            cleaned = report.cleaned,
            repriced = report.repriced,
            "Collection migrated"
        );
    }
    if report.skipped_resold > 0 {
        info!(count = report.skipped_resold, "Legacy resold records ignored");
    }

    Ok((plan.items, report))
}

// =============================================================================
// Tests
// =============================================================================
