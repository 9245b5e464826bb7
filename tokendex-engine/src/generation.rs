//! Paid generation of new items.
//!
//! Single generation charges up front and refunds on failure. Batch
//! generation persists the items first and charges last, so a failure
//! never needs a refund.

use serde::Serialize;
use std::future::Future;
use tracing::{error, info, warn};

use tokendex_domain::{Item, ItemId, ItemRecord};
use tokendex_store::RecordStore;

use crate::engine::Engine;
use crate::error::{EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::ledger::LedgerError;
use crate::ports::{GatewayError, GenerationGateway};

/// Result of a successful generation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationReceipt {
    pub items: Vec<Item>,
    pub cost: u64,
    pub balance: u64,
    /// Highest-tier item when it deserves a reveal (S or S+)
    pub showcase: Option<Item>,
}

impl GenerationReceipt {
    fn new(items: Vec<Item>, cost: u64, balance: u64) -> Self {
        let showcase = items
            .iter()
            .filter_map(|item| item.tier().map(|tier| (tier, item)))
            .filter(|(tier, _)| tier.is_showcase())
            .max_by_key(|(tier, _)| *tier)
            .map(|(_, item)| item.clone());

        Self {
            items,
            cost,
            balance,
            showcase,
        }
    }
}

impl<S: RecordStore, G: GenerationGateway> Engine<S, G> {
    /// Generate one item for `generation_cost` tokens.
    pub async fn generate_one(&self) -> EngineResult<GenerationReceipt> {
        let result = self.try_generate_one().await;
        self.report(result, |receipt| match receipt.items.first() {
            Some(item) => format!("Awesome! You generated a new item: {} ({})!", item.name, item.rarity),
            None => "Awesome! You generated a new item!".to_string(),
        })
    }

    /// Generate `batch_size` items for `batch_cost` tokens.
    pub async fn generate_batch(&self) -> EngineResult<GenerationReceipt> {
        let result = self.try_generate_batch().await;
        self.report(result, |receipt| {
            format!("Awesome! You generated a new squad of {} items!", receipt.items.len())
        })
    }

    async fn try_generate_one(&self) -> EngineResult<GenerationReceipt> {
        let cost = self.config.generation_cost;
        self.require_balance(cost)?;

        match self.ledger.debit(cost).await {
            Ok(_) => {},
            // Spent by a concurrent operation since the check above
            Err(LedgerError::Insufficient { required, available }) => {
                return Err(EngineError::InsufficientBalance { required, available });
            },
            Err(LedgerError::Store(e)) => {
                warn!(error = %e, cost, "Failed to persist debit, reverting");
                if let Err(refund) = self.ledger.credit(cost).await {
                    error!(error = %refund, cost, "Failed to persist reverted debit");
                }
                return Err(EngineError::GenerationNotCharged {
                    what: "item",
                    reason: e.to_string(),
                });
            },
        }

        let item = match self.fetch_and_store_one().await {
            Ok(item) => item,
            Err(e) => {
                let reason = e.to_string();
                warn!(error = %reason, cost, "Generation failed after debit, refunding");
                return match self.ledger.credit(cost).await {
                    Ok(balance) => {
                        info!(cost, balance, "Tokens refunded");
                        Err(EngineError::GenerationRefunded { reason })
                    },
                    Err(refund) => {
                        error!(error = %refund, cost, "Refund could not be persisted");
                        Err(EngineError::RefundFailed {
                            reason,
                            refund_error: refund.to_string(),
                        })
                    },
                };
            },
        };

        self.inventory.insert(vec![item.clone()]);
        let balance = self.ledger.balance();

        info!(id = %item.id, rarity = %item.rarity, price = item.price, balance, "Item generated");
        self.events.send(EngineEvent::Generated {
            items: vec![item.id.clone()],
            cost,
            balance,
        });

        Ok(GenerationReceipt::new(vec![item], cost, balance))
    }

    async fn fetch_and_store_one(&self) -> EngineResult<Item> {
        let mut item = self.call_gateway(self.gateway.generate_one()).await?;
        Self::normalize(&mut item);
        self.store.add_item(&item.to_record()).await?;
        Ok(item)
    }

    async fn try_generate_batch(&self) -> EngineResult<GenerationReceipt> {
        let count = self.config.batch_size;
        let cost = self.config.batch_cost();
        self.require_balance(cost)?;

        let not_charged = |reason: String| EngineError::GenerationNotCharged {
            what: "batch",
            reason,
        };

        let mut items = match self.call_gateway(self.gateway.generate_batch(count)).await {
            Ok(items) if items.len() == count => items,
            Ok(items) => {
                warn!(expected = count, received = items.len(), "Gateway returned a short batch");
                return Err(not_charged(format!(
                    "expected {} items, received {}",
                    count,
                    items.len()
                )));
            },
            Err(e) => {
                warn!(error = %e, "Batch generation failed");
                return Err(not_charged(e.to_string()));
            },
        };
        items.iter_mut().for_each(Self::normalize);

        let records: Vec<ItemRecord> = items.iter().map(Item::to_record).collect();
        let ids: Vec<ItemId> = items.iter().map(|item| item.id.clone()).collect();

        if let Err(e) = self.store.add_items(&records).await {
            warn!(error = %e, "Failed to persist batch");
            self.discard_batch(&ids).await;
            return Err(not_charged(e.to_string()));
        }

        let balance = match self.ledger.settle_debit(cost).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(error = %e, "Failed to persist batch debit");
                self.discard_batch(&ids).await;
                return Err(not_charged(e.to_string()));
            },
        };

        self.inventory.insert(items.clone());

        info!(count, cost, balance, "Batch generated");
        self.events.send(EngineEvent::Generated {
            items: ids,
            cost,
            balance,
        });

        Ok(GenerationReceipt::new(items, cost, balance))
    }

    /// Best-effort removal of batch records that were never paid for.
    async fn discard_batch(&self, ids: &[ItemId]) {
        if let Err(e) = self.store.delete_items(ids).await {
            error!(error = %e, count = ids.len(), "Failed to remove unpaid batch items");
        }
    }

    fn require_balance(&self, required: u64) -> EngineResult<()> {
        let available = self.ledger.balance();
        if available < required {
            return Err(EngineError::InsufficientBalance { required, available });
        }
        Ok(())
    }

    async fn call_gateway<T, F>(&self, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        let limit = self.config.gateway_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(limit)),
        }
    }

    fn normalize(item: &mut Item) {
        if item.normalize_price() {
            warn!(id = %item.id, rarity = %item.rarity, price = item.price, "Generated item repriced");
        }
    }
}
