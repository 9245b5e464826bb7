//! Stub implementations for testing.
//!
//! These implementations simulate the generation service without making
//! remote calls. Items are rolled locally unless a test scripts them.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use tokendex_domain::{Item, RarityTier};

use crate::ports::{GatewayError, GenerationGateway};

// =============================================================================
// Stub Gateway
// =============================================================================

/// Roll weights per tier, lowest tier first
const TIER_WEIGHTS: [u32; 8] = [30, 22, 18, 12, 9, 5, 3, 1];

const NAME_HEADS: [&str; 8] = ["Pyro", "Aqua", "Terra", "Volt", "Frost", "Shade", "Glim", "Thorn"];
const NAME_TAILS: [&str; 8] = ["mite", "kin", "saur", "ling", "wisp", "fang", "puff", "claw"];

/// Stub generation gateway for testing.
///
/// Returns scripted items first, then random rolls.
pub struct StubGateway {
    /// Items returned before any random roll
    scripted: Mutex<VecDeque<Item>>,
    /// Whether to simulate a failure on the next call
    fail_next: RwLock<bool>,
    /// Number of successful calls
    calls: AtomicU64,
}

impl StubGateway {
    /// Create a new stub gateway.
    pub fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fail_next: RwLock::new(false),
            calls: AtomicU64::new(0),
        }
    }

    /// Queue items to be returned, in order, before random rolls.
    pub fn script(&self, items: impl IntoIterator<Item = Item>) {
        self.scripted.lock().extend(items);
    }

    /// Configure the next call to fail.
    pub fn set_fail_next(&self, fail: bool) {
        *self.fail_next.write() = fail;
    }

    /// Number of calls that returned items
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Check if we should fail the next operation.
    fn should_fail(&self) -> bool {
        let mut fail_next = self.fail_next.write();
        let fail = *fail_next;
        *fail_next = false;
        fail
    }

    fn next_item(&self) -> Item {
        self.scripted.lock().pop_front().unwrap_or_else(roll_item)
    }
}

impl Default for StubGateway {
    fn default() -> Self {
        Self::new()
    }
}

/// Roll a random item with a weighted tier.
fn roll_item() -> Item {
    let mut rng = rand::thread_rng();

    let tier = WeightedIndex::new(TIER_WEIGHTS)
        .map(|dist| RarityTier::ALL[dist.sample(&mut rng)])
        .unwrap_or(RarityTier::F);

    let head = NAME_HEADS.choose(&mut rng).copied().unwrap_or("Pyro");
    let tail = NAME_TAILS.choose(&mut rng).copied().unwrap_or("mite");
    let serial: u16 = rng.gen_range(1..1000);

    Item::new(format!("{}{} #{:03}", head, tail, serial), tier, "")
}

#[async_trait]
impl GenerationGateway for StubGateway {
    async fn generate_one(&self) -> Result<Item, GatewayError> {
        if self.should_fail() {
            return Err(GatewayError::Unavailable("Simulated generation failure".to_string()));
        }

        let item = self.next_item();
        self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(id = %item.id, rarity = %item.rarity, "Stub: item generated");
        Ok(item)
    }

    async fn generate_batch(&self, count: usize) -> Result<Vec<Item>, GatewayError> {
        if self.should_fail() {
            return Err(GatewayError::Unavailable(
                "Simulated batch generation failure".to_string(),
            ));
        }

        let items: Vec<Item> = (0..count).map(|_| self.next_item()).collect();
        self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(count, "Stub: batch generated");
        Ok(items)
    }
}

// =============================================================================
// Tests
// =============================================================================
