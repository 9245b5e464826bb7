//! Integration tests for single and batch generation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokendex_domain::{Item, RarityTier};
use tokendex_engine::{
    Engine, EngineConfig, EngineError, EngineEvent, EventBus, GatewayError, GenerationGateway,
    ManualScheduler, NoticeLevel, StubGateway,
};
use tokendex_store::{MemoryStore, StoreOp};

async fn open_with<G: GenerationGateway>(
    store: &Arc<MemoryStore>,
    gateway: Arc<G>,
    config: EngineConfig,
) -> Engine<MemoryStore, G> {
    Engine::open(
        Arc::clone(store),
        gateway,
        Arc::new(ManualScheduler::new()),
        Arc::new(EventBus::default()),
        config,
    )
    .await
    .unwrap()
}

async fn open(balance: u64) -> (Arc<MemoryStore>, Arc<StubGateway>, Engine<MemoryStore, StubGateway>) {
    let store = Arc::new(MemoryStore::with_balance(balance));
    let gateway = Arc::new(StubGateway::new());
    let engine = open_with(&store, Arc::clone(&gateway), EngineConfig::default()).await;
    (store, gateway, engine)
}

#[tokio::test]
async fn test_generate_one_charges_and_stores() {
    let (store, gateway, engine) = open(100).await;
    let scripted = Item::new("Thornclaw", RarityTier::C, "img");
    gateway.script([scripted.clone()]);

    let receipt = engine.generate_one().await.unwrap();

    assert_eq!(receipt.cost, 10);
    assert_eq!(receipt.balance, 90);
    assert_eq!(receipt.items, vec![scripted.clone()]);
    assert!(receipt.showcase.is_none());
    assert_eq!(engine.balance(), 90);
    assert_eq!(store.balance(), 90);
    assert_eq!(engine.items(), vec![scripted.clone()]);
    assert!(store.contains(&scripted.id));
}

#[tokio::test]
async fn test_generate_one_gateway_failure_refunds() {
    let (store, gateway, engine) = open(50).await;
    gateway.set_fail_next(true);

    let err = engine.generate_one().await.unwrap_err();

    assert!(matches!(err, EngineError::GenerationRefunded { .. }));
    assert!(err.to_string().contains("Tokens refunded."));
    assert_eq!(engine.balance(), 50);
    assert_eq!(store.balance(), 50);
    assert!(engine.items().is_empty());
    assert_eq!(store.item_count(), 0);
}

#[tokio::test]
async fn test_generate_one_store_failure_refunds() {
    let (store, _gateway, engine) = open(50).await;
    store.fail_next(StoreOp::AddItem);

    let err = engine.generate_one().await.unwrap_err();

    assert!(matches!(err, EngineError::GenerationRefunded { .. }));
    assert_eq!(engine.balance(), 50);
    assert_eq!(store.balance(), 50);
    assert!(engine.items().is_empty());
}

#[tokio::test]
async fn test_generate_one_debit_failure_is_not_charged() {
    let (store, gateway, engine) = open(50).await;
    store.fail_next(StoreOp::SetBalance);

    let err = engine.generate_one().await.unwrap_err();

    assert!(matches!(err, EngineError::GenerationNotCharged { .. }));
    assert_eq!(engine.balance(), 50);
    assert_eq!(store.balance(), 50);
    assert_eq!(gateway.call_count(), 0);
}

/// Gateway that fails and breaks balance writes from then on.
struct BalanceBreakingGateway {
    store: Arc<MemoryStore>,
}

#[async_trait]
impl GenerationGateway for BalanceBreakingGateway {
    async fn generate_one(&self) -> Result<Item, GatewayError> {
        self.store.fail_always(StoreOp::SetBalance);
        Err(GatewayError::Unavailable("offline".to_string()))
    }

    async fn generate_batch(&self, _count: usize) -> Result<Vec<Item>, GatewayError> {
        self.generate_one().await.map(|item| vec![item])
    }
}

#[tokio::test]
async fn test_generate_one_refund_failure_is_reported() {
    let store = Arc::new(MemoryStore::with_balance(50));
    let gateway = Arc::new(BalanceBreakingGateway {
        store: Arc::clone(&store),
    });
    let engine = open_with(&store, gateway, EngineConfig::default()).await;

    let err = engine.generate_one().await.unwrap_err();

    assert!(matches!(err, EngineError::RefundFailed { .. }));
    // The debit is durable, the refund only happened in memory
    assert_eq!(store.balance(), 40);
    assert_eq!(engine.balance(), 50);
}

#[tokio::test]
async fn test_generate_one_insufficient_balance() {
    let (store, gateway, engine) = open(9).await;
    store.reset_write_count();

    match engine.generate_one().await {
        Err(EngineError::InsufficientBalance { required, available }) => {
            assert_eq!(required, 10);
            assert_eq!(available, 9);
        },
        other => panic!("Expected InsufficientBalance, got {:?}", other),
    }
    assert_eq!(store.write_count(), 0);
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn test_generate_batch_success() {
    let (store, gateway, engine) = open(100).await;
    gateway.script([
        Item::new("a", RarityTier::F, ""),
        Item::new("b", RarityTier::S, ""),
        Item::new("c", RarityTier::SPlus, ""),
        Item::new("d", RarityTier::A, ""),
    ]);

    let receipt = engine.generate_batch().await.unwrap();

    assert_eq!(receipt.items.len(), 4);
    assert_eq!(receipt.cost, 40);
    assert_eq!(receipt.balance, 60);
    assert_eq!(receipt.showcase.map(|item| item.name), Some("c".to_string()));
    assert_eq!(store.balance(), 60);
    assert_eq!(store.item_count(), 4);
    assert_eq!(engine.items().len(), 4);
}

#[tokio::test]
async fn test_generate_batch_gateway_failure_leaves_state() {
    let (store, gateway, engine) = open(100).await;
    gateway.set_fail_next(true);
    store.reset_write_count();

    let err = engine.generate_batch().await.unwrap_err();

    assert!(matches!(err, EngineError::GenerationNotCharged { what: "batch", .. }));
    assert!(err.to_string().contains("No tokens were deducted."));
    assert_eq!(engine.balance(), 100);
    assert_eq!(store.write_count(), 0);
    assert!(engine.items().is_empty());
}

#[tokio::test]
async fn test_generate_batch_persist_failure_leaves_state() {
    let (store, _gateway, engine) = open(100).await;
    store.fail_next(StoreOp::AddItems);

    let err = engine.generate_batch().await.unwrap_err();

    assert!(matches!(err, EngineError::GenerationNotCharged { .. }));
    assert_eq!(engine.balance(), 100);
    assert_eq!(store.balance(), 100);
    assert_eq!(store.item_count(), 0);
    assert!(engine.items().is_empty());
}

#[tokio::test]
async fn test_generate_batch_debit_failure_removes_items() {
    let (store, _gateway, engine) = open(100).await;
    store.fail_next(StoreOp::SetBalance);

    let err = engine.generate_batch().await.unwrap_err();

    assert!(matches!(err, EngineError::GenerationNotCharged { .. }));
    assert_eq!(engine.balance(), 100);
    assert_eq!(store.balance(), 100);
    assert_eq!(store.item_count(), 0);
    assert!(engine.items().is_empty());
}

#[tokio::test]
async fn test_generate_batch_needs_full_cost() {
    let (_store, gateway, engine) = open(39).await;

    assert!(matches!(
        engine.generate_batch().await,
        Err(EngineError::InsufficientBalance { required: 40, available: 39 })
    ));
    assert_eq!(gateway.call_count(), 0);
}

/// Gateway that yields once before answering, so concurrent calls interleave.
struct YieldingGateway;

#[async_trait]
impl GenerationGateway for YieldingGateway {
    async fn generate_one(&self) -> Result<Item, GatewayError> {
        tokio::task::yield_now().await;
        Ok(Item::new("one", RarityTier::D, ""))
    }

    async fn generate_batch(&self, count: usize) -> Result<Vec<Item>, GatewayError> {
        tokio::task::yield_now().await;
        Ok((0..count).map(|_| Item::new("squad", RarityTier::D, "")).collect())
    }
}

#[tokio::test]
async fn test_concurrent_batches_charge_once_per_batch() {
    let store = Arc::new(MemoryStore::with_balance(40));
    let engine = open_with(&store, Arc::new(YieldingGateway), EngineConfig::default()).await;

    let (a, b) = tokio::join!(engine.generate_batch(), engine.generate_batch());

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let refused = if a.is_err() { a } else { b };
    assert!(matches!(refused, Err(EngineError::GenerationNotCharged { what: "batch", .. })));

    assert_eq!(engine.balance(), 0);
    assert_eq!(store.balance(), 0);
    assert_eq!(engine.items().len(), 4);
    assert_eq!(store.item_count(), 4);
}

#[tokio::test]
async fn test_concurrent_single_generations_cannot_overdraw() {
    let store = Arc::new(MemoryStore::with_balance(10));
    let engine = open_with(&store, Arc::new(YieldingGateway), EngineConfig::default()).await;

    let (a, b) = tokio::join!(engine.generate_one(), engine.generate_one());

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let refused = if a.is_err() { a } else { b };
    assert!(matches!(
        refused,
        Err(EngineError::InsufficientBalance { required: 10, available: 0 })
    ));
    assert_eq!(engine.balance(), 0);
    assert_eq!(store.balance(), 0);
    assert_eq!(store.item_count(), 1);
}

/// Gateway that returns fewer items than asked for.
struct ShortGateway;

#[async_trait]
impl GenerationGateway for ShortGateway {
    async fn generate_one(&self) -> Result<Item, GatewayError> {
        Ok(Item::new("one", RarityTier::E, ""))
    }

    async fn generate_batch(&self, count: usize) -> Result<Vec<Item>, GatewayError> {
        Ok((1..count).map(|_| Item::new("short", RarityTier::E, "")).collect())
    }
}

#[tokio::test]
async fn test_generate_batch_short_result_is_failure() {
    let store = Arc::new(MemoryStore::with_balance(100));
    let engine = open_with(&store, Arc::new(ShortGateway), EngineConfig::default()).await;

    let err = engine.generate_batch().await.unwrap_err();

    assert!(matches!(err, EngineError::GenerationNotCharged { .. }));
    assert_eq!(engine.balance(), 100);
    assert_eq!(store.item_count(), 0);
}

/// Gateway that never answers.
struct HangingGateway;

#[async_trait]
impl GenerationGateway for HangingGateway {
    async fn generate_one(&self) -> Result<Item, GatewayError> {
        std::future::pending().await
    }

    async fn generate_batch(&self, _count: usize) -> Result<Vec<Item>, GatewayError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn test_gateway_timeout_refunds() {
    let store = Arc::new(MemoryStore::with_balance(100));
    let config = EngineConfig {
        gateway_timeout: Duration::from_secs(5),
        ..EngineConfig::default()
    };
    let engine = open_with(&store, Arc::new(HangingGateway), config).await;

    let err = engine.generate_one().await.unwrap_err();
    assert!(matches!(err, EngineError::GenerationRefunded { .. }));
    assert!(err.to_string().contains("timed out"));
    assert_eq!(engine.balance(), 100);
    assert_eq!(store.balance(), 100);
}

#[tokio::test]
async fn test_generated_item_with_bad_price_is_repriced() {
    let (_store, gateway, engine) = open(100).await;
    gateway.script([Item::new("glitch", RarityTier::B, "").with_price(3)]);

    let receipt = engine.generate_one().await.unwrap();
    assert_eq!(receipt.items[0].price, 125);
}

#[tokio::test]
async fn test_generation_notices() {
    let store = Arc::new(MemoryStore::with_balance(10));
    let gateway = Arc::new(StubGateway::new());
    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe();
    let engine = Engine::open(
        Arc::clone(&store),
        Arc::clone(&gateway),
        Arc::new(ManualScheduler::new()),
        bus,
        EngineConfig::default(),
    )
    .await
    .unwrap();

    gateway.script([Item::new("Pyromite", RarityTier::S, "")]);
    let receipt = engine.generate_one().await.unwrap();
    assert!(receipt.showcase.is_some());
    engine.generate_one().await.unwrap_err();

    let drained = events.drain();
    assert!(matches!(drained[0], EngineEvent::Loaded { item_count: 0, balance: 10 }));
    let notices: Vec<_> = drained
        .iter()
        .filter_map(|e| match e {
            EngineEvent::Notice(n) => Some(n.clone()),
            _ => None,
        })
        .collect();

    assert_eq!(notices.len(), 2);
    assert_eq!(notices[0].level, NoticeLevel::Success);
    assert_eq!(notices[0].message, "Awesome! You generated a new item: Pyromite (S)!");
    assert_eq!(notices[1].level, NoticeLevel::Warning);
}
