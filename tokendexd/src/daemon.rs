//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Record store (JSON file, or memory in the test environment)
//! - Engine (economy, generation, sales)
//! - Notice printer (event bus subscriber)
//! - Console session (stdin commands)
//!
//! # Lifecycle
//!
//! 1. Open the store
//! 2. Load and migrate the collection
//! 3. Run the console until `quit`, end of input or SIGINT
//! 4. Graceful shutdown

use std::sync::Arc;

use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tokendex_engine::{Engine, EventBus, GenerationGateway, StubGateway, TokioScheduler};
use tokendex_store::{JsonFileStore, MemoryStore, RecordStore};

use crate::config::{Config, Environment};
use crate::console::Console;
use crate::error::DaemonResult;
use crate::notifier::spawn_printer;

/// Buffered engine events before the printer lags
const EVENT_CAPACITY: usize = 256;

// =============================================================================
// Daemon
// =============================================================================

/// The Tokendex daemon.
pub struct Daemon {
    config: Config,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the daemon.
    ///
    /// Blocks until the console session ends or SIGINT is received.
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting Tokendex daemon"
        );

        let gateway = Arc::new(StubGateway::new());

        match self.config.environment {
            Environment::Test => {
                let store = MemoryStore::with_balance(self.config.store.starting_balance);
                self.serve(Arc::new(store), gateway).await
            },
            Environment::Development | Environment::Production => {
                let store = JsonFileStore::open(
                    &self.config.store.data_path,
                    self.config.store.starting_balance,
                )
                .await?;
                info!(path = %store.path().display(), "Data file ready");
                self.serve(Arc::new(store), gateway).await
            },
        }
    }

    async fn serve<S, G>(&self, store: Arc<S>, gateway: Arc<G>) -> DaemonResult<()>
    where
        S: RecordStore + 'static,
        G: GenerationGateway + 'static,
    {
        let events = Arc::new(EventBus::new(EVENT_CAPACITY));
        let shutdown = CancellationToken::new();
        let printer = spawn_printer(events.subscribe(), tokio::io::stdout(), shutdown.clone());

        let opened = Engine::open(
            store,
            gateway,
            Arc::new(TokioScheduler),
            Arc::clone(&events),
            self.config.engine.clone(),
        )
        .await;

        let result = match opened {
            Ok(engine) => self.session(Arc::new(engine)).await,
            Err(e) => Err(e.into()),
        };

        shutdown.cancel();
        if let Err(e) = printer.await {
            warn!(error = %e, "Notice printer panicked");
        }
        result
    }

    async fn session<S, G>(&self, engine: Arc<Engine<S, G>>) -> DaemonResult<()>
    where
        S: RecordStore + 'static,
        G: GenerationGateway + 'static,
    {
        let mut console = Console::new(Arc::clone(&engine));
        let stdin = BufReader::new(tokio::io::stdin());

        println!("Tokendex ready. Type 'help' for commands.");

        tokio::select! {
            result = console.run(stdin, tokio::io::stdout()) => result?,
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
            }
        }

        Self::shutdown(&engine);
        Ok(())
    }

    /// Graceful shutdown.
    fn shutdown<S: RecordStore, G: GenerationGateway>(engine: &Engine<S, G>) {
        info!("Initiating graceful shutdown");

        // Sales are persisted when executed; only the undo offer is lost
        if let Some(undo) = engine.undo_status() {
            info!(
                sale_id = %undo.sale_id,
                items = undo.item_count,
                "Pending sale becomes final"
            );
        }

        info!(
            balance = engine.balance(),
            items = engine.items().len(),
            "Shutdown complete"
        );
    }
}

// =============================================================================
// Tests
// =============================================================================
