//! Tokendex Daemon
//!
//! Console host for the collection engine.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration
//! cargo run -p tokendexd
//!
//! # Throwaway in-memory session
//! TOKENDEX_ENV=test cargo run -p tokendexd
//! ```
//!
//! # Environment Variables
//!
//! - `TOKENDEX_ENV`: Environment (test, development, production)
//! - `TOKENDEX_DATA_PATH`: JSON data file (default: tokendex.json)
//! - `TOKENDEX_STARTING_BALANCE`: Balance of a new collection (default: 100)
//! - `TOKENDEX_GENERATION_COST`: Tokens per generated item (default: 10)
//! - `TOKENDEX_BATCH_SIZE`: Items per batch (default: 4)
//! - `TOKENDEX_UNDO_WINDOW_SECS`: Undo window after a sale (default: 10)
//! - `TOKENDEX_GATEWAY_TIMEOUT_SECS`: Generator call timeout (default: 60)

use tokendexd::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the console
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("tokendexd=info".parse()?))
        .init();

    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        data_path = %config.store.data_path.display(),
        "Tokendex Daemon"
    );

    Daemon::new(config).run().await?;

    Ok(())
}
