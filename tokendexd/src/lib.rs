//! Tokendex Daemon Library
//!
//! Runtime host for the Tokendex collection engine.
//!
//! # Architecture
//!
//! ```text
//! stdin → Console → Engine → RecordStore (JSON file)
//!                     ↓
//!                 Event Bus → Notice printer → stdout
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main runtime orchestrator
//! - **Console**: Line-oriented command session
//! - **Notifier**: Prints engine notices
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use tokendexd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     Daemon::new(config).run().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod command;
pub mod config;
pub mod console;
pub mod daemon;
pub mod error;
pub mod notifier;

// Re-exports for convenience
pub use command::Command;
pub use config::{Config, Environment, StoreConfig};
pub use console::Console;
pub use daemon::Daemon;
pub use error::{DaemonError, DaemonResult};
pub use notifier::{format_event, spawn_printer};
