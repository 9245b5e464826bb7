//! Daemon configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{DaemonError, DaemonResult};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokendex_engine::{EngineConfig, BATCH_SIZE, GATEWAY_TIMEOUT_SECS, GENERATION_COST, UNDO_WINDOW_SECS};

/// Balance of a brand-new collection
pub const DEFAULT_STARTING_BALANCE: u64 = 100;

/// Data file used when `TOKENDEX_DATA_PATH` is unset
pub const DEFAULT_DATA_PATH: &str = "tokendex.json";

// =============================================================================
// Configuration
// =============================================================================

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage configuration
    pub store: StoreConfig,

    /// Engine configuration
    pub engine: EngineConfig,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// JSON data file
    pub data_path: PathBuf,
    /// Balance written for a fresh data file
    pub starting_balance: u64,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (in-memory store, nothing written to disk)
    Test,
    /// Development environment
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> DaemonResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> DaemonResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = Self::load_environment(&lookup)?;
        let store = Self::load_store_config(&lookup)?;
        let engine = Self::load_engine_config(&lookup)?;

        Ok(Self {
            store,
            engine,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            store: StoreConfig {
                data_path: env::temp_dir().join(DEFAULT_DATA_PATH),
                starting_balance: DEFAULT_STARTING_BALANCE,
            },
            engine: EngineConfig::default(),
            environment: Environment::Test,
        }
    }

    fn load_environment(lookup: &impl Fn(&str) -> Option<String>) -> DaemonResult<Environment> {
        let env_str = lookup("TOKENDEX_ENV").unwrap_or_else(|| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(DaemonError::Config(format!(
                "Invalid TOKENDEX_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_store_config(lookup: &impl Fn(&str) -> Option<String>) -> DaemonResult<StoreConfig> {
        let data_path = lookup("TOKENDEX_DATA_PATH")
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_PATH.to_string());

        let starting_balance =
            Self::load_number(lookup, "TOKENDEX_STARTING_BALANCE", DEFAULT_STARTING_BALANCE)?;

        Ok(StoreConfig {
            data_path: PathBuf::from(data_path),
            starting_balance,
        })
    }

    fn load_engine_config(lookup: &impl Fn(&str) -> Option<String>) -> DaemonResult<EngineConfig> {
        let generation_cost = Self::load_number(lookup, "TOKENDEX_GENERATION_COST", GENERATION_COST)?;
        let batch_size: usize = Self::load_number(lookup, "TOKENDEX_BATCH_SIZE", BATCH_SIZE)?;
        let undo_window_secs: u64 =
            Self::load_number(lookup, "TOKENDEX_UNDO_WINDOW_SECS", UNDO_WINDOW_SECS)?;
        let gateway_timeout_secs: u64 =
            Self::load_number(lookup, "TOKENDEX_GATEWAY_TIMEOUT_SECS", GATEWAY_TIMEOUT_SECS)?;

        if batch_size == 0 {
            return Err(DaemonError::Config("TOKENDEX_BATCH_SIZE must be at least 1".to_string()));
        }
        if undo_window_secs == 0 {
            return Err(DaemonError::Config(
                "TOKENDEX_UNDO_WINDOW_SECS must be at least 1".to_string(),
            ));
        }

        Ok(EngineConfig {
            generation_cost,
            batch_size,
            undo_window: Duration::from_secs(undo_window_secs),
            gateway_timeout: Duration::from_secs(gateway_timeout_secs),
        })
    }

    fn load_number<T: FromStr>(
        lookup: &impl Fn(&str) -> Option<String>,
        key: &str,
        default: T,
    ) -> DaemonResult<T> {
        match lookup(key) {
            Some(val) => val
                .trim()
                .parse()
                .map_err(|_| DaemonError::Config(format!("Invalid {} value: {}", key, val))),
            None => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                data_path: PathBuf::from(DEFAULT_DATA_PATH),
                starting_balance: DEFAULT_STARTING_BALANCE,
            },
            engine: EngineConfig::default(),
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
