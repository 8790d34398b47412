//! Configuration management for the Inventory Alerting Engine
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with IAE_ prefix

use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Record store selection
    pub store: StoreConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Change-feed watcher behaviour
    pub watcher: WatcherConfig,

    /// FEFO defaults and scan schedule
    pub fefo: FefoConfig,

    /// Return → write-off cascade retry policy
    pub cascade: CascadeConfig,
}

/// Which record store backs the engine
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(min = 1))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Run embedded migrations at startup
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct WatcherConfig {
    /// First delay before resubscribing after a feed failure
    #[validate(range(min = 1))]
    pub retry_initial_ms: u64,

    /// Upper bound for the resubscribe delay
    #[validate(range(min = 1))]
    pub retry_max_ms: u64,

    /// Scan for unprocessed documents after every (re)subscription
    pub backlog_scan: bool,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct FefoConfig {
    /// Critical threshold used while `config/fefo` does not exist
    #[validate(range(min = 0))]
    pub default_critical_days: i64,

    /// Warning threshold used while `config/fefo` does not exist
    #[validate(range(min = 0))]
    pub default_warning_days: i64,

    /// Period of the full lot scan; 0 disables it
    pub scan_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct CascadeConfig {
    /// Attempts per delivery before the command is left for the backlog scan
    #[validate(range(min = 1, max = 20))]
    pub max_attempts: u32,

    /// First delay between attempts; doubles every retry
    #[validate(range(min = 1))]
    pub retry_initial_ms: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("IAE_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("store.backend", "postgres")?
            .set_default("database.url", "postgres://postgres@localhost:5432/inventory")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.run_migrations", environment == "development")?
            .set_default("watcher.retry_initial_ms", 500)?
            .set_default("watcher.retry_max_ms", 60_000)?
            .set_default("watcher.backlog_scan", true)?
            .set_default("fefo.default_critical_days", 7)?
            .set_default("fefo.default_warning_days", 30)?
            .set_default("fefo.scan_interval_secs", 3600)?
            .set_default("cascade.max_attempts", 5)?
            .set_default("cascade.retry_initial_ms", 200)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (IAE_ prefix)
            .add_source(
                Environment::with_prefix("IAE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    /// Range checks that the deserializer cannot express
    pub fn check(&self) -> Result<(), ConfigError> {
        let invalid = |e: validator::ValidationErrors| ConfigError::Message(e.to_string());

        self.database.validate().map_err(invalid)?;
        self.watcher.validate().map_err(invalid)?;
        self.fefo.validate().map_err(invalid)?;
        self.cascade.validate().map_err(invalid)?;

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Message(
                "database.min_connections exceeds database.max_connections".into(),
            ));
        }
        if self.watcher.retry_initial_ms > self.watcher.retry_max_ms {
            return Err(ConfigError::Message(
                "watcher.retry_initial_ms exceeds watcher.retry_max_ms".into(),
            ));
        }
        shared::validate_alert_config(&self.fefo.default_alert_config())
            .map_err(|e| ConfigError::Message(format!("fefo defaults: {}", e)))?;

        Ok(())
    }
}

impl WatcherConfig {
    pub fn retry_initial(&self) -> Duration {
        Duration::from_millis(self.retry_initial_ms)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }
}

impl FefoConfig {
    pub fn default_alert_config(&self) -> shared::AlertConfig {
        shared::AlertConfig::new(self.default_critical_days, self.default_warning_days)
    }

    pub fn scan_interval(&self) -> Option<Duration> {
        (self.scan_interval_secs > 0).then(|| Duration::from_secs(self.scan_interval_secs))
    }
}

impl CascadeConfig {
    pub fn retry_initial(&self) -> Duration {
        Duration::from_millis(self.retry_initial_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            store: StoreConfig::default(),
            database: DatabaseConfig::default(),
            watcher: WatcherConfig::default(),
            fefo: FefoConfig::default(),
            cascade: CascadeConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://postgres@localhost:5432/inventory".to_string(),
            max_connections: 10,
            min_connections: 2,
            run_migrations: true,
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            retry_initial_ms: 500,
            retry_max_ms: 60_000,
            backlog_scan: true,
        }
    }
}

impl Default for FefoConfig {
    fn default() -> Self {
        Self {
            default_critical_days: 7,
            default_warning_days: 30,
            scan_interval_secs: 3600,
        }
    }
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_initial_ms: 200,
        }
    }
}
