//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml`, then overridden by `LEDGER__*` environment
//! variables (e.g. `LEDGER__ENGINE__MAX_PAGE_SIZE=30`).
//!
//! ```toml
//! [app]
//! level = "info"
//!
//! [database]
//! sqlite = "ledger.db"   # or: database = "memory"
//!
//! [engine]
//! default_page_size = 20
//! max_page_size = 50
//! ```
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, builder::DefaultState, ConfigBuilder};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct App {
    pub level: String,
}

impl Default for App {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Self::Sqlite("ledger.db".to_string())
    }
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Self::Memory => String::from("sqlite::memory:"),
            Self::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub default_page_size: u64,
    pub max_page_size: u64,
    pub page_ttl_secs: u64,
    pub balance_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub deleted_default_limit: u64,
    pub deleted_max_limit: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let config = engine::EngineConfig::default();
        Self {
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
            page_ttl_secs: config.page_ttl.as_secs(),
            balance_ttl_secs: config.balance_ttl.as_secs(),
            sweep_interval_secs: 5 * 60,
            deleted_default_limit: config.deleted_default_limit,
            deleted_max_limit: config.deleted_max_limit,
        }
    }
}

impl EngineSettings {
    pub fn engine_config(&self) -> engine::EngineConfig {
        engine::EngineConfig {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
            page_ttl: Duration::from_secs(self.page_ttl_secs),
            balance_ttl: Duration::from_secs(self.balance_ttl_secs),
            deleted_default_limit: self.deleted_default_limit,
            deleted_max_limit: self.deleted_max_limit,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub engine: EngineSettings,
}

impl Settings {
    /// Loads `path` (extension optional, may be missing) and the environment.
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        Self::build(Config::builder().add_source(File::with_name(path).required(false)))
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        builder
            .add_source(
                Environment::with_prefix("LEDGER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
