//! # Engine Configuration
//!
//! Configuration management for the reconciliation engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_DB_PATH=/var/lib/tally/tally.db                              │
//! │     TALLY_TENANT_ID=3                                                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally/tally.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.tally.ledger/tally.toml (macOS)  │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     ./tally.db, tenant 1, 5 minute cache TTL                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # tally.toml
//! [store]
//! database_path = "/var/lib/tally/tally.db"
//! max_connections = 5
//!
//! [scope]
//! tenant_id = 1
//! branch_id = 7   # optional
//!
//! [cache]
//! ttl_secs = 300
//!
//! [reversal]
//! currency_symbol = "€"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tally_core::partial::DEFAULT_CURRENCY_SYMBOL;
use tally_core::{Scope, DEFAULT_CACHE_TTL_SECS};
use tally_db::DbConfig;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Store Settings
// =============================================================================

/// Where the ledger lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./tally.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            database_path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Scope Settings
// =============================================================================

/// Tenant and optional branch the engine operates on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeSettings {
    #[serde(default = "default_tenant_id")]
    pub tenant_id: i64,

    #[serde(default)]
    pub branch_id: Option<i64>,
}

fn default_tenant_id() -> i64 {
    1
}

impl Default for ScopeSettings {
    fn default() -> Self {
        ScopeSettings {
            tenant_id: default_tenant_id(),
            branch_id: None,
        }
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

/// Derived-summary cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Maximum age of a cached summary, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            ttl_secs: default_ttl_secs(),
        }
    }
}

// =============================================================================
// Reversal Settings
// =============================================================================

/// Settings for annotations written by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversalSettings {
    /// Currency symbol used when encoding partial-payment annotations.
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

fn default_currency_symbol() -> String {
    DEFAULT_CURRENCY_SYMBOL.to_string()
}

impl Default for ReversalSettings {
    fn default() -> Self {
        ReversalSettings {
            currency_symbol: default_currency_symbol(),
        }
    }
}

// =============================================================================
// Main Engine Configuration
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub scope: ScopeSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub reversal: ReversalSettings,
}

impl EngineConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (tally.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> EngineResult<Self> {
        let explicit = config_path.is_some();
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else if explicit {
                return Err(EngineError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses configuration from TOML text, then validates it.
    pub fn from_toml_str(contents: &str) -> EngineResult<Self> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> EngineResult<()> {
        if self.store.database_path.as_os_str().is_empty() {
            return Err(EngineError::Config("store.database_path must not be empty".into()));
        }

        if self.store.max_connections == 0 {
            return Err(EngineError::Config(
                "store.max_connections must be greater than 0".into(),
            ));
        }

        if self.scope.tenant_id <= 0 {
            return Err(EngineError::Config("scope.tenant_id must be positive".into()));
        }

        if self.cache.ttl_secs == 0 {
            return Err(EngineError::Config("cache.ttl_secs must be greater than 0".into()));
        }

        if self.reversal.currency_symbol.chars().any(|c| c.is_ascii_digit()) {
            return Err(EngineError::Config(
                "reversal.currency_symbol must not contain digits".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TALLY_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.store.database_path = PathBuf::from(path);
        }

        if let Ok(tenant) = std::env::var("TALLY_TENANT_ID") {
            match tenant.parse::<i64>() {
                Ok(id) => self.scope.tenant_id = id,
                Err(_) => warn!(value = %tenant, "Ignoring non-numeric TALLY_TENANT_ID"),
            }
        }

        if let Ok(branch) = std::env::var("TALLY_BRANCH_ID") {
            if branch.is_empty() {
                self.scope.branch_id = None;
            } else {
                match branch.parse::<i64>() {
                    Ok(id) => self.scope.branch_id = Some(id),
                    Err(_) => warn!(value = %branch, "Ignoring non-numeric TALLY_BRANCH_ID"),
                }
            }
        }

        if let Ok(ttl) = std::env::var("TALLY_CACHE_TTL_SECS") {
            match ttl.parse::<u64>() {
                Ok(secs) => self.cache.ttl_secs = secs,
                Err(_) => warn!(value = %ttl, "Ignoring non-numeric TALLY_CACHE_TTL_SECS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "ledger")
            .map(|dirs| dirs.config_dir().join("tally.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the configured scope.
    pub fn scope(&self) -> Scope {
        Scope {
            tenant_id: self.scope.tenant_id,
            branch_id: self.scope.branch_id,
        }
    }

    /// Returns the cache TTL.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// Builds the pool configuration for the store.
    ///
    /// `:memory:` yields a private single-connection database.
    pub fn db_config(&self) -> DbConfig {
        if self.store.database_path.as_os_str() == IN_MEMORY_PATH {
            return DbConfig::in_memory();
        }
        DbConfig::new(&self.store.database_path).max_connections(self.store.max_connections)
    }
}
