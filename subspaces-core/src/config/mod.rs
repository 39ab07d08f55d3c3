//! Configuration management for the subspaces core
//!
//! Configuration comes from defaults, `SUBSPACES_*` environment variables or
//! a TOML file, and is validated before use.

use crate::core_store::{KvStore, MemoryStore, SqlStore, StoreResult};
use crate::logging::{LogConfig, LogLevel};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Store configuration
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Query configuration
    pub query: QueryConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Volatile in-process map
    Memory,
    /// SQLite database file
    Sqlite,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Database file used by the SQLite backend
    pub path: PathBuf,

    /// Maximum pooled SQLite connections
    pub pool_size: u32,

    /// How long a connection waits on a locked database
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

/// Paginated query configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Page size used when a request asks for none
    pub default_limit: u64,

    /// Largest page a request may ask for
    pub max_limit: u64,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Describe the counters at startup
    pub enabled: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: PathBuf::from("./data/subspaces.db"),
            pool_size: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_limit: 100, max_limit: 1_000 }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl LoggingConfig {
    /// Logging setup described by this section
    pub fn to_log_config(&self) -> Result<LogConfig, ConfigError> {
        let level = LogLevel::from_str(&self.level)
            .ok_or_else(|| ConfigError::invalid("logging", format!("unknown log level {:?}", self.level)))?;
        Ok(LogConfig::new(level)
            .with_timestamp(self.with_timestamp)
            .with_target(self.with_target)
            .json_format(self.json_format))
    }
}

impl QueryConfig {
    /// Page size to use for a requested `limit` (0 means default)
    pub fn clamp_limit(&self, limit: u64) -> u64 {
        if limit == 0 {
            self.default_limit
        } else {
            limit.min(self.max_limit)
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: SUBSPACES_<SECTION>_<KEY>
    /// Example: SUBSPACES_STORE_BACKEND=sqlite
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Store config
        if let Ok(backend) = env::var("SUBSPACES_STORE_BACKEND") {
            config.store.backend = match backend.to_lowercase().as_str() {
                "memory" => StoreBackend::Memory,
                "sqlite" => StoreBackend::Sqlite,
                _ => return Err(ConfigError::env("SUBSPACES_STORE_BACKEND", &backend, "expected memory or sqlite")),
            };
        }
        if let Ok(path) = env::var("SUBSPACES_STORE_PATH") {
            config.store.path = PathBuf::from(path);
        }
        if let Ok(pool_size) = env::var("SUBSPACES_STORE_POOL_SIZE") {
            config.store.pool_size = pool_size
                .parse()
                .map_err(|e| ConfigError::env("SUBSPACES_STORE_POOL_SIZE", &pool_size, e))?;
        }
        if let Ok(timeout) = env::var("SUBSPACES_STORE_BUSY_TIMEOUT") {
            config.store.busy_timeout = humantime_serde::re::humantime::parse_duration(&timeout)
                .map_err(|e| ConfigError::env("SUBSPACES_STORE_BUSY_TIMEOUT", &timeout, e))?;
        }

        // Logging config
        if let Ok(level) = env::var("SUBSPACES_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = env::var("SUBSPACES_LOG_JSON") {
            config.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::env("SUBSPACES_LOG_JSON", &json, e))?;
        }

        // Query config
        if let Ok(limit) = env::var("SUBSPACES_QUERY_DEFAULT_LIMIT") {
            config.query.default_limit = limit
                .parse()
                .map_err(|e| ConfigError::env("SUBSPACES_QUERY_DEFAULT_LIMIT", &limit, e))?;
        }
        if let Ok(limit) = env::var("SUBSPACES_QUERY_MAX_LIMIT") {
            config.query.max_limit = limit
                .parse()
                .map_err(|e| ConfigError::env("SUBSPACES_QUERY_MAX_LIMIT", &limit, e))?;
        }

        // Metrics config
        if let Ok(enabled) = env::var("SUBSPACES_METRICS_ENABLED") {
            config.metrics.enabled = enabled
                .parse()
                .map_err(|e| ConfigError::env("SUBSPACES_METRICS_ENABLED", &enabled, e))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;

        let config: Self = toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.pool_size == 0 {
            return Err(ConfigError::invalid("store", "pool_size must be greater than 0"));
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::invalid("store", "sqlite backend needs a path"));
        }

        if self.query.default_limit == 0 {
            return Err(ConfigError::invalid("query", "default_limit must be greater than 0"));
        }
        if self.query.default_limit > self.query.max_limit {
            return Err(ConfigError::invalid(
                "query",
                format!("default_limit {} exceeds max_limit {}", self.query.default_limit, self.query.max_limit),
            ));
        }

        self.logging.to_log_config()?;
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)?;

        std::fs::write(path, contents).map_err(|source| ConfigError::Write { path: path.to_path_buf(), source })?;

        Ok(())
    }

    /// Open the configured store backend
    pub fn open_store(&self) -> StoreResult<Box<dyn KvStore>> {
        match self.store.backend {
            StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
            StoreBackend::Sqlite => {
                if let Some(parent) = self.store.path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| crate::core_store::StoreError::Storage(e.to_string()))?;
                    }
                }
                let store = SqlStore::open_with_timeout(&self.store.path, self.store.pool_size, self.store.busy_timeout)?;
                Ok(Box::new(store))
            }
        }
    }
}
