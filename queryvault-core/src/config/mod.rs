//! Configuration for the QueryVault persistence layer
//!
//! Supports defaults, TOML files and environment overrides. The database
//! section replaces the original plugin's ad-hoc environment probing with an
//! explicit struct handed to [`crate::store::open`] by the host's
//! composition root.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Whether the persistence layer is enabled at all. When false,
    /// `store::open` returns an absent store instead of failing.
    pub enabled: bool,

    /// Path to the SQLite database file. `None` means "not configured",
    /// which also yields an absent store.
    pub path: Option<PathBuf>,

    /// Maximum number of pooled connections
    pub pool_size: u32,

    /// How long to wait when checking a connection out of the pool
    #[serde(with = "humantime_serde")]
    pub connection_timeout: Duration,

    /// Per-operation timeout for tenant-mapping reads. Zero means no
    /// deadline.
    #[serde(with = "humantime_serde")]
    pub mappings_read_timeout: Duration,

    /// Per-operation timeout for saved-query reads. Zero means no deadline.
    #[serde(with = "humantime_serde")]
    pub query_read_timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            pool_size: 16,
            connection_timeout: Duration::from_secs(5),
            mappings_read_timeout: Duration::ZERO,
            query_read_timeout: Duration::ZERO,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
        }
    }
}

fn parse_env_duration(var: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw)
        .map_err(|e| ConfigError::InvalidValue(format!("Invalid duration in {}: {}", var, e)))
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: QUERYVAULT_<SECTION>_<KEY>
    /// Example: QUERYVAULT_DATABASE_PATH=/var/lib/queryvault/store.db
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(enabled) = env::var("QUERYVAULT_DATABASE_ENABLED") {
            config.database.enabled = enabled
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid enabled flag: {}", e)))?;
        }
        if let Ok(path) = env::var("QUERYVAULT_DATABASE_PATH") {
            config.database.path = Some(PathBuf::from(path));
        }
        if let Ok(pool_size) = env::var("QUERYVAULT_DATABASE_POOL_SIZE") {
            config.database.pool_size = pool_size
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid pool size: {}", e)))?;
        }
        if let Ok(raw) = env::var("QUERYVAULT_DATABASE_CONNECTION_TIMEOUT") {
            config.database.connection_timeout =
                parse_env_duration("QUERYVAULT_DATABASE_CONNECTION_TIMEOUT", &raw)?;
        }
        if let Ok(raw) = env::var("QUERYVAULT_DATABASE_MAPPINGS_READ_TIMEOUT") {
            config.database.mappings_read_timeout =
                parse_env_duration("QUERYVAULT_DATABASE_MAPPINGS_READ_TIMEOUT", &raw)?;
        }
        if let Ok(raw) = env::var("QUERYVAULT_DATABASE_QUERY_READ_TIMEOUT") {
            config.database.query_read_timeout =
                parse_env_duration("QUERYVAULT_DATABASE_QUERY_READ_TIMEOUT", &raw)?;
        }

        if let Ok(level) = env::var("QUERYVAULT_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = env::var("QUERYVAULT_LOG_JSON") {
            config.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.pool_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "pool_size must be greater than 0".to_string(),
            ));
        }

        if self.database.connection_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "connection_timeout must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.database.enabled);
        assert!(config.database.path.is_none());
        assert!(config.database.query_read_timeout.is_zero());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.database.pool_size = 0;
        assert!(config.validate().is_err());

        config = Config::default();
        config.database.connection_timeout = Duration::ZERO;
        assert!(config.validate().is_err());

        config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml() {
        let raw = r#"
            [database]
            enabled = true
            path = "/tmp/queryvault.db"
            pool_size = 4
            connection_timeout = "2s"
            mappings_read_timeout = "250ms"
            query_read_timeout = "100ms"

            [logging]
            level = "debug"
            json_format = false
            with_target = true
        "#;

        let config: Config = toml::from_str(raw).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.database.pool_size, 4);
        assert_eq!(
            config.database.mappings_read_timeout,
            Duration::from_millis(250)
        );
        assert_eq!(
            config.database.query_read_timeout,
            Duration::from_millis(100)
        );
    }
}
