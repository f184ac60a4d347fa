//! Cache configuration with layered loading.
//!
//! Uses figment to merge, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. TOML config file (if FILECACHE_CONFIG_FILE set)
//! 3. Environment variables (FILECACHE_*)

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Output format for log lines written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Settings for opening a [`FileCache`](crate::FileCache).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Path to the SQLite cache file.
    ///
    /// Set via FILECACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// How long to wait on a locked database before failing with `Busy`.
    /// Zero fails immediately.
    ///
    /// Set via FILECACHE_BUSY_TIMEOUT_MS environment variable.
    #[serde(default)]
    pub busy_timeout_ms: u64,

    /// Set via FILECACHE_LOG_FORMAT environment variable (`text` or `json`).
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("cache.db")
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { db_path: default_db_path(), busy_timeout_ms: 0, log_format: LogFormat::default() }
    }
}

impl CacheConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("FILECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(Env::prefixed("FILECACHE_").ignore(&["config_file"]));

        Self::from_figment(&figment)
    }

    /// Extract and validate a configuration from an already-assembled figment.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layered(toml: &str) -> Figment {
        Figment::from(Serialized::defaults(CacheConfig::default())).merge(Toml::string(toml))
    }

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.db_path, PathBuf::from("cache.db"));
        assert_eq!(config.busy_timeout_ms, 0);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_busy_timeout_duration() {
        let config = CacheConfig { busy_timeout_ms: 1_500, ..Default::default() };
        assert_eq!(config.busy_timeout(), Duration::from_millis(1_500));
        assert_eq!(CacheConfig::default().busy_timeout(), Duration::ZERO);
    }

    #[test]
    fn test_toml_layer_overrides_defaults() {
        let config = CacheConfig::from_figment(&layered(
            r#"
            db_path = "/var/cache/app/cache.db"
            log_format = "json"
            "#,
        ))
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/var/cache/app/cache.db"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.busy_timeout_ms, 0);
    }

    #[test]
    fn test_unknown_log_format_fails_to_load() {
        let result = CacheConfig::from_figment(&layered(r#"log_format = "yaml""#));
        assert!(matches!(result, Err(ConfigError::LoadFailed(_))));
    }

    #[test]
    fn test_loaded_values_are_validated() {
        let result = CacheConfig::from_figment(&layered("busy_timeout_ms = 120000"));
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "busy_timeout_ms"));
    }
}
