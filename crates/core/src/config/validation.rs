//! Validation rules for `CacheConfig` values after loading.

use crate::config::CacheConfig;
use thiserror::Error;

/// Upper bound on how long a call may wait for a lock.
const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `db_path` is empty or whitespace
    /// - `busy_timeout_ms` exceeds one minute
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(ConfigError::Invalid { field: "db_path".into(), reason: "must not be empty".into() });
        }

        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid {
                field: "busy_timeout_ms".into(),
                reason: format!("must not exceed {MAX_BUSY_TIMEOUT_MS}ms"),
            });
        }

        if self.busy_timeout_ms > 0 {
            tracing::debug!(busy_timeout_ms = self.busy_timeout_ms, "lock contention will wait before failing");
        }

        Ok(())
    }
}
