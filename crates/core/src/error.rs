//! Unified error types for filecache.
//!
//! Messages carry a short code prefix so callers and logs can match on the
//! failure class without inspecting the variant.

use std::path::PathBuf;

use tokio_rusqlite::rusqlite::{self, ErrorCode};

/// Unified error type for every cache operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller input rejected before any storage access (blank path, empty key,
    /// non-positive expiration).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Another transaction holds the lock this operation needs.
    ///
    /// Retryable once the contention clears.
    #[error("CACHE_BUSY: {0}")]
    Busy(rusqlite::Error),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// The directory holding the cache file could not be created.
    #[error("CACHE_ERROR: cannot prepare {}: {source}", .path.display())]
    Bootstrap {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// An async operation was cancelled before the store answered.
    #[error("CANCELLED")]
    Cancelled,

    /// A connection-level failure this crate has no dedicated variant for.
    #[error("CACHE_ERROR: {0}")]
    Connection(String),
}

impl Error {
    /// Whether retrying the same operation later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Busy(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            other => Error::Connection(other.to_string()),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => Error::from(e),
            other => Error::Database(other),
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Error::Busy(err),
            _ => Error::Database(tokio_rusqlite::Error::Error(err)),
        }
    }
}
