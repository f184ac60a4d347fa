//! The SQLite-backed expiring cache.
//!
//! A [`FileCache`] only exists once its file has been bootstrapped, so every
//! operation can assume the schema is in place. Blocking calls open a
//! short-lived connection each; async calls share one background
//! tokio-rusqlite connection that is opened on first use.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_rusqlite::rusqlite::Connection;
use tokio_util::sync::CancellationToken;

use super::connection;
use super::contract::DistributedCache;
use super::options::EntryOptions;
use super::records;
use crate::Error;
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;

/// Construction-time settings for [`FileCache`].
#[derive(Clone)]
pub struct FileCacheOptions {
    /// Backing file. Parent directories are created on open.
    pub path: PathBuf,

    /// Time source for expiration; `None` uses [`SystemClock`].
    pub clock: Option<Arc<dyn Clock>>,

    /// How long SQLite may wait for a lock before reporting `Error::Busy`.
    pub busy_timeout: Duration,
}

impl Default for FileCacheOptions {
    fn default() -> Self {
        Self { path: PathBuf::from("cache.db"), clock: None, busy_timeout: Duration::ZERO }
    }
}

impl fmt::Debug for FileCacheOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCacheOptions")
            .field("path", &self.path)
            .field("clock", &self.clock.as_ref().map(|_| "custom"))
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}

impl FileCacheOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }
}

impl From<&CacheConfig> for FileCacheOptions {
    fn from(config: &CacheConfig) -> Self {
        Self::new(config.db_path.clone()).with_busy_timeout(config.busy_timeout())
    }
}

/// Persistent key-value cache with absolute and sliding expiration.
pub struct FileCache {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    busy_timeout: Duration,
    background: OnceCell<tokio_rusqlite::Connection>,
}

impl fmt::Debug for FileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCache")
            .field("path", &self.path)
            .field("busy_timeout", &self.busy_timeout)
            .finish_non_exhaustive()
    }
}

impl FileCache {
    /// Open (or create) the cache file and prepare its schema.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for a blank path, and any bootstrap
    /// failure (directory creation, open, migration) as-is.
    pub fn new(options: FileCacheOptions) -> Result<Self, Error> {
        if options.path.as_os_str().to_string_lossy().trim().is_empty() {
            return Err(Error::InvalidInput("a non-empty file path is required".into()));
        }

        connection::bootstrap(&options.path, options.busy_timeout)?;

        Ok(Self {
            path: options.path,
            clock: options.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            busy_timeout: options.busy_timeout,
            background: OnceCell::new(),
        })
    }

    /// Open the cache described by a loaded configuration.
    pub fn from_config(config: &CacheConfig) -> Result<Self, Error> {
        Self::new(FileCacheOptions::from(config))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete every record that has already expired.
    ///
    /// Returns the number of deleted entries.
    pub fn purge_expired(&self) -> Result<u64, Error> {
        let now = self.clock.unix_now();
        self.blocking(|conn| records::purge_expired(conn, now, None))
    }

    pub async fn purge_expired_async(&self, cancel: &CancellationToken) -> Result<u64, Error> {
        let now = self.clock.unix_now();
        self.run(cancel, move |conn, cancel| records::purge_expired(conn, now, Some(cancel)))
            .await
    }

    fn blocking<R>(&self, op: impl FnOnce(&Connection) -> Result<R, Error>) -> Result<R, Error> {
        let conn = connection::open_blocking(&self.path, self.busy_timeout)?;
        op(&conn).inspect_err(log_contention)
    }

    /// Run `op` on the background connection.
    ///
    /// The token is honoured until `op` is handed to the connection thread.
    /// From then on `op` owns it and checks it before committing, so the
    /// result reported here always matches what reached the file.
    async fn run<R, F>(&self, cancel: &CancellationToken, op: F) -> Result<R, Error>
    where
        F: FnOnce(&Connection, &CancellationToken) -> Result<R, Error> + Send + 'static,
        R: Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let conn = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(path = %self.path.display(), "cache operation cancelled");
                return Err(Error::Cancelled);
            }
            conn = self
                .background
                .get_or_try_init(|| connection::open_async(self.path.clone(), self.busy_timeout)) => conn?,
        };

        let token = cancel.clone();
        conn.call(move |conn| op(conn, &token))
            .await
            .map_err(Error::from)
            .inspect_err(log_contention)
    }
}

fn validate_key(key: &str) -> Result<(), Error> {
    if key.is_empty() {
        return Err(Error::InvalidInput("key must not be empty".into()));
    }
    Ok(())
}

fn log_contention(err: &Error) {
    if err.is_retryable() {
        tracing::warn!(error = %err, "cache store busy");
    }
}

#[async_trait]
impl DistributedCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error> {
        validate_key(key)?;
        self.blocking(|conn| records::load_live(conn, key, self.clock.as_ref(), None))
    }

    async fn get_async(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>, Error> {
        validate_key(key)?;
        let key = key.to_owned();
        let clock = Arc::clone(&self.clock);
        self.run(cancel, move |conn, cancel| records::load_live(conn, &key, clock.as_ref(), Some(cancel)))
            .await
    }

    fn set(&self, key: &str, value: &[u8], options: &EntryOptions) -> Result<(), Error> {
        validate_key(key)?;
        options.validate()?;

        let now = self.clock.unix_now();
        let expiration = options.resolve(now);
        self.blocking(|conn| records::upsert(conn, key, value, expiration, now, None))
    }

    async fn set_async(
        &self, key: &str, value: &[u8], options: &EntryOptions, cancel: &CancellationToken,
    ) -> Result<(), Error> {
        validate_key(key)?;
        options.validate()?;

        let now = self.clock.unix_now();
        let expiration = options.resolve(now);
        let key = key.to_owned();
        let value = value.to_vec();
        self.run(cancel, move |conn, cancel| {
            records::upsert(conn, &key, &value, expiration, now, Some(cancel))
        })
        .await
    }

    fn refresh(&self, key: &str) -> Result<(), Error> {
        validate_key(key)?;
        self.blocking(|conn| records::refresh(conn, key, self.clock.as_ref(), None))?;
        Ok(())
    }

    async fn refresh_async(&self, key: &str, cancel: &CancellationToken) -> Result<(), Error> {
        validate_key(key)?;
        let key = key.to_owned();
        let clock = Arc::clone(&self.clock);
        self.run(cancel, move |conn, cancel| records::refresh(conn, &key, clock.as_ref(), Some(cancel)))
            .await?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        validate_key(key)?;
        self.blocking(|conn| records::delete(conn, key, None))?;
        Ok(())
    }

    async fn remove_async(&self, key: &str, cancel: &CancellationToken) -> Result<(), Error> {
        validate_key(key)?;
        let key = key.to_owned();
        self.run(cancel, move |conn, cancel| records::delete(conn, &key, Some(cancel)))
            .await?;
        Ok(())
    }
}
