//! SQLite-backed expiring key-value cache.
//!
//! One file holds one `cache` table. Records carry an optional absolute
//! deadline and an optional sliding window; expired records are removed
//! lazily when a read encounters them, or in bulk via `purge_expired`.
//!
//! - Blocking and cancellable async access through [`DistributedCache`]
//! - Schema versioning via `PRAGMA user_version`
//! - WAL mode for concurrent readers

pub mod connection;
pub mod contract;
pub mod entry;
pub mod file_cache;
pub mod migrations;
pub mod options;
pub mod records;


pub use crate::Error;

pub use contract::DistributedCache;
pub use entry::CacheRecord;
pub use file_cache::{FileCache, FileCacheOptions};
pub use options::{EntryOptions, ResolvedExpiration};
