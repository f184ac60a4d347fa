//! Core types for filecache.
//!
//! This crate provides:
//! - A persistent expiring cache with a SQLite backend
//! - Injectable clocks for expiration decisions
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;

pub use cache::{DistributedCache, EntryOptions, FileCache, FileCacheOptions};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::Error;
