//! The distributed-cache contract.
//!
//! Every operation has a blocking form and an async form that honours a
//! [`CancellationToken`]. Missing and expired keys are `Ok(None)`, never errors.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::options::EntryOptions;
use crate::Error;

#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Payload of the live record for `key`, extending its sliding window.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, Error>;

    async fn get_async(&self, key: &str, cancel: &CancellationToken) -> Result<Option<Vec<u8>>, Error>;

    /// Insert or fully replace the record for `key`.
    fn set(&self, key: &str, value: &[u8], options: &EntryOptions) -> Result<(), Error>;

    async fn set_async(
        &self, key: &str, value: &[u8], options: &EntryOptions, cancel: &CancellationToken,
    ) -> Result<(), Error>;

    /// Restart the sliding window of `key` without reading its payload.
    fn refresh(&self, key: &str) -> Result<(), Error>;

    async fn refresh_async(&self, key: &str, cancel: &CancellationToken) -> Result<(), Error>;

    /// Delete `key` if present.
    fn remove(&self, key: &str) -> Result<(), Error>;

    async fn remove_async(&self, key: &str, cancel: &CancellationToken) -> Result<(), Error>;
}
