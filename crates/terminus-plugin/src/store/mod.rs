//! Object store plugin.
//!
//! Velero keeps backup metadata, content archives and restore logs in an
//! object store addressed by `(bucket, key)`. Terminus keeps them on a local
//! volume instead, so this module maps each object onto a file below a root
//! directory. See [`keys`] for the layout.

pub mod error;
pub mod keys;
pub mod local;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::TimeDelta;

use crate::config::ConfigMap;

pub use error::{StoreError, StoreResult};
pub use keys::ObjectKey;
pub use local::LocalObjectStore;

/// Object store contract as driven by the backup host.
///
/// All operations are async for compatibility with remote object stores.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Validate the location config and prepare the bucket.
    async fn init(&mut self, config: &ConfigMap) -> StoreResult<()>;

    /// Store `body` under `key`, replacing any existing object.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> StoreResult<()>;

    /// Check if an object exists.
    ///
    /// # Returns
    ///
    /// - `Ok(false)` if nothing is stored under `key`
    /// - `Err(StoreError::...)` if existence could not be determined
    async fn object_exists(&self, bucket: &str, key: &str) -> StoreResult<bool>;

    /// Download an object.
    ///
    /// # Returns
    ///
    /// - `Ok(Bytes)` with the object contents
    /// - `Err(StoreError::NotFound)` if the object doesn't exist
    async fn get_object(&self, bucket: &str, key: &str) -> StoreResult<Bytes>;

    /// Distinct `prefix + segment + delimiter` values for the keys below
    /// `prefix`, sorted.
    async fn list_common_prefixes(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> StoreResult<Vec<String>>;

    /// All keys starting with `prefix`, sorted.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>>;

    /// Delete an object, or everything below `key` if it names a directory.
    /// Deleting something that does not exist succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> StoreResult<()>;

    /// URL the host can hand out for downloading `key` for `ttl`.
    async fn create_signed_url(&self, bucket: &str, key: &str, ttl: TimeDelta)
        -> StoreResult<String>;
}
