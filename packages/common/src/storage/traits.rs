use async_trait::async_trait;

use super::error::StorageError;

/// Key-addressed blob storage for fetched source files.
///
/// Keys are slash-separated relative paths; the fetcher writes source files
/// under `{project_id}/{relative_path}` and the scan orchestrator reads them
/// back by the same key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under the given key, replacing any existing object.
    async fn put(&self, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Retrieve all bytes for an object.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;

    /// Delete every object whose key starts with `prefix/`.
    ///
    /// Returns the number of objects removed. Used to drop all blobs for a
    /// project in one call.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, StorageError>;
}
