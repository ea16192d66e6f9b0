//! Storage abstraction trait
//!
//! All blob backends must implement [`BlobStore`]. Buckets are provisioned
//! per workspace, so every operation takes an explicit bucket.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Metadata of a stored object
#[derive(Debug, Clone)]
pub struct ObjectStat {
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Blob store abstraction
///
/// Keys are composed by [`crate::keys`]; `remove_folder` deletes every
/// object under a key prefix (mosaic tile sets are stored as folders).
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        bucket: &str,
    ) -> StorageResult<()>;

    async fn put_text(
        &self,
        key: &str,
        text: &str,
        content_type: &str,
        bucket: &str,
    ) -> StorageResult<()>;

    async fn get_object(&self, key: &str, bucket: &str) -> StorageResult<Bytes>;

    async fn get_text(&self, key: &str, bucket: &str) -> StorageResult<String>;

    /// Delete a single object. Deleting an absent object is not an error.
    async fn remove_object(&self, key: &str, bucket: &str) -> StorageResult<()>;

    /// Delete every object under `prefix`.
    async fn remove_folder(&self, prefix: &str, bucket: &str) -> StorageResult<()>;

    async fn stat_object(&self, key: &str, bucket: &str) -> StorageResult<ObjectStat>;
}
