//! Storage abstraction trait
//!
//! [`RemoteStore`] is the seam between the tiering logic and whatever object
//! store holds migrated files.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use videval_core::AppError;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => AppError::NotFound(what),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Object store holding files that were migrated off local disk.
///
/// Objects are addressed by `(bucket, key)`. Implementations must treat deleting
/// a missing object as success.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// HEAD the object; `Ok(false)` when it does not exist.
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Upload a local file as a public-read object.
    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> StorageResult<()>;

    /// Stream the object into `dest`, returning the number of bytes written.
    async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<u64>;

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Public URL of an object.
    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", bucket, key)
    }
}
