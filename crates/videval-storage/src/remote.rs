use std::sync::Arc;
use tempfile::TempPath;

use videval_core::{content_type_for, RemoteLocation};

use crate::traits::{RemoteStore, StorageError, StorageResult};

/// A remote session paired with the destination that files migrate to.
#[derive(Clone)]
pub struct RemoteTier {
    pub store: Arc<dyn RemoteStore>,
    pub location: RemoteLocation,
}

impl RemoteTier {
    pub fn new(store: Arc<dyn RemoteStore>, location: RemoteLocation) -> Self {
        Self { store, location }
    }

    pub fn bucket(&self) -> &str {
        &self.location.bucket
    }

    pub fn key_for(&self, relative_path: &str) -> String {
        self.location.key_for(relative_path)
    }

    /// Download an object into `backup`, then delete it remotely.
    ///
    /// Returns `None` if the object does not exist. If the delete fails the
    /// object is left in place and the backup is dropped.
    pub async fn stage_removal(
        &self,
        bucket: &str,
        key: &str,
        backup: TempPath,
    ) -> StorageResult<Option<StagedObjectRemoval>> {
        match self.store.download_to(bucket, key, &backup).await {
            Ok(_) => {}
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        }
        self.store.delete(bucket, key).await?;
        Ok(Some(StagedObjectRemoval {
            store: Arc::clone(&self.store),
            bucket: bucket.to_string(),
            key: key.to_string(),
            backup,
        }))
    }
}

impl std::fmt::Debug for RemoteTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTier")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// A remote object deleted by [`RemoteTier::stage_removal`], with a local
/// backup to upload again if the deletion has to be undone.
#[must_use = "a staged removal must be restored or purged"]
pub struct StagedObjectRemoval {
    store: Arc<dyn RemoteStore>,
    bucket: String,
    key: String,
    backup: TempPath,
}

impl StagedObjectRemoval {
    pub fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    /// Upload the backup to its original key.
    pub async fn restore(self) -> StorageResult<()> {
        self.store
            .upload_file(&self.bucket, &self.key, &self.backup, content_type_for(&self.key))
            .await
    }

    /// Drop the backup for good.
    pub async fn purge(self) -> StorageResult<()> {
        self.backup.close()?;
        Ok(())
    }
}

impl std::fmt::Debug for StagedObjectRemoval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedObjectRemoval")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("backup", &self.backup)
            .finish_non_exhaustive()
    }
}
