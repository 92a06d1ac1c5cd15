//! Stored files across the local and remote tiers.
//!
//! A [`StoredFile`] row is authoritative for where a file's bytes live: under
//! its `relative_path` in the local [`ContentStore`], or at `(bucket, key)` on
//! the remote tier once delocalized. Never both.

use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::AsyncRead;
use videval_core::{content_type_for, AppError, AppResult, StoredFile};
use videval_db::{StoredFileRepository, WriteTransaction};
use videval_storage::{
    ContentStore, RemoteTier, StagedObjectRemoval, StagedRemoval, StorageResult,
};

use crate::deletion::{DeletionReport, FileDeleteFailure};

#[derive(Clone)]
pub struct FileService {
    content: ContentStore,
    files: StoredFileRepository,
    public_base_url: String,
}

/// Local access to a file's bytes. Downloaded copies are removed on drop.
#[derive(Debug)]
pub enum LocalFile {
    Stored(PathBuf),
    Downloaded(TempPath),
}

impl LocalFile {
    pub fn path(&self) -> &Path {
        match self {
            LocalFile::Stored(path) => path,
            LocalFile::Downloaded(temp) => temp,
        }
    }
}

/// A physical removal that can still be undone until it is purged.
#[derive(Debug)]
pub(crate) enum Removal {
    Local(StagedRemoval),
    Remote(StagedObjectRemoval),
    /// The bytes were already gone.
    Done,
}

impl Removal {
    fn describe(&self) -> String {
        match self {
            Removal::Local(staged) => staged.original().display().to_string(),
            Removal::Remote(staged) => staged.location(),
            Removal::Done => String::new(),
        }
    }

    async fn restore(self) -> StorageResult<()> {
        match self {
            Removal::Local(staged) => staged.restore().await,
            Removal::Remote(staged) => staged.restore().await,
            Removal::Done => Ok(()),
        }
    }

    async fn purge(self) -> StorageResult<()> {
        match self {
            Removal::Local(staged) => staged.purge().await,
            Removal::Remote(staged) => staged.purge().await,
            Removal::Done => Ok(()),
        }
    }
}

impl FileService {
    pub fn new(
        content: ContentStore,
        files: StoredFileRepository,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            content,
            files,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn repository(&self) -> &StoredFileRepository {
        &self.files
    }

    /// Store bytes and record them, migrating to `tier` straight away if given.
    ///
    /// Identical content converges on one row. A missing owner on an existing
    /// row is filled in from `owner`.
    #[tracing::instrument(skip(self, reader, tier), fields(subdirectory = %subdirectory))]
    pub async fn store<R>(
        &self,
        reader: R,
        display_name: &str,
        subdirectory: &str,
        owner: Option<&str>,
        tier: Option<&RemoteTier>,
    ) -> AppResult<StoredFile>
    where
        R: AsyncRead + Unpin + Send,
    {
        let stored = self.content.store(reader, display_name, subdirectory).await?;
        let file = self
            .files
            .upsert(
                &stored.content_hash,
                &stored.display_name,
                &stored.relative_path,
                owner,
            )
            .await?;

        // the row already points elsewhere, so the copy we just wrote is redundant
        if stored.created && (file.is_remote() || file.relative_path != stored.relative_path) {
            self.content.remove(&stored.relative_path).await?;
            tracing::debug!(
                content_hash = %file.content_hash,
                path = %stored.relative_path,
                "Redundant local copy dropped"
            );
        }

        self.delocalize(&file, tier).await
    }

    pub async fn store_path(
        &self,
        path: &Path,
        display_name: &str,
        subdirectory: &str,
        owner: Option<&str>,
        tier: Option<&RemoteTier>,
    ) -> AppResult<StoredFile> {
        let reader = tokio::fs::File::open(path).await.map_err(|e| {
            AppError::Storage(format!("Failed to open {}: {}", path.display(), e))
        })?;
        self.store(reader, display_name, subdirectory, owner, tier).await
    }

    /// Move the authoritative copy to the remote tier.
    ///
    /// Without a tier, or when the file is already remote or its local copy is
    /// gone, the record is returned unchanged. The local copy is deleted only
    /// after the object is confirmed remotely; an upload failure is returned
    /// with the local file and the record untouched.
    #[tracing::instrument(skip(self, file, tier), fields(content_hash = %file.content_hash))]
    pub async fn delocalize(
        &self,
        file: &StoredFile,
        tier: Option<&RemoteTier>,
    ) -> AppResult<StoredFile> {
        let (Some(tier), Some(relative_path)) = (tier, file.local_path()) else {
            return Ok(file.clone());
        };
        if !self.content.exists(relative_path).await? {
            tracing::warn!(path = %relative_path, "Local copy missing, not delocalizing");
            return Ok(file.clone());
        }

        let bucket = tier.bucket();
        let key = tier.key_for(relative_path);
        if tier.store.exists(bucket, &key).await? {
            tracing::debug!(bucket = %bucket, key = %key, "Object already present remotely");
        } else {
            let path = self.content.path_of(relative_path)?;
            tier.store
                .upload_file(bucket, &key, &path, content_type_for(relative_path))
                .await?;
        }

        let updated = self.files.set_remote(&file.content_hash, bucket, &key).await?;
        self.content.remove(relative_path).await?;
        tracing::info!(bucket = %bucket, key = %key, "File delocalized");
        Ok(updated)
    }

    /// Resolve a file to a local path for the lifetime of the returned guard.
    pub async fn local(&self, file: &StoredFile, tier: Option<&RemoteTier>) -> AppResult<LocalFile> {
        match file.remote_location() {
            None => {
                let path = self.content.path_of(&file.relative_path)?;
                if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Err(AppError::NotFound(format!(
                        "local file {} is missing",
                        file.relative_path
                    )));
                }
                Ok(LocalFile::Stored(path))
            }
            Some((bucket, key)) => {
                let tier = tier.ok_or_else(|| AppError::MissingRemoteSession(file.location()))?;
                let suffix = file.extension().map(|e| format!(".{}", e)).unwrap_or_default();
                let temp = self.content.temp_path(&suffix)?;
                let size_bytes = tier.store.download_to(bucket, key, &temp).await?;
                tracing::debug!(bucket = %bucket, key = %key, size_bytes, "File localized");
                Ok(LocalFile::Downloaded(temp))
            }
        }
    }

    pub async fn reference_count(&self, content_hash: &str) -> AppResult<i64> {
        self.files.reference_count(content_hash).await
    }

    /// True while at most the caller's own reference remains.
    pub async fn can_be_deleted(&self, content_hash: &str) -> AppResult<bool> {
        Ok(self.reference_count(content_hash).await? <= 1)
    }

    /// Delete the bytes of a file from whichever tier holds them.
    pub async fn try_delete_file(
        &self,
        file: &StoredFile,
        tier: Option<&RemoteTier>,
    ) -> Result<(), FileDeleteFailure> {
        self.begin_removal(file, tier)
            .await?
            .purge()
            .await
            .map_err(|e| FileDeleteFailure::new(file, e.to_string()))
    }

    /// Remove a file's bytes so the caller can still undo it.
    ///
    /// Local files are parked in the trash. Remote objects are downloaded to
    /// the staging area before they are deleted, and uploaded again on restore.
    pub(crate) async fn begin_removal(
        &self,
        file: &StoredFile,
        tier: Option<&RemoteTier>,
    ) -> Result<Removal, FileDeleteFailure> {
        match file.remote_location() {
            None => match self.content.stage_removal(&file.relative_path).await {
                Ok(Some(staged)) => Ok(Removal::Local(staged)),
                Ok(None) => Ok(Removal::Done),
                Err(e) => Err(FileDeleteFailure::new(file, e.to_string())),
            },
            Some((bucket, key)) => {
                let tier = tier.ok_or_else(|| {
                    FileDeleteFailure::new(file, AppError::MissingRemoteSession(file.location()).to_string())
                })?;
                let suffix = file.extension().map(|e| format!(".{}", e)).unwrap_or_default();
                let backup = self
                    .content
                    .temp_path(&suffix)
                    .map_err(|e| FileDeleteFailure::new(file, e.to_string()))?;
                match tier.stage_removal(bucket, key, backup).await {
                    Ok(Some(staged)) => Ok(Removal::Remote(staged)),
                    Ok(None) => Ok(Removal::Done),
                    Err(e) => Err(FileDeleteFailure::new(file, e.to_string())),
                }
            }
        }
    }

    /// Public URL of a file on whichever tier holds it.
    pub fn url(&self, file: &StoredFile, tier: Option<&RemoteTier>) -> String {
        match (file.remote_location(), tier) {
            (Some((bucket, key)), Some(tier)) => tier.store.public_url(bucket, key),
            (Some((bucket, key)), None) => format!("https://{}.s3.amazonaws.com/{}", bucket, key),
            (None, _) => format!("{}/{}", self.public_base_url, file.relative_path),
        }
    }

    /// Delete every file nothing references any more.
    ///
    /// Files whose bytes cannot be removed keep their rows and are reported.
    #[tracing::instrument(skip(self, tier))]
    pub async fn vacuum(&self, tier: Option<&RemoteTier>) -> AppResult<DeletionReport> {
        let mut tx = WriteTransaction::begin(self.files.pool()).await?;
        let orphans = self.files.list_unreferenced_tx(&mut tx).await?;

        let mut report = DeletionReport::default();
        let mut staged = Vec::new();
        for file in orphans {
            match self.begin_removal(&file, tier).await {
                Ok(removal) => {
                    staged.push(removal);
                    if let Err(e) = self.files.delete_tx(&mut tx, &file.content_hash).await {
                        restore_all(staged).await;
                        return Err(e);
                    }
                    report.deleted.push(file.location());
                }
                Err(failure) => {
                    tracing::warn!(location = %failure.location, error = %failure.error, "Vacuum could not delete file");
                    report.failures.push(failure);
                }
            }
        }

        if let Err(e) = tx.commit().await {
            restore_all(staged).await;
            return Err(e);
        }
        purge_all(staged).await;

        tracing::info!(
            deleted = report.deleted.len(),
            failures = report.failures.len(),
            "Vacuum finished"
        );
        Ok(report)
    }
}

pub(crate) async fn restore_all(staged: Vec<Removal>) {
    for removal in staged {
        let location = removal.describe();
        if let Err(e) = removal.restore().await {
            tracing::error!(location = %location, error = %e, "Failed to restore staged file");
        }
    }
}

pub(crate) async fn purge_all(staged: Vec<Removal>) {
    for removal in staged {
        let location = removal.describe();
        if let Err(e) = removal.purge().await {
            tracing::warn!(location = %location, error = %e, "Failed to purge staged file");
        }
    }
}
