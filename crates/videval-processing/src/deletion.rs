//! All-or-nothing deletion of dataset videos and segments with their files.
//!
//! Everything runs inside one [`WriteTransaction`], so the reference counts
//! that decide which files go cannot change underneath us. Every eligible file
//! is staged before any row is touched: local files are parked in the trash,
//! remote objects are downloaded to the staging area and then deleted. Any
//! failure restores what was staged (re-uploading remote objects), rolls the
//! transaction back and returns a report instead of an error.
//!
//! The transaction takes the database write lock up front and keeps it while
//! remote objects are staged, so other writers wait on `busy_timeout` for as
//! long as those transfers take. Deleting entities with large remote files
//! should be done off the request path.

use serde::Serialize;
use std::collections::HashSet;
use sqlx::SqlitePool;
use uuid::Uuid;
use videval_core::{AppError, AppResult, StoredFile};
use videval_db::{DatasetVideoRepository, SegmentRepository, WriteTransaction};
use videval_storage::RemoteTier;

use crate::files::{purge_all, restore_all, FileService};

/// A file whose bytes could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDeleteFailure {
    pub location: String,
    pub owner: Option<String>,
    pub error: String,
}

impl FileDeleteFailure {
    pub fn new(file: &StoredFile, error: impl Into<String>) -> Self {
        Self {
            location: file.location(),
            owner: file.created_by.clone(),
            error: error.into(),
        }
    }
}

/// Outcome of a deletion. Nothing was deleted unless `failures` is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeletionReport {
    /// Locations of files removed along with the entity.
    pub deleted: Vec<String>,
    pub failures: Vec<FileDeleteFailure>,
}

impl DeletionReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
enum Target {
    DatasetVideo(Uuid),
    Segment(Uuid),
}

#[derive(Clone)]
pub struct DeletionService {
    pool: SqlitePool,
    files: FileService,
    videos: DatasetVideoRepository,
    segments: SegmentRepository,
}

impl DeletionService {
    pub fn new(
        pool: SqlitePool,
        files: FileService,
        videos: DatasetVideoRepository,
        segments: SegmentRepository,
    ) -> Self {
        Self {
            pool,
            files,
            videos,
            segments,
        }
    }

    /// Delete a dataset video, its segments, and every file only they use.
    #[tracing::instrument(skip(self, tier), fields(dataset_video_id = %id))]
    pub async fn delete_dataset_video(
        &self,
        id: Uuid,
        tier: Option<&RemoteTier>,
    ) -> AppResult<DeletionReport> {
        self.delete(Target::DatasetVideo(id), tier).await
    }

    /// Delete one segment and the files only it uses.
    #[tracing::instrument(skip(self, tier), fields(segment_id = %id))]
    pub async fn delete_segment(
        &self,
        id: Uuid,
        tier: Option<&RemoteTier>,
    ) -> AppResult<DeletionReport> {
        self.delete(Target::Segment(id), tier).await
    }

    async fn delete(&self, target: Target, tier: Option<&RemoteTier>) -> AppResult<DeletionReport> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;

        // references held by the rows about to go, one entry per reference
        let owned: Vec<String> = match target {
            Target::DatasetVideo(id) => {
                let video = self
                    .videos
                    .get_tx(&mut tx, id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("dataset video {}", id)))?;
                let segments = self.segments.list_for_video_tx(&mut tx, id).await?;
                video
                    .file_hashes()
                    .into_iter()
                    .chain(segments.iter().flat_map(|s| s.file_hashes()))
                    .map(str::to_string)
                    .collect()
            }
            Target::Segment(id) => {
                let segment = self
                    .segments
                    .get_tx(&mut tx, id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("segment {}", id)))?;
                segment.file_hashes().into_iter().map(str::to_string).collect()
            }
        };

        let repo = self.files.repository();
        let mut seen = HashSet::new();
        let mut eligible: Vec<StoredFile> = Vec::new();
        for hash in &owned {
            if !seen.insert(hash) {
                continue;
            }
            let held = owned.iter().filter(|h| *h == hash).count() as i64;
            let total = repo.reference_count_tx(&mut tx, hash).await?;
            if total > held {
                tracing::debug!(content_hash = %hash, total, held, "File still referenced elsewhere");
                continue;
            }
            if let Some(file) = repo.get_tx(&mut tx, hash).await? {
                eligible.push(file);
            }
        }

        let mut report = DeletionReport::default();
        let mut staged = Vec::new();
        let (local, remote): (Vec<&StoredFile>, Vec<&StoredFile>) =
            eligible.iter().partition(|f| !f.is_remote());
        for file in local {
            match self.files.begin_removal(file, tier).await {
                Ok(removal) => staged.push(removal),
                Err(failure) => report.failures.push(failure),
            }
        }
        // stop at the first remote failure
        if report.is_success() {
            for file in remote {
                match self.files.begin_removal(file, tier).await {
                    Ok(removal) => staged.push(removal),
                    Err(failure) => {
                        report.failures.push(failure);
                        break;
                    }
                }
            }
        }

        if !report.is_success() {
            restore_all(staged).await;
            tx.rollback().await?;
            tracing::warn!(
                ?target,
                failures = report.failures.len(),
                "Deletion aborted, nothing removed"
            );
            return Ok(report);
        }

        if let Err(e) = self.delete_rows(&mut tx, target, &eligible).await {
            restore_all(staged).await;
            return Err(e);
        }
        if let Err(e) = tx.commit().await {
            restore_all(staged).await;
            return Err(e);
        }
        purge_all(staged).await;

        report.deleted = eligible.iter().map(StoredFile::location).collect();
        tracing::info!(?target, files = report.deleted.len(), "Deleted");
        Ok(report)
    }

    async fn delete_rows(
        &self,
        tx: &mut WriteTransaction,
        target: Target,
        files: &[StoredFile],
    ) -> AppResult<()> {
        match target {
            Target::DatasetVideo(id) => self.videos.delete_tx(tx, id).await?,
            Target::Segment(id) => self.segments.delete_tx(tx, id).await?,
        };
        for file in files {
            self.files.repository().delete_tx(tx, &file.content_hash).await?;
        }
        Ok(())
    }
}
