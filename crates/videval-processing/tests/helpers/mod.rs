#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use uuid::Uuid;
use videval_core::{CutInterval, DatasetVideo, RemoteLocation};
use videval_db::{
    DatasetRepository, DatasetVideoRepository, NewDatasetVideo, ProjectRepository,
    SegmentRepository, StoredFileRepository,
};
use videval_processing::{
    DeletionService, FileService, MediaError, MediaResult, SegmentationPipeline,
    SubmissionService, VideoCutter, SUBTITLES_SUBDIRECTORY, VIDEO_SUBDIRECTORY,
};
use videval_storage::{
    ContentStore, ObjectStoreRemote, RemoteStore, RemoteTier, StorageError, StorageResult,
};

pub const BASE_URL: &str = "http://media.test/media";

/// Everything a processing test needs, on a throwaway media root and database.
pub struct TestContext {
    pub pool: sqlx::SqlitePool,
    pub content: ContentStore,
    pub files: FileService,
    pub datasets: DatasetRepository,
    pub videos: DatasetVideoRepository,
    pub segments: SegmentRepository,
    pub projects: ProjectRepository,
    pub _dir: TempDir,
}

impl TestContext {
    pub fn deletion(&self) -> DeletionService {
        DeletionService::new(
            self.pool.clone(),
            self.files.clone(),
            self.videos.clone(),
            self.segments.clone(),
        )
    }

    pub fn pipeline(&self, cutter: Arc<dyn VideoCutter>) -> SegmentationPipeline {
        SegmentationPipeline::new(
            self.files.clone(),
            self.videos.clone(),
            self.segments.clone(),
            cutter,
        )
    }

    pub fn submission(&self) -> SubmissionService {
        SubmissionService::new(
            self.projects.clone(),
            self.segments.clone(),
            self.files.clone(),
        )
    }

    /// Store a video (and optional subtitles) and attach it to a fresh dataset.
    pub async fn dataset_video(
        &self,
        video: &[u8],
        subtitles: Option<&str>,
        cuts: Vec<CutInterval>,
    ) -> DatasetVideo {
        let video_file = self
            .files
            .store(video, "talk.mp4", VIDEO_SUBDIRECTORY, Some("alice"), None)
            .await
            .unwrap();
        let subtitles_hash = match subtitles {
            Some(text) => Some(
                self.files
                    .store(text.as_bytes(), "talk.vtt", SUBTITLES_SUBDIRECTORY, Some("alice"), None)
                    .await
                    .unwrap()
                    .content_hash,
            ),
            None => None,
        };
        let dataset = self
            .datasets
            .create(&format!("dataset-{}", Uuid::new_v4()), Some("alice"))
            .await
            .unwrap();
        self.videos
            .create(NewDatasetVideo {
                dataset_id: dataset.id,
                name: "talk.mp4".to_string(),
                video_hash: video_file.content_hash,
                audio_hash: None,
                subtitles_hash,
                cut_intervals: cuts,
            })
            .await
            .unwrap()
    }
}

pub async fn setup() -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("videval.db").display());
    let pool = videval_db::connect(&url, 4, 5).await.unwrap();
    videval_db::migrate(&pool).await.unwrap();

    let content = ContentStore::new(dir.path().join("media")).await.unwrap();
    let files = FileService::new(
        content.clone(),
        StoredFileRepository::new(pool.clone()),
        BASE_URL,
    );

    TestContext {
        content,
        files,
        datasets: DatasetRepository::new(pool.clone()),
        videos: DatasetVideoRepository::new(pool.clone()),
        segments: SegmentRepository::new(pool.clone()),
        projects: ProjectRepository::new(pool.clone()),
        pool,
        _dir: dir,
    }
}

/// A remote tier on the in-memory backend.
pub fn memory_tier() -> (RemoteTier, Arc<FlakyRemote>) {
    let remote = Arc::new(FlakyRemote::default());
    let tier = RemoteTier::new(
        remote.clone(),
        RemoteLocation::new("media", Some("videval".to_string())),
    );
    (tier, remote)
}

/// In-memory remote store whose uploads and deletes can be made to fail.
pub struct FlakyRemote {
    inner: ObjectStoreRemote,
    pub fail_uploads: AtomicBool,
    pub fail_deletes: AtomicBool,
    /// Deletes of keys containing any of these fail.
    pub fail_delete_keys: Mutex<Vec<String>>,
    pub uploads: AtomicUsize,
}

impl FlakyRemote {
    pub fn fail_deletes_matching(&self, needle: &str) {
        self.fail_delete_keys.lock().unwrap().push(needle.to_string());
    }

    pub fn clear_delete_failures(&self) {
        self.fail_deletes.store(false, Ordering::SeqCst);
        self.fail_delete_keys.lock().unwrap().clear();
    }
}

impl Default for FlakyRemote {
    fn default() -> Self {
        Self {
            inner: ObjectStoreRemote::in_memory(),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            fail_delete_keys: Mutex::new(Vec::new()),
            uploads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RemoteStore for FlakyRemote {
    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        self.inner.exists(bucket, key).await
    }

    async fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailed("injected upload failure".into()));
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.inner.upload_file(bucket, key, path, content_type).await
    }

    async fn download_to(&self, bucket: &str, key: &str, dest: &Path) -> StorageResult<u64> {
        self.inner.download_to(bucket, key, dest).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let key_fails = self
            .fail_delete_keys
            .lock()
            .unwrap()
            .iter()
            .any(|needle| key.contains(needle.as_str()));
        if key_fails || self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::DeleteFailed("injected delete failure".into()));
        }
        self.inner.delete(bucket, key).await
    }
}

/// Stands in for ffmpeg: writes the source bytes plus the interval, so every
/// interval yields distinct content.
#[derive(Default)]
pub struct FakeCutter {
    pub calls: Mutex<Vec<CutInterval>>,
    /// Fail on the call with this index.
    pub fail_at: Option<usize>,
}

impl FakeCutter {
    pub fn failing_at(index: usize) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_at: Some(index),
        }
    }

    pub fn intervals(&self) -> Vec<CutInterval> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoCutter for FakeCutter {
    async fn cut(
        &self,
        video: &Path,
        _audio: Option<&Path>,
        interval: CutInterval,
        output: &Path,
    ) -> MediaResult<u64> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(interval);
            calls.len() - 1
        };
        if self.fail_at == Some(index) {
            return Err(MediaError::ffmpeg_failed("injected cut failure", None, Some(1)));
        }
        let mut bytes = tokio::fs::read(video).await?;
        bytes.extend_from_slice(format!(" [{}]", interval).as_bytes());
        tokio::fs::write(output, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

pub fn md5_hex(bytes: &[u8]) -> String {
    use md5::{Digest, Md5};
    hex::encode(Md5::digest(bytes))
}
