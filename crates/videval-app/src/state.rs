//! Application state.
//!
//! One [`AppState`] is built per process from [`Config`]; every service in it
//! is a cheap clone over the shared pool and media root.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use videval_core::Config;
use videval_db::{
    DatasetRepository, DatasetVideoRepository, ProjectRepository, SegmentRepository,
    StoredFileRepository,
};
use videval_processing::{
    DeletionService, FfmpegCutter, FileService, SegmentationPipeline, SubmissionService,
    VideoCutter,
};
use videval_storage::{ContentStore, ObjectStoreRemote, RemoteTier};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub pool: SqlitePool,
    pub files: FileService,
    pub datasets: DatasetRepository,
    pub videos: DatasetVideoRepository,
    pub segments: SegmentRepository,
    pub projects: ProjectRepository,
    pub deletion: DeletionService,
    pub pipeline: SegmentationPipeline,
    pub submission: SubmissionService,
    /// Remote tier files migrate to; `None` keeps everything local.
    pub tier: Option<RemoteTier>,
}

impl AppState {
    /// Build the production state: ffmpeg for cutting and S3 for the remote tier
    /// when `REMOTE_LOCATION` is set.
    pub async fn from_config(config: Config) -> Result<Self> {
        let cutter = FfmpegCutter::new(
            config.ffmpeg_path.clone(),
            Duration::from_secs(config.cut_timeout_secs),
        );
        let tier = match &config.remote_location {
            Some(location) => {
                let region = config
                    .s3_region
                    .clone()
                    .context("REMOTE_LOCATION requires S3_REGION")?;
                let remote = ObjectStoreRemote::s3(region, config.s3_endpoint.clone());
                tracing::info!(bucket = %location.bucket, "Remote tier enabled");
                Some(RemoteTier::new(Arc::new(remote), location.clone()))
            }
            None => None,
        };
        Self::build(config, Arc::new(cutter), tier).await
    }

    /// Connect, apply the schema and wire services around the given cutter and tier.
    pub async fn build(
        config: Config,
        cutter: Arc<dyn VideoCutter>,
        tier: Option<RemoteTier>,
    ) -> Result<Self> {
        tracing::info!("Connecting to database...");
        let pool = videval_db::connect(
            &config.database_url,
            config.db_max_connections,
            config.db_timeout_seconds,
        )
        .await
        .context("Failed to connect to database")?;
        videval_db::migrate(&pool)
            .await
            .context("Failed to apply database schema")?;

        let content = ContentStore::new(config.media_root.clone())
            .await
            .with_context(|| format!("Failed to open media root {}", config.media_root.display()))?;
        let files = FileService::new(
            content,
            StoredFileRepository::new(pool.clone()),
            config.media_base_url.clone(),
        );

        let videos = DatasetVideoRepository::new(pool.clone());
        let segments = SegmentRepository::new(pool.clone());
        let projects = ProjectRepository::new(pool.clone());

        Ok(Self {
            deletion: DeletionService::new(
                pool.clone(),
                files.clone(),
                videos.clone(),
                segments.clone(),
            ),
            pipeline: SegmentationPipeline::new(
                files.clone(),
                videos.clone(),
                segments.clone(),
                cutter,
            ),
            submission: SubmissionService::new(projects.clone(), segments.clone(), files.clone()),
            datasets: DatasetRepository::new(pool.clone()),
            files,
            videos,
            segments,
            projects,
            pool,
            tier,
            config,
        })
    }

    pub fn tier(&self) -> Option<&RemoteTier> {
        self.tier.as_ref()
    }
}
