#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use videval_app::{AppState, Dispatcher};
use videval_core::{Config, CutInterval, RemoteLocation};
use videval_processing::{MediaError, MediaResult, VideoCutter};
use videval_storage::{ObjectStoreRemote, RemoteTier};
use videval_worker::{TaskQueue, TaskQueueConfig};

pub struct TestApp {
    pub dispatcher: Dispatcher,
    pub dir: TempDir,
}

impl TestApp {
    pub fn state(&self) -> &AppState {
        self.dispatcher.state()
    }

    /// Write an input file outside the media root.
    pub async fn input(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let inputs = self.dir.path().join("inputs");
        tokio::fs::create_dir_all(&inputs).await.unwrap();
        let path = inputs.join(name);
        tokio::fs::write(&path, bytes).await.unwrap();
        path
    }
}

pub fn test_config(dir: &Path) -> Config {
    Config {
        database_url: format!("sqlite:{}?mode=rwc", dir.join("videval.db").display()),
        db_max_connections: 4,
        db_timeout_seconds: 5,
        media_root: dir.join("media"),
        media_base_url: "http://media.test/media".to_string(),
        remote_location: None,
        s3_region: None,
        s3_endpoint: None,
        ffmpeg_path: "ffmpeg".to_string(),
        cut_timeout_secs: 30,
        task_queue_max_workers: 1,
        task_queue_capacity: 10,
        task_queue_poll_interval_ms: 10,
        task_queue_monitor_interval_ms: 50,
        log_json: false,
    }
}

pub async fn setup(cutter: Arc<dyn VideoCutter>, tier: Option<RemoteTier>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let queue = Arc::new(TaskQueue::new(TaskQueueConfig::from(&config)));
    let state = Arc::new(AppState::build(config, cutter, tier).await.unwrap());
    TestApp {
        dispatcher: Dispatcher::new(state, queue),
        dir,
    }
}

pub fn memory_tier() -> RemoteTier {
    RemoteTier::new(
        Arc::new(ObjectStoreRemote::in_memory()),
        RemoteLocation::new("media", None),
    )
}

/// Stands in for ffmpeg by copying the source and tagging it with the interval.
pub struct FakeCutter;

#[async_trait]
impl VideoCutter for FakeCutter {
    async fn cut(
        &self,
        video: &Path,
        _audio: Option<&Path>,
        interval: CutInterval,
        output: &Path,
    ) -> MediaResult<u64> {
        let mut bytes = tokio::fs::read(video).await?;
        bytes.extend_from_slice(format!(" [{}]", interval).as_bytes());
        tokio::fs::write(output, &bytes).await?;
        Ok(bytes.len() as u64)
    }
}

pub struct BrokenCutter;

#[async_trait]
impl VideoCutter for BrokenCutter {
    async fn cut(
        &self,
        _video: &Path,
        _audio: Option<&Path>,
        _interval: CutInterval,
        _output: &Path,
    ) -> MediaResult<u64> {
        Err(MediaError::ffmpeg_failed("codec exploded", None, Some(1)))
    }
}
