//! Background jobs.
//!
//! Work is enqueued explicitly by whoever creates or changes a dataset video;
//! nothing is triggered implicitly on save. Failures are recorded as status
//! messages on the owning entity and also returned through the job handle.

use std::sync::Arc;
use uuid::Uuid;
use videval_core::{AppError, Project, Segment, StatusMessage};
use videval_processing::SubmissionGateway;
use videval_storage::RemoteTier;
use videval_worker::{JobError, JobHandle, TaskQueue};

use crate::state::AppState;

/// Submits application jobs to the process's task queue.
#[derive(Clone)]
pub struct Dispatcher {
    state: Arc<AppState>,
    queue: Arc<TaskQueue>,
}

impl Dispatcher {
    pub fn new(state: Arc<AppState>, queue: Arc<TaskQueue>) -> Self {
        Self { state, queue }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    /// Cut a dataset video into segments.
    pub fn segment(&self, dataset_video_id: Uuid) -> Result<JobHandle<Vec<Segment>>, JobError> {
        self.queue.submit(
            format!("segment:{}", dataset_video_id),
            segment(Arc::clone(&self.state), dataset_video_id),
        )
    }

    /// Move a dataset video's files and its segments' files to the remote tier.
    pub fn delocalize(&self, dataset_video_id: Uuid) -> Result<JobHandle<usize>, JobError> {
        self.queue.submit(
            format!("delocalize:{}", dataset_video_id),
            delocalize(Arc::clone(&self.state), dataset_video_id),
        )
    }

    /// Publish a project's segments through `gateway`.
    pub fn post_project(
        &self,
        project_id: Uuid,
        gateway: Arc<dyn SubmissionGateway>,
    ) -> Result<JobHandle<Project>, JobError> {
        self.queue.submit(
            format!("post:{}", project_id),
            post_project(Arc::clone(&self.state), project_id, gateway),
        )
    }

    pub fn collect_results(
        &self,
        project_id: Uuid,
        gateway: Arc<dyn SubmissionGateway>,
    ) -> Result<JobHandle<Project>, JobError> {
        self.queue.submit(
            format!("collect:{}", project_id),
            collect_results(Arc::clone(&self.state), project_id, gateway),
        )
    }

    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}

async fn segment(state: Arc<AppState>, dataset_video_id: Uuid) -> anyhow::Result<Vec<Segment>> {
    state.videos.clear_messages(dataset_video_id).await?;
    match state.pipeline.run(dataset_video_id, state.tier()).await {
        Ok(segments) => {
            let message = StatusMessage::info(format!("Cut into {} segments", segments.len()));
            state.videos.push_message(dataset_video_id, &message).await?;
            Ok(segments)
        }
        Err(e) => {
            record_failure(&state, dataset_video_id, "Segmentation", &e).await;
            Err(e.into())
        }
    }
}

async fn delocalize(state: Arc<AppState>, dataset_video_id: Uuid) -> anyhow::Result<usize> {
    let Some(tier) = state.tier() else {
        tracing::debug!(%dataset_video_id, "No remote tier configured");
        return Ok(0);
    };
    match delocalize_files(&state, tier, dataset_video_id).await {
        Ok(moved) => Ok(moved),
        Err(e) => {
            record_failure(&state, dataset_video_id, "Remote migration", &e).await;
            Err(e.into())
        }
    }
}

async fn delocalize_files(
    state: &AppState,
    tier: &RemoteTier,
    dataset_video_id: Uuid,
) -> Result<usize, AppError> {
    let video = state.videos.require(dataset_video_id).await?;
    let segments = state.segments.list_for_video(dataset_video_id).await?;
    let hashes: Vec<&str> = video
        .file_hashes()
        .into_iter()
        .chain(segments.iter().flat_map(|s| s.file_hashes()))
        .collect();

    let repo = state.files.repository();
    let mut moved = 0;
    for hash in hashes {
        let file = repo.require(hash).await?;
        if file.is_remote() {
            continue;
        }
        if state.files.delocalize(&file, Some(tier)).await?.is_remote() {
            moved += 1;
        }
    }
    tracing::info!(%dataset_video_id, moved, "Dataset video delocalized");
    Ok(moved)
}

async fn post_project(
    state: Arc<AppState>,
    project_id: Uuid,
    gateway: Arc<dyn SubmissionGateway>,
) -> anyhow::Result<Project> {
    let project = state
        .submission
        .post_project(project_id, gateway.as_ref(), state.tier())
        .await?;
    Ok(project)
}

async fn collect_results(
    state: Arc<AppState>,
    project_id: Uuid,
    gateway: Arc<dyn SubmissionGateway>,
) -> anyhow::Result<Project> {
    let project = state
        .submission
        .collect_results(project_id, gateway.as_ref())
        .await?;
    Ok(project)
}

async fn record_failure(state: &AppState, dataset_video_id: Uuid, what: &str, error: &AppError) {
    let message = StatusMessage::error(format!("{} failed: {}", what, error));
    if let Err(e) = state.videos.push_message(dataset_video_id, &message).await {
        tracing::warn!(%dataset_video_id, error = %e, "Failed to record status message");
    }
}
