//! Publishing project segments as crowdsourcing jobs and collecting results.

use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use videval_core::{
    AppError, AppResult, HitSettings, Project, Segment, StatusMessage, SubmissionTask,
    WorkerIdentity,
};
use videval_db::{ProjectRepository, SegmentRepository};
use videval_storage::RemoteTier;

use crate::files::FileService;

/// One job to publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRequest {
    pub task_id: Uuid,
    pub media_url: String,
    pub subtitle_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedJob {
    pub job_id: String,
    /// Group the job landed in; shared by every job of one job type.
    pub batch_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignmentStatus {
    Submitted,
    Approved,
    Rejected,
}

impl AssignmentStatus {
    /// `None` until the submission has been reviewed.
    pub fn is_approved(&self) -> Option<bool> {
        match self {
            AssignmentStatus::Submitted => None,
            AssignmentStatus::Approved => Some(true),
            AssignmentStatus::Rejected => Some(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAssignment {
    pub assignment_id: String,
    pub worker_id: String,
    pub status: AssignmentStatus,
    pub answers: serde_json::Value,
}

/// The crowdsourcing marketplace.
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    /// Register the shared job settings, returning a job type id.
    ///
    /// Lifetime and assignment count are per job and passed to `create_job`.
    async fn create_job_type(&self, settings: &HitSettings) -> AppResult<String>;

    async fn create_job(
        &self,
        job_type_id: &str,
        job: &JobRequest,
        lifetime_in_seconds: u64,
        max_assignments: Option<u32>,
    ) -> AppResult<CreatedJob>;

    async fn list_assignments(&self, job_id: &str) -> AppResult<Vec<RemoteAssignment>>;
}

#[derive(Clone)]
pub struct SubmissionService {
    projects: ProjectRepository,
    segments: SegmentRepository,
    files: FileService,
}

impl SubmissionService {
    pub fn new(projects: ProjectRepository, segments: SegmentRepository, files: FileService) -> Self {
        Self {
            projects,
            segments,
            files,
        }
    }

    /// Publish every segment of the project's dataset that has no job yet.
    ///
    /// Failures for single jobs are recorded as project messages without
    /// stopping the batch; a failure before any job is created marks the
    /// project as not started.
    #[tracing::instrument(skip(self, gateway, tier), fields(project_id = %project_id))]
    pub async fn post_project(
        &self,
        project_id: Uuid,
        gateway: &dyn SubmissionGateway,
        tier: Option<&RemoteTier>,
    ) -> AppResult<Project> {
        let project = self.claim(project_id).await?;

        let mut messages = Vec::new();
        let (started, batch_id) = match self.publish(&project, gateway, tier, &mut messages).await {
            Ok(batch_id) => (true, batch_id),
            Err(e) => {
                tracing::error!(error = %e, "Posting project failed");
                messages.push(StatusMessage::error(e.to_string()));
                (false, None)
            }
        };

        self.projects
            .finish_job(project.id, &messages, Some(started), batch_id.as_deref())
            .await?;
        self.projects.require(project.id).await
    }

    async fn publish(
        &self,
        project: &Project,
        gateway: &dyn SubmissionGateway,
        tier: Option<&RemoteTier>,
        messages: &mut Vec<StatusMessage>,
    ) -> AppResult<Option<String>> {
        let segments = self.segments.list_for_dataset(project.dataset_id).await?;
        let segment_ids: Vec<Uuid> = segments.iter().map(|s| s.id).collect();
        let tasks = self.projects.ensure_tasks(project.id, &segment_ids).await?;

        let settings = &project.hit_settings;
        let job_type_id = gateway.create_job_type(settings).await?;

        let mut batch_id = None;
        for task in tasks.iter().filter(|t| t.remote_job_id.is_none()) {
            let Some(segment) = segments.iter().find(|s| s.id == task.segment_id) else {
                continue;
            };
            let result = async {
                let job = self.job_request(task, segment, tier).await?;
                let created = gateway
                    .create_job(
                        &job_type_id,
                        &job,
                        settings.lifetime_in_seconds,
                        settings.max_assignments,
                    )
                    .await?;
                self.projects.set_remote_job_id(task.id, &created.job_id).await?;
                Ok::<_, AppError>(created)
            }
            .await;

            match result {
                Ok(created) => batch_id = Some(created.batch_id),
                Err(e) => {
                    tracing::warn!(task_id = %task.id, error = %e, "Job creation failed");
                    messages.push(StatusMessage::error(e.to_string()));
                }
            }
        }
        Ok(batch_id)
    }

    async fn job_request(
        &self,
        task: &SubmissionTask,
        segment: &Segment,
        tier: Option<&RemoteTier>,
    ) -> AppResult<JobRequest> {
        let repo = self.files.repository();
        let video = repo.require(&segment.video_hash).await?;
        let subtitle_url = match &segment.subtitles_hash {
            Some(hash) => Some(self.files.url(&repo.require(hash).await?, tier)),
            None => None,
        };
        Ok(JobRequest {
            task_id: task.id,
            media_url: self.files.url(&video, tier),
            subtitle_url,
        })
    }

    /// Pull assignments for every published task, labelling workers by the
    /// project's identity policy.
    #[tracing::instrument(skip(self, gateway), fields(project_id = %project_id))]
    pub async fn collect_results(
        &self,
        project_id: Uuid,
        gateway: &dyn SubmissionGateway,
    ) -> AppResult<Project> {
        let project = self.claim(project_id).await?;

        let mut messages = Vec::new();
        if let Err(e) = self.collect(&project, gateway).await {
            tracing::error!(error = %e, "Collecting results failed");
            messages.push(StatusMessage::error(e.to_string()));
        }

        self.projects.finish_job(project.id, &messages, None, None).await?;
        self.projects.require(project.id).await
    }

    async fn collect(&self, project: &Project, gateway: &dyn SubmissionGateway) -> AppResult<()> {
        let tasks = self.projects.list_tasks(project.id).await?;
        let mut collected = 0usize;
        for task in &tasks {
            let Some(job_id) = &task.remote_job_id else {
                continue;
            };
            for assignment in gateway.list_assignments(job_id).await? {
                let label = self.worker_label(project, &assignment.worker_id).await?;
                self.projects
                    .upsert_assignment(
                        task.id,
                        &assignment.assignment_id,
                        label.as_deref(),
                        assignment.status.is_approved(),
                        &assignment.answers,
                    )
                    .await?;
                collected += 1;
            }
            self.projects.mark_collected(task.id).await?;
        }
        tracing::info!(collected, "Assignments collected");
        Ok(())
    }

    async fn worker_label(&self, project: &Project, worker_id: &str) -> AppResult<Option<String>> {
        Ok(match project.worker_identity {
            WorkerIdentity::Anonymous => None,
            WorkerIdentity::Hashed => Some(hashed_worker_id(project.id, worker_id)),
            WorkerIdentity::Numbered => Some(
                self.projects
                    .worker_number(project.id, worker_id)
                    .await?
                    .to_string(),
            ),
            WorkerIdentity::Username => Some(worker_id.to_string()),
        })
    }

    async fn claim(&self, project_id: Uuid) -> AppResult<Project> {
        let project = self.projects.require(project_id).await?;
        if !self.projects.try_mark_busy(project.id).await? {
            return Err(AppError::InvalidInput(format!(
                "project {} is busy with another job",
                project.id
            )));
        }
        Ok(project)
    }
}

/// Stable per-project pseudonym; the same worker hashes differently across projects.
pub fn hashed_worker_id(project_id: Uuid, worker_id: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(project_id.as_bytes());
    hasher.update(worker_id.as_bytes());
    hex::encode(hasher.finalize())
}
