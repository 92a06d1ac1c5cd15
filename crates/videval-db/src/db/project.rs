//! Projects, their submission tasks, and collected assignments.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Sqlite, SqlitePool};
use uuid::Uuid;
use videval_core::{
    AppError, Assignment, HitSettings, Project, StatusMessage, SubmissionTask, WorkerIdentity,
};

const PROJECT_COLUMNS: &str = "id, dataset_id, name, hit_settings, worker_identity, is_busy, \
                               is_started, batch_id, messages, created_at";
const TASK_COLUMNS: &str = "id, project_id, segment_id, remote_job_id, collected_at, created_at";
const ASSIGNMENT_COLUMNS: &str =
    "id, task_id, remote_assignment_id, worker_label, is_approved, result, created_at";

/// Row type for projects table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub name: String,
    pub hit_settings: Json<HitSettings>,
    pub worker_identity: String,
    pub is_busy: bool,
    pub is_started: bool,
    pub batch_id: Option<String>,
    pub messages: Json<Vec<StatusMessage>>,
    pub created_at: DateTime<Utc>,
}

impl ProjectRow {
    pub fn to_project(self) -> Result<Project, AppError> {
        Ok(Project {
            id: self.id,
            dataset_id: self.dataset_id,
            name: self.name,
            hit_settings: self.hit_settings.0,
            worker_identity: self.worker_identity.parse()?,
            is_busy: self.is_busy,
            is_started: self.is_started,
            batch_id: self.batch_id,
            messages: self.messages.0,
            created_at: self.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SubmissionTaskRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub segment_id: Uuid,
    pub remote_job_id: Option<String>,
    pub collected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SubmissionTaskRow {
    pub fn to_task(self) -> SubmissionTask {
        SubmissionTask {
            id: self.id,
            project_id: self.project_id,
            segment_id: self.segment_id,
            remote_job_id: self.remote_job_id,
            collected_at: self.collected_at,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AssignmentRow {
    pub id: Uuid,
    pub task_id: Uuid,
    pub remote_assignment_id: String,
    pub worker_label: Option<String>,
    pub is_approved: Option<bool>,
    pub result: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl AssignmentRow {
    pub fn to_assignment(self) -> Assignment {
        Assignment {
            id: self.id,
            task_id: self.task_id,
            remote_assignment_id: self.remote_assignment_id,
            worker_label: self.worker_label,
            is_approved: self.is_approved,
            result: self.result.0,
            created_at: self.created_at,
        }
    }
}

#[derive(Clone)]
pub struct ProjectRepository {
    pool: SqlitePool,
}

impl ProjectRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, hit_settings), fields(db.table = "projects", db.operation = "insert"))]
    pub async fn create(
        &self,
        dataset_id: Uuid,
        name: &str,
        hit_settings: &HitSettings,
        worker_identity: WorkerIdentity,
    ) -> Result<Project, AppError> {
        let row: ProjectRow = sqlx::query_as::<Sqlite, ProjectRow>(&format!(
            r#"
            INSERT INTO projects (id, dataset_id, name, hit_settings, worker_identity, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            PROJECT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(dataset_id)
        .bind(name)
        .bind(Json(hit_settings))
        .bind(worker_identity.as_str())
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        row.to_project()
    }

    #[tracing::instrument(skip(self), fields(db.table = "projects", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Project>, AppError> {
        let row: Option<ProjectRow> = sqlx::query_as::<Sqlite, ProjectRow>(&format!(
            "SELECT {} FROM projects WHERE id = ?",
            PROJECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| r.to_project()).transpose()
    }

    pub async fn require(&self, id: Uuid) -> Result<Project, AppError> {
        self.get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("project {}", id)))
    }

    /// Claim the project for background work. Returns `false` if another job
    /// already holds it.
    #[tracing::instrument(skip(self), fields(db.table = "projects", db.record_id = %id))]
    pub async fn try_mark_busy(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE projects SET is_busy = 1 WHERE id = ? AND is_busy = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Release the busy flag and replace the project's messages with the
    /// outcome of the job that held it. `started`/`batch_id` are only written
    /// when given.
    #[tracing::instrument(skip(self, messages), fields(db.table = "projects", db.record_id = %id))]
    pub async fn finish_job(
        &self,
        id: Uuid,
        messages: &[StatusMessage],
        started: Option<bool>,
        batch_id: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE projects
            SET is_busy = 0,
                messages = ?,
                is_started = COALESCE(?, is_started),
                batch_id = COALESCE(?, batch_id)
            WHERE id = ?
            "#,
        )
        .bind(Json(messages))
        .bind(started)
        .bind(batch_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Create a task for each segment not yet part of the project, then
    /// return every task in segment order.
    #[tracing::instrument(skip(self, segment_ids), fields(db.table = "submission_tasks"))]
    pub async fn ensure_tasks(
        &self,
        project_id: Uuid,
        segment_ids: &[Uuid],
    ) -> Result<Vec<SubmissionTask>, AppError> {
        let mut tx = self.pool.begin().await?;
        for segment_id in segment_ids {
            sqlx::query(
                r#"
                INSERT INTO submission_tasks (id, project_id, segment_id, created_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (project_id, segment_id) DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(project_id)
            .bind(segment_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        self.list_tasks(project_id).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "submission_tasks"))]
    pub async fn list_tasks(&self, project_id: Uuid) -> Result<Vec<SubmissionTask>, AppError> {
        let rows: Vec<SubmissionTaskRow> = sqlx::query_as::<Sqlite, SubmissionTaskRow>(&format!(
            "SELECT {} FROM submission_tasks WHERE project_id = ? ORDER BY created_at, id",
            TASK_COLUMNS
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.to_task()).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "submission_tasks", db.record_id = %task_id))]
    pub async fn set_remote_job_id(&self, task_id: Uuid, remote_job_id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE submission_tasks SET remote_job_id = ? WHERE id = ?")
            .bind(remote_job_id)
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "submission_tasks", db.record_id = %task_id))]
    pub async fn mark_collected(&self, task_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE submission_tasks SET collected_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Insert or refresh a collected assignment, keyed by task and remote id.
    #[tracing::instrument(skip(self, result), fields(db.table = "assignments", db.operation = "upsert"))]
    pub async fn upsert_assignment(
        &self,
        task_id: Uuid,
        remote_assignment_id: &str,
        worker_label: Option<&str>,
        is_approved: Option<bool>,
        result: &serde_json::Value,
    ) -> Result<Assignment, AppError> {
        let row: AssignmentRow = sqlx::query_as::<Sqlite, AssignmentRow>(&format!(
            r#"
            INSERT INTO assignments
                (id, task_id, remote_assignment_id, worker_label, is_approved, result, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (task_id, remote_assignment_id) DO UPDATE
                SET worker_label = excluded.worker_label,
                    is_approved = excluded.is_approved,
                    result = excluded.result
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(task_id)
        .bind(remote_assignment_id)
        .bind(worker_label)
        .bind(is_approved)
        .bind(Json(result))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.to_assignment())
    }

    #[tracing::instrument(skip(self), fields(db.table = "assignments"))]
    pub async fn list_assignments(&self, task_id: Uuid) -> Result<Vec<Assignment>, AppError> {
        let rows: Vec<AssignmentRow> = sqlx::query_as::<Sqlite, AssignmentRow>(&format!(
            "SELECT {} FROM assignments WHERE task_id = ? ORDER BY created_at",
            ASSIGNMENT_COLUMNS
        ))
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.to_assignment()).collect())
    }

    /// Stable per-project number for a remote worker, allocated on first sight
    /// starting at 1.
    #[tracing::instrument(skip(self, remote_worker_id), fields(db.table = "project_workers"))]
    pub async fn worker_number(&self, project_id: Uuid, remote_worker_id: &str) -> Result<i64, AppError> {
        let number: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO project_workers (project_id, remote_worker_id, number)
            VALUES (
                ?1, ?2,
                (SELECT COALESCE(MAX(number), 0) + 1 FROM project_workers WHERE project_id = ?1)
            )
            ON CONFLICT (project_id, remote_worker_id) DO UPDATE SET number = number
            RETURNING number
            "#,
        )
        .bind(project_id)
        .bind(remote_worker_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;
    use crate::DatasetRepository;

    fn settings() -> HitSettings {
        HitSettings::parse(
            r#"{
                "AssignmentDurationInSeconds": 600,
                "Reward": "0.10",
                "Title": "t",
                "Description": "d",
                "LifetimeInSeconds": 3600,
                "MaxAssignments": 2
            }"#,
        )
        .unwrap()
    }

    async fn project(pool: &SqlitePool, identity: WorkerIdentity) -> Project {
        let dataset = DatasetRepository::new(pool.clone())
            .create("d", None)
            .await
            .unwrap();
        ProjectRepository::new(pool.clone())
            .create(dataset.id, "p", &settings(), identity)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_round_trips_settings_and_identity() {
        let (pool, _dir) = test_pool().await;
        let created = project(&pool, WorkerIdentity::Numbered).await;
        let fetched = ProjectRepository::new(pool).require(created.id).await.unwrap();
        assert_eq!(fetched.hit_settings, settings());
        assert_eq!(fetched.worker_identity, WorkerIdentity::Numbered);
        assert!(!fetched.is_busy);
        assert!(!fetched.is_started);
    }

    #[tokio::test]
    async fn test_busy_flag_is_exclusive() {
        let (pool, _dir) = test_pool().await;
        let p = project(&pool, WorkerIdentity::Anonymous).await;
        let repo = ProjectRepository::new(pool);

        assert!(repo.try_mark_busy(p.id).await.unwrap());
        assert!(!repo.try_mark_busy(p.id).await.unwrap());

        repo.finish_job(p.id, &[StatusMessage::error("boom")], Some(true), Some("group-1"))
            .await
            .unwrap();
        let fetched = repo.require(p.id).await.unwrap();
        assert!(!fetched.is_busy);
        assert!(fetched.is_started);
        assert_eq!(fetched.batch_id.as_deref(), Some("group-1"));
        assert_eq!(fetched.messages, vec![StatusMessage::error("boom")]);

        assert!(repo.try_mark_busy(p.id).await.unwrap());
        repo.finish_job(p.id, &[], None, None).await.unwrap();
        let fetched = repo.require(p.id).await.unwrap();
        assert!(fetched.is_started);
        assert_eq!(fetched.batch_id.as_deref(), Some("group-1"));
        assert!(fetched.messages.is_empty());
    }

    #[tokio::test]
    async fn test_worker_numbers_are_stable_and_sequential() {
        let (pool, _dir) = test_pool().await;
        let p = project(&pool, WorkerIdentity::Numbered).await;
        let repo = ProjectRepository::new(pool);

        assert_eq!(repo.worker_number(p.id, "W-A").await.unwrap(), 1);
        assert_eq!(repo.worker_number(p.id, "W-B").await.unwrap(), 2);
        assert_eq!(repo.worker_number(p.id, "W-A").await.unwrap(), 1);
    }
}
