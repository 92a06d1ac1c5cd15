//! Dataset and dataset video repositories.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;
use videval_core::{AppError, CutInterval, Dataset, DatasetVideo, StatusMessage};

/// Row type for datasets table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct DatasetRow {
    pub id: Uuid,
    pub name: String,
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DatasetRow {
    pub fn to_dataset(self) -> Dataset {
        Dataset {
            id: self.id,
            name: self.name,
            owner: self.owner,
            created_at: self.created_at,
        }
    }
}

#[derive(Clone)]
pub struct DatasetRepository {
    pool: SqlitePool,
}

impl DatasetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self), fields(db.table = "datasets", db.operation = "insert"))]
    pub async fn create(&self, name: &str, owner: Option<&str>) -> Result<Dataset, AppError> {
        let row: DatasetRow = sqlx::query_as::<Sqlite, DatasetRow>(
            r#"
            INSERT INTO datasets (id, name, owner, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, name, owner, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(owner)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.to_dataset())
    }

    #[tracing::instrument(skip(self), fields(db.table = "datasets", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Dataset>, AppError> {
        let row: Option<DatasetRow> = sqlx::query_as::<Sqlite, DatasetRow>(
            "SELECT id, name, owner, created_at FROM datasets WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.to_dataset()))
    }

    /// Oldest dataset with this name, if any.
    #[tracing::instrument(skip(self), fields(db.table = "datasets"))]
    pub async fn find_by_name(&self, name: &str) -> Result<Option<Dataset>, AppError> {
        let row: Option<DatasetRow> = sqlx::query_as::<Sqlite, DatasetRow>(
            "SELECT id, name, owner, created_at FROM datasets WHERE name = ? ORDER BY created_at LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.to_dataset()))
    }
}

/// Fields needed to attach a video to a dataset.
#[derive(Debug, Clone)]
pub struct NewDatasetVideo {
    pub dataset_id: Uuid,
    pub name: String,
    pub video_hash: String,
    pub audio_hash: Option<String>,
    pub subtitles_hash: Option<String>,
    pub cut_intervals: Vec<CutInterval>,
}

/// Row type for dataset_videos table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct DatasetVideoRow {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub name: String,
    pub video_hash: String,
    pub audio_hash: Option<String>,
    pub subtitles_hash: Option<String>,
    pub cut_intervals: Json<Vec<CutInterval>>,
    pub is_segmented: bool,
    pub messages: Json<Vec<StatusMessage>>,
    pub created_at: DateTime<Utc>,
}

impl DatasetVideoRow {
    pub fn to_dataset_video(self) -> DatasetVideo {
        DatasetVideo {
            id: self.id,
            dataset_id: self.dataset_id,
            name: self.name,
            video_hash: self.video_hash,
            audio_hash: self.audio_hash,
            subtitles_hash: self.subtitles_hash,
            cut_intervals: self.cut_intervals.0,
            is_segmented: self.is_segmented,
            messages: self.messages.0,
            created_at: self.created_at,
        }
    }
}

const VIDEO_COLUMNS: &str = "id, dataset_id, name, video_hash, audio_hash, subtitles_hash, \
                             cut_intervals, is_segmented, messages, created_at";

#[derive(Clone)]
pub struct DatasetVideoRepository {
    pool: SqlitePool,
}

impl DatasetVideoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Attach a video to a dataset.
    ///
    /// Attaching the same video content twice to one dataset fails with
    /// [`AppError::AlreadyExists`].
    #[tracing::instrument(skip(self, new), fields(db.table = "dataset_videos", db.operation = "insert"))]
    pub async fn create(&self, new: NewDatasetVideo) -> Result<DatasetVideo, AppError> {
        let row: DatasetVideoRow = sqlx::query_as::<Sqlite, DatasetVideoRow>(&format!(
            r#"
            INSERT INTO dataset_videos
                (id, dataset_id, name, video_hash, audio_hash, subtitles_hash, cut_intervals, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            VIDEO_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.dataset_id)
        .bind(&new.name)
        .bind(&new.video_hash)
        .bind(&new.audio_hash)
        .bind(&new.subtitles_hash)
        .bind(Json(&new.cut_intervals))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::AlreadyExists(_) => AppError::AlreadyExists(format!(
                "video {} is already part of dataset {}",
                new.video_hash, new.dataset_id
            )),
            other => other,
        })?;
        Ok(row.to_dataset_video())
    }

    #[tracing::instrument(skip(self), fields(db.table = "dataset_videos", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<DatasetVideo>, AppError> {
        let row: Option<DatasetVideoRow> = sqlx::query_as::<Sqlite, DatasetVideoRow>(&format!(
            "SELECT {} FROM dataset_videos WHERE id = ?",
            VIDEO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.to_dataset_video()))
    }

    #[tracing::instrument(skip(self, conn), fields(db.table = "dataset_videos", db.record_id = %id))]
    pub async fn get_tx(
        &self,
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<Option<DatasetVideo>, AppError> {
        let row: Option<DatasetVideoRow> = sqlx::query_as::<Sqlite, DatasetVideoRow>(&format!(
            "SELECT {} FROM dataset_videos WHERE id = ?",
            VIDEO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(row.map(|r| r.to_dataset_video()))
    }

    pub async fn require(&self, id: Uuid) -> Result<DatasetVideo, AppError> {
        self.get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("dataset video {}", id)))
    }

    #[tracing::instrument(skip(self), fields(db.table = "dataset_videos"))]
    pub async fn list_for_dataset(&self, dataset_id: Uuid) -> Result<Vec<DatasetVideo>, AppError> {
        let rows: Vec<DatasetVideoRow> = sqlx::query_as::<Sqlite, DatasetVideoRow>(&format!(
            "SELECT {} FROM dataset_videos WHERE dataset_id = ? ORDER BY created_at",
            VIDEO_COLUMNS
        ))
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.to_dataset_video()).collect())
    }

    /// Replace the cut list. Clears the segmented flag since existing segments
    /// no longer match.
    #[tracing::instrument(skip(self, cuts), fields(db.table = "dataset_videos", db.record_id = %id))]
    pub async fn set_cut_intervals(&self, id: Uuid, cuts: &[CutInterval]) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE dataset_videos SET cut_intervals = ?, is_segmented = 0 WHERE id = ?",
        )
        .bind(Json(cuts))
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("dataset video {}", id)));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "dataset_videos", db.record_id = %id))]
    pub async fn set_segmented(&self, id: Uuid, is_segmented: bool) -> Result<(), AppError> {
        sqlx::query("UPDATE dataset_videos SET is_segmented = ? WHERE id = ?")
            .bind(is_segmented)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Append a status message without rewriting the rest of the row.
    #[tracing::instrument(skip(self, message), fields(db.table = "dataset_videos", db.record_id = %id))]
    pub async fn push_message(&self, id: Uuid, message: &StatusMessage) -> Result<(), AppError> {
        sqlx::query("UPDATE dataset_videos SET messages = json_insert(messages, '$[#]', json(?)) WHERE id = ?")
            .bind(serde_json::to_string(message)?)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "dataset_videos", db.record_id = %id))]
    pub async fn clear_messages(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE dataset_videos SET messages = '[]' WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete the row; its segments go with it.
    #[tracing::instrument(skip(self, conn), fields(db.table = "dataset_videos", db.operation = "delete"))]
    pub async fn delete_tx(&self, conn: &mut SqliteConnection, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM dataset_videos WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
