use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;
use videval_core::{AppError, Segment};

const COLUMNS: &str =
    "id, dataset_video_id, video_hash, subtitles_hash, start_secs, end_secs, position, created_at";

#[derive(Debug, Clone)]
pub struct NewSegment {
    pub dataset_video_id: Uuid,
    pub video_hash: String,
    pub subtitles_hash: Option<String>,
    pub start_secs: f64,
    pub end_secs: Option<f64>,
    pub position: i64,
}

/// Row type for segments table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct SegmentRow {
    pub id: Uuid,
    pub dataset_video_id: Uuid,
    pub video_hash: String,
    pub subtitles_hash: Option<String>,
    pub start_secs: f64,
    pub end_secs: Option<f64>,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

impl SegmentRow {
    pub fn to_segment(self) -> Segment {
        Segment {
            id: self.id,
            dataset_video_id: self.dataset_video_id,
            video_hash: self.video_hash,
            subtitles_hash: self.subtitles_hash,
            start_secs: self.start_secs,
            end_secs: self.end_secs,
            position: self.position,
            created_at: self.created_at,
        }
    }
}

#[derive(Clone)]
pub struct SegmentRepository {
    pool: SqlitePool,
}

impl SegmentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[tracing::instrument(skip(self, new), fields(db.table = "segments", db.operation = "insert"))]
    pub async fn create(&self, new: NewSegment) -> Result<Segment, AppError> {
        let row: SegmentRow = sqlx::query_as::<Sqlite, SegmentRow>(&format!(
            r#"
            INSERT INTO segments
                (id, dataset_video_id, video_hash, subtitles_hash, start_secs, end_secs, position, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(new.dataset_video_id)
        .bind(&new.video_hash)
        .bind(&new.subtitles_hash)
        .bind(new.start_secs)
        .bind(new.end_secs)
        .bind(new.position)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.to_segment())
    }

    #[tracing::instrument(skip(self), fields(db.table = "segments", db.record_id = %id))]
    pub async fn get(&self, id: Uuid) -> Result<Option<Segment>, AppError> {
        let row: Option<SegmentRow> = sqlx::query_as::<Sqlite, SegmentRow>(&format!(
            "SELECT {} FROM segments WHERE id = ?",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.to_segment()))
    }

    #[tracing::instrument(skip(self, conn), fields(db.table = "segments", db.record_id = %id))]
    pub async fn get_tx(
        &self,
        conn: &mut SqliteConnection,
        id: Uuid,
    ) -> Result<Option<Segment>, AppError> {
        let row: Option<SegmentRow> = sqlx::query_as::<Sqlite, SegmentRow>(&format!(
            "SELECT {} FROM segments WHERE id = ?",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;
        Ok(row.map(|r| r.to_segment()))
    }

    /// Segments of one video in cut order.
    #[tracing::instrument(skip(self), fields(db.table = "segments"))]
    pub async fn list_for_video(&self, dataset_video_id: Uuid) -> Result<Vec<Segment>, AppError> {
        let rows: Vec<SegmentRow> = sqlx::query_as::<Sqlite, SegmentRow>(&format!(
            "SELECT {} FROM segments WHERE dataset_video_id = ? ORDER BY position",
            COLUMNS
        ))
        .bind(dataset_video_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.to_segment()).collect())
    }

    #[tracing::instrument(skip(self, conn), fields(db.table = "segments"))]
    pub async fn list_for_video_tx(
        &self,
        conn: &mut SqliteConnection,
        dataset_video_id: Uuid,
    ) -> Result<Vec<Segment>, AppError> {
        let rows: Vec<SegmentRow> = sqlx::query_as::<Sqlite, SegmentRow>(&format!(
            "SELECT {} FROM segments WHERE dataset_video_id = ? ORDER BY position",
            COLUMNS
        ))
        .bind(dataset_video_id)
        .fetch_all(conn)
        .await?;
        Ok(rows.into_iter().map(|r| r.to_segment()).collect())
    }

    /// Every segment of every video in a dataset.
    #[tracing::instrument(skip(self), fields(db.table = "segments"))]
    pub async fn list_for_dataset(&self, dataset_id: Uuid) -> Result<Vec<Segment>, AppError> {
        let rows: Vec<SegmentRow> = sqlx::query_as::<Sqlite, SegmentRow>(
            r#"
            SELECT s.id, s.dataset_video_id, s.video_hash, s.subtitles_hash,
                   s.start_secs, s.end_secs, s.position, s.created_at
            FROM segments s
            JOIN dataset_videos v ON v.id = s.dataset_video_id
            WHERE v.dataset_id = ?
            ORDER BY v.created_at, s.position
            "#,
        )
        .bind(dataset_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.to_segment()).collect())
    }

    /// Drop the segment rows of a video. Their files are left for vacuum.
    #[tracing::instrument(skip(self), fields(db.table = "segments", db.operation = "delete"))]
    pub async fn delete_for_video(&self, dataset_video_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM segments WHERE dataset_video_id = ?")
            .bind(dataset_video_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    #[tracing::instrument(skip(self, conn), fields(db.table = "segments", db.operation = "delete"))]
    pub async fn delete_tx(&self, conn: &mut SqliteConnection, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM segments WHERE id = ?")
            .bind(id)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;
    use crate::{DatasetRepository, DatasetVideoRepository, NewDatasetVideo, StoredFileRepository};

    async fn video(pool: &SqlitePool) -> Uuid {
        let files = StoredFileRepository::new(pool.clone());
        for hash in ["src", "seg0", "seg1"] {
            files
                .upsert(hash, "f.mp4", &format!("video_files/{}.mp4", hash), None)
                .await
                .unwrap();
        }
        let dataset = DatasetRepository::new(pool.clone())
            .create("d", None)
            .await
            .unwrap();
        DatasetVideoRepository::new(pool.clone())
            .create(NewDatasetVideo {
                dataset_id: dataset.id,
                name: "f.mp4".into(),
                video_hash: "src".into(),
                audio_hash: None,
                subtitles_hash: None,
                cut_intervals: vec![],
            })
            .await
            .unwrap()
            .id
    }

    fn new_segment(dataset_video_id: Uuid, hash: &str, position: i64) -> NewSegment {
        NewSegment {
            dataset_video_id,
            video_hash: hash.to_string(),
            subtitles_hash: None,
            start_secs: position as f64 * 10.0,
            end_secs: if position == 0 { Some(10.0) } else { None },
            position,
        }
    }

    #[tokio::test]
    async fn test_list_in_position_order() {
        let (pool, _dir) = test_pool().await;
        let video_id = video(&pool).await;
        let repo = SegmentRepository::new(pool.clone());

        repo.create(new_segment(video_id, "seg1", 1)).await.unwrap();
        repo.create(new_segment(video_id, "seg0", 0)).await.unwrap();

        let segments = repo.list_for_video(video_id).await.unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].video_hash, "seg0");
        assert_eq!(segments[0].end_secs, Some(10.0));
        assert_eq!(segments[1].end_secs, None);

        let files = StoredFileRepository::new(pool);
        assert_eq!(files.reference_count("seg0").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_for_video_keeps_files() {
        let (pool, _dir) = test_pool().await;
        let video_id = video(&pool).await;
        let repo = SegmentRepository::new(pool.clone());
        repo.create(new_segment(video_id, "seg0", 0)).await.unwrap();

        assert_eq!(repo.delete_for_video(video_id).await.unwrap(), 1);
        assert!(repo.list_for_video(video_id).await.unwrap().is_empty());

        let files = StoredFileRepository::new(pool);
        assert!(files.get("seg0").await.unwrap().is_some());
        assert_eq!(files.reference_count("seg0").await.unwrap(), 0);
    }
}
