//! Stored file repository: CRUD and reference counting for `stored_files`.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};
use videval_core::{AppError, StoredFile};

const COLUMNS: &str =
    "content_hash, display_name, relative_path, remote_bucket, remote_key, created_by, created_at";

/// Sum of all five foreign keys that can point at a stored file.
const REFERENCE_COUNT_SQL: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM dataset_videos WHERE video_hash = ?1)
      + (SELECT COUNT(*) FROM dataset_videos WHERE audio_hash = ?1)
      + (SELECT COUNT(*) FROM dataset_videos WHERE subtitles_hash = ?1)
      + (SELECT COUNT(*) FROM segments WHERE video_hash = ?1)
      + (SELECT COUNT(*) FROM segments WHERE subtitles_hash = ?1)
"#;

/// Row type for stored_files table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct StoredFileRow {
    pub content_hash: String,
    pub display_name: String,
    pub relative_path: String,
    pub remote_bucket: Option<String>,
    pub remote_key: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredFileRow {
    pub fn to_stored_file(self) -> StoredFile {
        StoredFile {
            content_hash: self.content_hash,
            display_name: self.display_name,
            relative_path: self.relative_path,
            remote_bucket: self.remote_bucket,
            remote_key: self.remote_key,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

#[derive(Clone)]
pub struct StoredFileRepository {
    pool: SqlitePool,
}

impl StoredFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Atomic get-or-create keyed by content hash.
    ///
    /// An existing row keeps its path and tier; only a missing owner is
    /// backfilled from `created_by`.
    #[tracing::instrument(skip(self), fields(db.table = "stored_files", db.operation = "upsert"))]
    pub async fn upsert(
        &self,
        content_hash: &str,
        display_name: &str,
        relative_path: &str,
        created_by: Option<&str>,
    ) -> Result<StoredFile, AppError> {
        let row: StoredFileRow = sqlx::query_as::<Sqlite, StoredFileRow>(&format!(
            r#"
            INSERT INTO stored_files (content_hash, display_name, relative_path, created_by, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (content_hash) DO UPDATE
                SET created_by = COALESCE(stored_files.created_by, excluded.created_by)
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(content_hash)
        .bind(display_name)
        .bind(relative_path)
        .bind(created_by)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.to_stored_file())
    }

    #[tracing::instrument(skip(self), fields(db.table = "stored_files"))]
    pub async fn get(&self, content_hash: &str) -> Result<Option<StoredFile>, AppError> {
        let row: Option<StoredFileRow> = sqlx::query_as::<Sqlite, StoredFileRow>(&format!(
            "SELECT {} FROM stored_files WHERE content_hash = ?",
            COLUMNS
        ))
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.to_stored_file()))
    }

    #[tracing::instrument(skip(self, conn), fields(db.table = "stored_files"))]
    pub async fn get_tx(
        &self,
        conn: &mut SqliteConnection,
        content_hash: &str,
    ) -> Result<Option<StoredFile>, AppError> {
        let row: Option<StoredFileRow> = sqlx::query_as::<Sqlite, StoredFileRow>(&format!(
            "SELECT {} FROM stored_files WHERE content_hash = ?",
            COLUMNS
        ))
        .bind(content_hash)
        .fetch_optional(conn)
        .await?;
        Ok(row.map(|r| r.to_stored_file()))
    }

    /// Fetch a file that must exist.
    pub async fn require(&self, content_hash: &str) -> Result<StoredFile, AppError> {
        self.get(content_hash)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("stored file {}", content_hash)))
    }

    /// Record that the file now lives on the remote tier.
    #[tracing::instrument(skip(self), fields(db.table = "stored_files", db.operation = "update"))]
    pub async fn set_remote(
        &self,
        content_hash: &str,
        bucket: &str,
        key: &str,
    ) -> Result<StoredFile, AppError> {
        let row: StoredFileRow = sqlx::query_as::<Sqlite, StoredFileRow>(&format!(
            r#"
            UPDATE stored_files SET remote_bucket = ?, remote_key = ?
            WHERE content_hash = ?
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(bucket)
        .bind(key)
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("stored file {}", content_hash)))?;
        Ok(row.to_stored_file())
    }

    /// Number of dataset video and segment references to this file.
    #[tracing::instrument(skip(self), fields(db.table = "stored_files"))]
    pub async fn reference_count(&self, content_hash: &str) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(REFERENCE_COUNT_SQL)
            .bind(content_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[tracing::instrument(skip(self, conn), fields(db.table = "stored_files"))]
    pub async fn reference_count_tx(
        &self,
        conn: &mut SqliteConnection,
        content_hash: &str,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(REFERENCE_COUNT_SQL)
            .bind(content_hash)
            .fetch_one(conn)
            .await?;
        Ok(count)
    }

    /// Files nothing points at any more.
    #[tracing::instrument(skip(self, conn), fields(db.table = "stored_files"))]
    pub async fn list_unreferenced_tx(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<StoredFile>, AppError> {
        let rows: Vec<StoredFileRow> = sqlx::query_as::<Sqlite, StoredFileRow>(&format!(
            r#"
            SELECT {} FROM stored_files f
            WHERE NOT EXISTS (
                SELECT 1 FROM dataset_videos v
                WHERE v.video_hash = f.content_hash
                   OR v.audio_hash = f.content_hash
                   OR v.subtitles_hash = f.content_hash
            )
            AND NOT EXISTS (
                SELECT 1 FROM segments s
                WHERE s.video_hash = f.content_hash
                   OR s.subtitles_hash = f.content_hash
            )
            ORDER BY f.created_at
            "#,
            COLUMNS
        ))
        .fetch_all(conn)
        .await?;
        Ok(rows.into_iter().map(|r| r.to_stored_file()).collect())
    }

    #[tracing::instrument(skip(self, conn), fields(db.table = "stored_files", db.operation = "delete"))]
    pub async fn delete_tx(
        &self,
        conn: &mut SqliteConnection,
        content_hash: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM stored_files WHERE content_hash = ?")
            .bind(content_hash)
            .execute(conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;

    const HASH: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";

    #[tokio::test]
    async fn test_upsert_converges_and_backfills_owner() {
        let (pool, _dir) = test_pool().await;
        let repo = StoredFileRepository::new(pool);

        let first = repo
            .upsert(HASH, "a.mp4", "video_files/5/e/x.mp4", None)
            .await
            .unwrap();
        assert_eq!(first.created_by, None);

        let second = repo
            .upsert(HASH, "b.mp4", "video_files/5/e/other.mp4", Some("alice"))
            .await
            .unwrap();
        assert_eq!(second.display_name, "a.mp4");
        assert_eq!(second.relative_path, "video_files/5/e/x.mp4");
        assert_eq!(second.created_by.as_deref(), Some("alice"));

        let third = repo
            .upsert(HASH, "a.mp4", "video_files/5/e/x.mp4", Some("bob"))
            .await
            .unwrap();
        assert_eq!(third.created_by.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_set_remote() {
        let (pool, _dir) = test_pool().await;
        let repo = StoredFileRepository::new(pool);
        repo.upsert(HASH, "a.mp4", "video_files/5/e/x.mp4", None)
            .await
            .unwrap();

        let remote = repo.set_remote(HASH, "bucket", "p/video_files/5/e/x.mp4").await.unwrap();
        assert!(remote.is_remote());
        assert_eq!(remote.local_path(), None);

        assert!(matches!(
            repo.set_remote("ffff", "bucket", "k").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unreferenced_file_has_zero_references() {
        let (pool, _dir) = test_pool().await;
        let repo = StoredFileRepository::new(pool.clone());
        repo.upsert(HASH, "a.mp4", "video_files/5/e/x.mp4", None)
            .await
            .unwrap();

        assert_eq!(repo.reference_count(HASH).await.unwrap(), 0);
        let mut conn = pool.acquire().await.unwrap();
        let orphans = repo.list_unreferenced_tx(&mut conn).await.unwrap();
        assert_eq!(orphans.len(), 1);
        assert!(repo.delete_tx(&mut conn, HASH).await.unwrap());
        assert!(repo.get(HASH).await.unwrap().is_none());
    }
}
