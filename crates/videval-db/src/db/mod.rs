//! Database repositories for the data access layer
//!
//! Each repository owns one table family. Methods with a `_tx` suffix run on a
//! caller-supplied connection so several steps can share one write transaction.

pub mod dataset;
pub mod pool;
pub mod project;
pub(crate) mod schema;
pub mod segment;
pub mod stored_file;
pub mod transaction;

pub use dataset::{DatasetRepository, DatasetVideoRepository, NewDatasetVideo};
pub use project::ProjectRepository;
pub use segment::{NewSegment, SegmentRepository};
pub use stored_file::StoredFileRepository;

#[cfg(test)]
pub(crate) mod test_support {
    use sqlx::SqlitePool;
    use tempfile::TempDir;

    /// A migrated database in a temporary directory.
    pub async fn test_pool() -> (SqlitePool, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}?mode=rwc", dir.path().join("test.db").display());
        let pool = super::pool::connect(&url, 4, 5).await.unwrap();
        super::pool::migrate(&pool).await.unwrap();
        (pool, dir)
    }
}
