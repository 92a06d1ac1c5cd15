//! Database transaction utilities
//!
//! SQLite defers taking the write lock until the first write, so two deferred
//! transactions can both read a reference count and then race to delete.
//! [`WriteTransaction`] starts with `BEGIN IMMEDIATE` instead, taking the write
//! lock up front so a count check and the delete that depends on it are
//! serialized against every other writer.

use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::ops::{Deref, DerefMut};
use videval_core::AppError;

/// A write-locked transaction.
///
/// Dropping it without [`commit`](Self::commit) rolls back.
///
/// ```ignore
/// let mut tx = WriteTransaction::begin(&pool).await?;
/// let refs = files.reference_count_tx(&mut tx, hash).await?;
/// files.delete_tx(&mut tx, hash).await?;
/// tx.commit().await?;
/// ```
pub struct WriteTransaction {
    transaction: Transaction<'static, Sqlite>,
}

impl WriteTransaction {
    pub async fn begin(pool: &SqlitePool) -> Result<Self, AppError> {
        let transaction = pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(Self { transaction })
    }

    pub async fn commit(self) -> Result<(), AppError> {
        self.transaction.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<(), AppError> {
        self.transaction.rollback().await?;
        Ok(())
    }
}

impl Deref for WriteTransaction {
    type Target = SqliteConnection;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

impl DerefMut for WriteTransaction {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::test_pool;

    async fn count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM datasets")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn insert(conn: &mut SqliteConnection) {
        sqlx::query("INSERT INTO datasets (id, name, created_at) VALUES (?, 'd', ?)")
            .bind(uuid::Uuid::new_v4())
            .bind(chrono::Utc::now())
            .execute(conn)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_commit_persists() {
        let (pool, _dir) = test_pool().await;
        let mut tx = WriteTransaction::begin(&pool).await.unwrap();
        insert(&mut tx).await;
        tx.commit().await.unwrap();
        assert_eq!(count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard() {
        let (pool, _dir) = test_pool().await;

        let mut tx = WriteTransaction::begin(&pool).await.unwrap();
        insert(&mut tx).await;
        tx.rollback().await.unwrap();

        {
            let mut tx = WriteTransaction::begin(&pool).await.unwrap();
            insert(&mut tx).await;
        }

        assert_eq!(count(&pool).await, 0);
    }
}
