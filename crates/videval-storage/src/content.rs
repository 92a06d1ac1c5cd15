//! Content-addressed local file tree.

use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::keys;
use crate::traits::{StorageError, StorageResult};

const TMP_DIR: &str = "tmp";
const TRASH_DIR: &str = "trash";
const CHUNK_SIZE: usize = 64 * 1024;

/// Result of [`ContentStore::store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredContent {
    pub display_name: String,
    pub relative_path: String,
    pub content_hash: String,
    pub size_bytes: u64,
    /// `false` when identical content was already in the tree.
    pub created: bool,
}

/// Local media root holding files under their content hash.
#[derive(Clone, Debug)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Open (and create if needed) a media root with its staging directories.
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        for dir in [root.clone(), root.join(TMP_DIR), root.join(TRASH_DIR)] {
            fs::create_dir_all(&dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join(TMP_DIR)
    }

    /// Absolute path of a relative content path.
    pub fn path_of(&self, relative_path: &str) -> StorageResult<PathBuf> {
        keys::validate_key(relative_path)?;
        Ok(self.root.join(relative_path))
    }

    /// A fresh, empty temp file in the staging area, removed when dropped.
    pub fn temp_path(&self, suffix: &str) -> StorageResult<TempPath> {
        let file = tempfile::Builder::new()
            .prefix("work-")
            .suffix(suffix)
            .tempfile_in(self.tmp_dir())?;
        Ok(file.into_temp_path())
    }

    /// Stream `reader` into the tree while hashing it.
    ///
    /// The data is staged in `tmp/` and moved into place with a no-clobber rename.
    /// If the destination already exists the staged copy is discarded, which is
    /// what makes identical uploads converge on one file.
    pub async fn store<R>(
        &self,
        mut reader: R,
        display_name: &str,
        subdirectory: &str,
    ) -> StorageResult<StoredContent>
    where
        R: AsyncRead + Unpin + Send,
    {
        let start = std::time::Instant::now();
        let staging = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(self.tmp_dir())?;

        let mut out = fs::File::from_std(staging.as_file().try_clone()?);
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut size_bytes: u64 = 0;

        loop {
            let n = reader.read(&mut buf).await.map_err(|e| {
                StorageError::UploadFailed(format!("Failed to read upload stream: {}", e))
            })?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            out.write_all(&buf[..n]).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write staging file {}: {}",
                    staging.path().display(),
                    e
                ))
            })?;
            size_bytes += n as u64;
        }
        out.flush().await?;
        out.sync_all().await?;
        drop(out);

        let content_hash = hex::encode(hasher.finalize());
        let relative_path = keys::content_path(subdirectory, &content_hash, display_name);
        let dest = self.path_of(&relative_path)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let created = persist_noclobber(staging, &dest)?;

        tracing::info!(
            content_hash = %content_hash,
            path = %relative_path,
            size_bytes,
            created,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Content stored"
        );

        Ok(StoredContent {
            display_name: display_name.to_string(),
            relative_path,
            content_hash,
            size_bytes,
            created,
        })
    }

    /// Store the contents of an existing file.
    pub async fn store_file(
        &self,
        path: &Path,
        display_name: &str,
        subdirectory: &str,
    ) -> StorageResult<StoredContent> {
        let file = fs::File::open(path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to open {}: {}", path.display(), e))
        })?;
        self.store(file, display_name, subdirectory).await
    }

    pub async fn exists(&self, relative_path: &str) -> StorageResult<bool> {
        let path = self.path_of(relative_path)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    /// Delete a file from the tree. Returns `false` if it was already gone.
    pub async fn remove(&self, relative_path: &str) -> StorageResult<bool> {
        let path = self.path_of(relative_path)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %relative_path, "Local file deleted");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Move a file into `trash/` so its deletion can still be undone.
    ///
    /// Returns `None` if the file does not exist.
    pub async fn stage_removal(&self, relative_path: &str) -> StorageResult<Option<StagedRemoval>> {
        let original = self.path_of(relative_path)?;
        let staged = self.root.join(TRASH_DIR).join(Uuid::new_v4().to_string());
        match fs::rename(&original, &staged).await {
            Ok(()) => Ok(Some(StagedRemoval { original, staged })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                original.display(),
                e
            ))),
        }
    }
}

fn persist_noclobber(staging: NamedTempFile, dest: &Path) -> StorageResult<bool> {
    match staging.persist_noclobber(dest) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            // identical content is already in place; dropping the handle removes the copy
            drop(e.file);
            Ok(false)
        }
        Err(e) => {
            let error = e.error;
            drop(e.file);
            Err(StorageError::UploadFailed(format!(
                "Failed to move staged file to {}: {}",
                dest.display(),
                error
            )))
        }
    }
}

/// A local file parked in the trash by [`ContentStore::stage_removal`].
#[derive(Debug)]
#[must_use = "a staged removal must be restored or purged"]
pub struct StagedRemoval {
    original: PathBuf,
    staged: PathBuf,
}

impl StagedRemoval {
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Put the file back where it was.
    pub async fn restore(self) -> StorageResult<()> {
        if let Some(parent) = self.original.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&self.staged, &self.original).await?;
        Ok(())
    }

    /// Delete the parked file for good.
    pub async fn purge(self) -> StorageResult<()> {
        match fs::remove_file(&self.staged).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn count_files(dir: &Path) -> usize {
        let mut count = 0;
        let mut stack = vec![dir.to_path_buf()];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await.unwrap();
            while let Some(entry) = entries.next_entry().await.unwrap() {
                if entry.file_type().await.unwrap().is_dir() {
                    stack.push(entry.path());
                } else {
                    count += 1;
                }
            }
        }
        count
    }

    #[tokio::test]
    async fn test_store_places_file_by_hash() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path()).await.unwrap();

        let stored = store
            .store(&b"hello world"[..], "Greeting.TXT", "docs")
            .await
            .unwrap();

        // md5("hello world")
        assert_eq!(stored.content_hash, "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(
            stored.relative_path,
            "docs/5/e/5eb63bbbe01eeed093cb22bb8f5acdc3.txt"
        );
        assert!(stored.created);
        assert_eq!(stored.size_bytes, 11);

        let on_disk = fs::read(store.path_of(&stored.relative_path).unwrap())
            .await
            .unwrap();
        assert_eq!(on_disk, b"hello world");
    }

    #[tokio::test]
    async fn test_store_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path()).await.unwrap();

        let first = store.store(&b"same bytes"[..], "a.mp4", "video_files").await.unwrap();
        let second = store.store(&b"same bytes"[..], "a.mp4", "video_files").await.unwrap();

        assert_eq!(first.relative_path, second.relative_path);
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(count_files(&dir.path().join("video_files")).await, 1);
        assert_eq!(count_files(&store.tmp_dir()).await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_identical_stores_converge() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path()).await.unwrap();

        let (a, b) = tokio::join!(
            store.store(&b"racing"[..], "r.vtt", "subs_files"),
            store.store(&b"racing"[..], "r.vtt", "subs_files"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.relative_path, b.relative_path);
        assert!(a.created ^ b.created);
        assert_eq!(count_files(&dir.path().join("subs_files")).await, 1);
    }

    #[tokio::test]
    async fn test_stage_restore_and_purge() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path()).await.unwrap();
        let stored = store.store(&b"bytes"[..], "x.csv", "subs_files").await.unwrap();

        let staged = store.stage_removal(&stored.relative_path).await.unwrap().unwrap();
        assert!(!store.exists(&stored.relative_path).await.unwrap());
        staged.restore().await.unwrap();
        assert!(store.exists(&stored.relative_path).await.unwrap());

        let staged = store.stage_removal(&stored.relative_path).await.unwrap().unwrap();
        staged.purge().await.unwrap();
        assert!(!store.exists(&stored.relative_path).await.unwrap());
        assert!(store.stage_removal(&stored.relative_path).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path()).await.unwrap();
        assert!(!store.remove("video_files/0/0/00.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let store = ContentStore::new(dir.path()).await.unwrap();
        assert!(matches!(
            store.exists("../../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.remove("/etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
