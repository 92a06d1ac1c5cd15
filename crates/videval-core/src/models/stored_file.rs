use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A content-addressed file record.
///
/// `relative_path` is the canonical location under the media root and never
/// changes; it also derives the remote key. Once `remote_bucket`/`remote_key`
/// are set the local copy is gone and [`StoredFile::local_path`] returns `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub content_hash: String,
    pub display_name: String,
    pub relative_path: String,
    pub remote_bucket: Option<String>,
    pub remote_key: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn is_remote(&self) -> bool {
        self.remote_bucket.is_some() && self.remote_key.is_some()
    }

    /// Path relative to the media root, if the authoritative copy is local.
    pub fn local_path(&self) -> Option<&str> {
        if self.is_remote() {
            None
        } else {
            Some(&self.relative_path)
        }
    }

    pub fn remote_location(&self) -> Option<(&str, &str)> {
        match (&self.remote_bucket, &self.remote_key) {
            (Some(bucket), Some(key)) => Some((bucket.as_str(), key.as_str())),
            _ => None,
        }
    }

    /// Lower-cased extension of the stored path, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.relative_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// Human readable location used in deletion reports.
    pub fn location(&self) -> String {
        match self.remote_location() {
            Some((bucket, key)) => format!("s3://{}/{}", bucket, key),
            None => self.relative_path.clone(),
        }
    }
}
