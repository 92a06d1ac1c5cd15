//! Shared path generation for the content tree.
//!
//! Path format: `{subdirectory}/{h0}/{h1}/{hash}{.ext}` with a lower-cased extension.

use std::path::Path;

use crate::traits::{StorageError, StorageResult};

/// Relative path of content with the given hash, keeping the extension of
/// `display_name`.
pub fn content_path(subdirectory: &str, content_hash: &str, display_name: &str) -> String {
    let mut chars = content_hash.chars();
    let h0 = chars.next().unwrap_or('0');
    let h1 = chars.next().unwrap_or('0');
    let ext = Path::new(display_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!(
        "{}/{}/{}/{}{}",
        subdirectory.trim_matches('/'),
        h0,
        h1,
        content_hash,
        ext
    )
}

/// Reject keys that could escape the media root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split(['/', '\\']).any(|part| part == "..")
    {
        return Err(StorageError::InvalidKey(format!(
            "storage key '{}' contains invalid characters",
            key
        )));
    }
    Ok(())
}
