use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CutInterval, StatusMessage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Uuid,
    pub name: String,
    pub owner: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A source video attached to a dataset, with its optional audio and subtitle
/// tracks and the cuts to produce from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetVideo {
    pub id: Uuid,
    pub dataset_id: Uuid,
    pub name: String,
    pub video_hash: String,
    pub audio_hash: Option<String>,
    pub subtitles_hash: Option<String>,
    pub cut_intervals: Vec<CutInterval>,
    pub is_segmented: bool,
    pub messages: Vec<StatusMessage>,
    pub created_at: DateTime<Utc>,
}

impl DatasetVideo {
    /// Hashes of every file this video references, primary video first.
    pub fn file_hashes(&self) -> Vec<&str> {
        let mut hashes = vec![self.video_hash.as_str()];
        hashes.extend(self.audio_hash.as_deref());
        hashes.extend(self.subtitles_hash.as_deref());
        hashes
    }
}
