use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::CutInterval;

/// One clip cut out of a dataset video, covering `[start_secs, end_secs)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub dataset_video_id: Uuid,
    pub video_hash: String,
    pub subtitles_hash: Option<String>,
    pub start_secs: f64,
    pub end_secs: Option<f64>,
    /// Index of the cut in the parent's interval list.
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

impl Segment {
    pub fn interval(&self) -> CutInterval {
        CutInterval {
            start: self.start_secs,
            end: self.end_secs,
        }
    }

    pub fn file_hashes(&self) -> Vec<&str> {
        let mut hashes = vec![self.video_hash.as_str()];
        hashes.extend(self.subtitles_hash.as_deref());
        hashes
    }
}
