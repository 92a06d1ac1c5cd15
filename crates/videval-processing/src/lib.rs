//! Videval Processing Library
//!
//! File tiering, subtitle slicing, video cutting, segmentation, deletion and
//! crowdsourcing submission built on top of the storage and db crates.

pub mod deletion;
pub mod error;
pub mod files;
pub mod segmentation;
pub mod submission;
pub mod subtitles;
pub mod video;

// Re-export commonly used types
pub use deletion::{DeletionReport, DeletionService, FileDeleteFailure};
pub use error::{MediaError, MediaResult};
pub use files::{FileService, LocalFile};
pub use segmentation::{SegmentationPipeline, SUBTITLES_SUBDIRECTORY, VIDEO_SUBDIRECTORY};
pub use submission::{
    AssignmentStatus, CreatedJob, JobRequest, RemoteAssignment, SubmissionGateway,
    SubmissionService,
};
pub use subtitles::{Cue, SubtitleFormat, SubtitleTrack};
pub use video::{FfmpegCutter, VideoCutter};
