//! Error types for media operations.

use thiserror::Error;
use videval_core::AppError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("FFmpeg produced no output at {0}")]
    EmptyOutput(String),

    #[error("Invalid subtitles: {0}")]
    SubtitleParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn subtitles(message: impl Into<String>) -> Self {
        Self::SubtitleParse(message.into())
    }
}

impl From<MediaError> for AppError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::SubtitleParse(msg) => AppError::InvalidInput(msg),
            MediaError::FfmpegFailed {
                message,
                stderr: Some(stderr),
                ..
            } => AppError::Media(format!("{}: {}", message, stderr.trim())),
            other => AppError::Media(other.to_string()),
        }
    }
}
