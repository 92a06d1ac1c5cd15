//! Attaching uploaded files to a dataset.

use std::path::{Path, PathBuf};
use videval_core::{AppError, AppResult, CutInterval, DatasetVideo};
use videval_db::NewDatasetVideo;
use videval_processing::{SubtitleTrack, SUBTITLES_SUBDIRECTORY, VIDEO_SUBDIRECTORY};

use crate::state::AppState;

pub const AUDIO_SUBDIRECTORY: &str = "audio_files";

#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Dataset name; created on first use.
    pub dataset: String,
    pub video: PathBuf,
    pub audio: Option<PathBuf>,
    pub subtitles: Option<PathBuf>,
    pub cut_intervals: Vec<CutInterval>,
    pub owner: Option<String>,
}

/// Store the request's files and attach them to the dataset as a new video.
///
/// Subtitles are parsed up front so a malformed track is rejected before
/// anything is written. Segmentation is not started; the caller enqueues it.
#[tracing::instrument(skip(state, request), fields(dataset = %request.dataset))]
pub async fn ingest_video(state: &AppState, request: IngestRequest) -> AppResult<DatasetVideo> {
    if let Some(path) = &request.subtitles {
        SubtitleTrack::load(path).await?;
    }

    let owner = request.owner.as_deref();
    let dataset = match state.datasets.find_by_name(&request.dataset).await? {
        Some(dataset) => dataset,
        None => state.datasets.create(&request.dataset, owner).await?,
    };

    let name = display_name(&request.video)?;
    let video = state
        .files
        .store_path(&request.video, &name, VIDEO_SUBDIRECTORY, owner, None)
        .await?;
    let audio = match &request.audio {
        Some(path) => Some(
            state
                .files
                .store_path(path, &display_name(path)?, AUDIO_SUBDIRECTORY, owner, None)
                .await?,
        ),
        None => None,
    };
    let subtitles = match &request.subtitles {
        Some(path) => Some(
            state
                .files
                .store_path(path, &display_name(path)?, SUBTITLES_SUBDIRECTORY, owner, None)
                .await?,
        ),
        None => None,
    };

    let dataset_video = state
        .videos
        .create(NewDatasetVideo {
            dataset_id: dataset.id,
            name,
            video_hash: video.content_hash,
            audio_hash: audio.map(|f| f.content_hash),
            subtitles_hash: subtitles.map(|f| f.content_hash),
            cut_intervals: request.cut_intervals,
        })
        .await?;

    tracing::info!(dataset_video_id = %dataset_video.id, "Video ingested");
    Ok(dataset_video)
}

fn display_name(path: &Path) -> AppResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::InvalidInput(format!("{} is not a file path", path.display())))
}
