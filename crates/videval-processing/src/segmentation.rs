//! Cutting a dataset video into segments.

use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;
use videval_core::{AppResult, CutInterval, DatasetVideo, Segment, StoredFile};
use videval_db::{DatasetVideoRepository, NewSegment, SegmentRepository};
use videval_storage::RemoteTier;

use crate::files::FileService;
use crate::subtitles::SubtitleTrack;
use crate::video::VideoCutter;

pub const VIDEO_SUBDIRECTORY: &str = "video_files";
pub const SUBTITLES_SUBDIRECTORY: &str = "subs_files";

#[derive(Clone)]
pub struct SegmentationPipeline {
    files: FileService,
    videos: DatasetVideoRepository,
    segments: SegmentRepository,
    cutter: Arc<dyn VideoCutter>,
}

impl SegmentationPipeline {
    pub fn new(
        files: FileService,
        videos: DatasetVideoRepository,
        segments: SegmentRepository,
        cutter: Arc<dyn VideoCutter>,
    ) -> Self {
        Self {
            files,
            videos,
            segments,
            cutter,
        }
    }

    /// Replace the segments of a dataset video with fresh cuts.
    ///
    /// Intervals are cut in order and each segment is committed on its own, so
    /// a failure leaves earlier segments in place. Re-running starts over since
    /// existing segment rows are cleared first; their files are left for
    /// vacuum. The video is marked segmented, and its source files migrated to
    /// `tier`, only after every interval succeeded.
    #[tracing::instrument(skip(self, tier), fields(dataset_video_id = %dataset_video_id))]
    pub async fn run(
        &self,
        dataset_video_id: Uuid,
        tier: Option<&RemoteTier>,
    ) -> AppResult<Vec<Segment>> {
        let video = self.videos.require(dataset_video_id).await?;
        let repo = self.files.repository();
        let video_file = repo.require(&video.video_hash).await?;
        let audio_file = match &video.audio_hash {
            Some(hash) => Some(repo.require(hash).await?),
            None => None,
        };
        let subtitles_file = match &video.subtitles_hash {
            Some(hash) => Some(repo.require(hash).await?),
            None => None,
        };

        // parse before anything is cleared so bad subtitles leave old segments intact
        let subtitles = match &subtitles_file {
            Some(file) => {
                let local = self.files.local(file, tier).await?;
                SubtitleTrack::load(local.path()).await?
            }
            None => None,
        };

        let cleared = self.segments.delete_for_video(video.id).await?;
        tracing::debug!(cleared, "Previous segments cleared");

        let segments = {
            let local_video = self.files.local(&video_file, tier).await?;
            let local_audio = match &audio_file {
                Some(file) => Some(self.files.local(file, tier).await?),
                None => None,
            };

            let mut segments = Vec::new();
            for (position, interval) in CutInterval::or_whole(&video.cut_intervals)
                .into_iter()
                .enumerate()
            {
                let segment = self
                    .cut_one(
                        &video,
                        &video_file,
                        local_video.path(),
                        local_audio.as_ref().map(|a| a.path()),
                        subtitles.as_ref(),
                        interval,
                        position,
                        tier,
                    )
                    .await?;
                segments.push(segment);
            }
            segments
        };

        for file in [Some(&video_file), audio_file.as_ref(), subtitles_file.as_ref()]
            .into_iter()
            .flatten()
        {
            self.files.delocalize(file, tier).await?;
        }
        self.videos.set_segmented(video.id, true).await?;

        tracing::info!(segments = segments.len(), "Dataset video segmented");
        Ok(segments)
    }

    #[allow(clippy::too_many_arguments)]
    async fn cut_one(
        &self,
        video: &DatasetVideo,
        video_file: &StoredFile,
        video_path: &Path,
        audio_path: Option<&Path>,
        subtitles: Option<&SubtitleTrack>,
        interval: CutInterval,
        position: usize,
        tier: Option<&RemoteTier>,
    ) -> AppResult<Segment> {
        let owner = video_file.created_by.as_deref();
        let stem = Path::new(&video.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("segment");

        let clip = self.files.content().temp_path(".mp4")?;
        self.cutter.cut(video_path, audio_path, interval, &clip).await?;
        let clip_file = self
            .files
            .store_path(
                &clip,
                &format!("{}-{}.mp4", stem, position),
                VIDEO_SUBDIRECTORY,
                owner,
                tier,
            )
            .await?;
        drop(clip);

        let subtitles_file = match subtitles {
            Some(track) => {
                let vtt = track.slice(interval.start, interval.end).to_webvtt();
                Some(
                    self.files
                        .store(
                            vtt.as_bytes(),
                            &format!("{}-{}.vtt", stem, position),
                            SUBTITLES_SUBDIRECTORY,
                            owner,
                            tier,
                        )
                        .await?,
                )
            }
            None => None,
        };

        let segment = self
            .segments
            .create(NewSegment {
                dataset_video_id: video.id,
                video_hash: clip_file.content_hash,
                subtitles_hash: subtitles_file.map(|f| f.content_hash),
                start_secs: interval.start,
                end_secs: interval.end,
                position: position as i64,
            })
            .await?;
        tracing::debug!(position, interval = %interval, "Segment created");
        Ok(segment)
    }
}
