//! Cutting clips out of a source video with FFmpeg.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use videval_core::CutInterval;

use crate::error::{MediaError, MediaResult};

/// Produces one standalone clip per call.
#[async_trait]
pub trait VideoCutter: Send + Sync {
    /// Cut `interval` out of `video`, muxing in `audio` when the source keeps
    /// its soundtrack separately. Returns the size of the written file.
    async fn cut(
        &self,
        video: &Path,
        audio: Option<&Path>,
        interval: CutInterval,
        output: &Path,
    ) -> MediaResult<u64>;
}

/// [`VideoCutter`] running the `ffmpeg` binary under a wall-clock timeout.
#[derive(Debug, Clone)]
pub struct FfmpegCutter {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegCutter {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Arguments for one cut. Video is always re-encoded so clips starting between
/// keyframes still decode.
pub fn build_cut_args(
    video: &Path,
    audio: Option<&Path>,
    interval: CutInterval,
    output: &Path,
) -> Vec<String> {
    let window = |args: &mut Vec<String>| {
        args.push("-ss".to_string());
        args.push(format!("{:.3}", interval.start));
        if let Some(duration) = interval.duration() {
            args.push("-t".to_string());
            args.push(format!("{:.3}", duration));
        }
    };

    let mut args = vec!["-y".to_string(), "-v".to_string(), "error".to_string()];
    window(&mut args);
    args.push("-i".to_string());
    args.push(video.to_string_lossy().to_string());

    match audio {
        Some(audio) => {
            window(&mut args);
            args.push("-i".to_string());
            args.push(audio.to_string_lossy().to_string());
            args.extend(["-map", "0:v:0", "-map", "1:a:0"].map(String::from));
        }
        None => args.extend(["-map", "0:v:0", "-map", "0:a?"].map(String::from)),
    }

    args.extend(
        [
            "-c:v", "libx264", "-preset", "veryfast", "-crf", "20", "-pix_fmt", "yuv420p",
            "-c:a", "aac", "-b:a", "128k", "-movflags", "+faststart",
        ]
        .map(String::from),
    );
    args.push(output.to_string_lossy().to_string());
    args
}

#[async_trait]
impl VideoCutter for FfmpegCutter {
    async fn cut(
        &self,
        video: &Path,
        audio: Option<&Path>,
        interval: CutInterval,
        output: &Path,
    ) -> MediaResult<u64> {
        let args = build_cut_args(video, audio, interval, output);
        tracing::debug!("Running FFmpeg: {} {}", self.ffmpeg_path.display(), args.join(" "));
        let start = Instant::now();

        let child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MediaError::ffmpeg_failed(
                    format!("failed to start {}: {}", self.ffmpeg_path.display(), e),
                    None,
                    None,
                )
            })?;

        // dropping the wait future on timeout kills the child
        let result = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.timeout.as_secs(),
                    output = %output.display(),
                    "FFmpeg timed out, process killed"
                );
                Err(MediaError::Timeout(self.timeout.as_secs()))
            }
            Ok(Err(e)) => Err(MediaError::Io(e)),
            Ok(Ok(out)) if !out.status.success() => Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(String::from_utf8_lossy(&out.stderr).to_string()),
                out.status.code(),
            )),
            Ok(Ok(_)) => match tokio::fs::metadata(output).await {
                Ok(meta) if meta.len() > 0 => Ok(meta.len()),
                _ => Err(MediaError::EmptyOutput(output.display().to_string())),
            },
        };

        match result {
            Ok(size_bytes) => {
                tracing::info!(
                    interval = %interval,
                    size_bytes,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Clip cut"
                );
                Ok(size_bytes)
            }
            Err(e) => {
                remove_partial(output).await;
                Err(e)
            }
        }
    }
}

async fn remove_partial(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => tracing::debug!(output = %output.display(), "Partial output removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            output = %output.display(),
            error = %e,
            "Failed to remove partial output"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(args: &[String], value: &str) -> Vec<usize> {
        args.iter()
            .enumerate()
            .filter(|(_, a)| a.as_str() == value)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_args_with_separate_audio() {
        let cut = CutInterval::new(10.0, Some(25.0)).unwrap();
        let args = build_cut_args(
            Path::new("in.mp4"),
            Some(Path::new("in.wav")),
            cut,
            Path::new("out.mp4"),
        );

        let inputs = positions(&args, "-i");
        assert_eq!(inputs.len(), 2);
        assert_eq!(args[inputs[0] + 1], "in.mp4");
        assert_eq!(args[inputs[1] + 1], "in.wav");
        // each input is windowed
        assert_eq!(positions(&args, "-ss").len(), 2);
        assert_eq!(positions(&args, "15.000").len(), 2);
        assert!(args.windows(2).any(|w| w == ["-map", "1:a:0"]));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(!args.contains(&"copy".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_open_ended_cut_has_no_duration() {
        let cut = CutInterval::new(15.0, None).unwrap();
        let args = build_cut_args(Path::new("in.mp4"), None, cut, Path::new("out.mp4"));
        assert!(positions(&args, "-t").is_empty());
        assert!(args.windows(2).any(|w| w == ["-ss", "15.000"]));
        assert!(args.windows(2).any(|w| w == ["-map", "0:a?"]));
    }
}
