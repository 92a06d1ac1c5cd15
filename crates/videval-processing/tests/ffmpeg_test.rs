//! `FfmpegCutter` against shell scripts standing in for the ffmpeg binary.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use videval_core::CutInterval;
use videval_processing::{FfmpegCutter, MediaError, VideoCutter};

const LAST_ARG: &str = "for last; do :; done\n";

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}{}", LAST_ARG, body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// All scripts are written before any is executed, in a single test, so no
/// concurrent fork can hold a write handle to one of them.
#[tokio::test]
async fn test_ffmpeg_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let ok = script(dir.path(), "ok.sh", "printf 'clip bytes' > \"$last\"\n");
    let failing = script(dir.path(), "fail.sh", "echo 'Invalid data found' >&2\nexit 3\n");
    let empty = script(dir.path(), "empty.sh", ": > \"$last\"\n");
    let slow = script(dir.path(), "slow.sh", "printf 'partial' > \"$last\"\nexec sleep 10\n");

    let video = dir.path().join("in.mp4");
    std::fs::write(&video, b"source").unwrap();
    let output = dir.path().join("out.mp4");
    let cut = CutInterval::new(0.0, Some(5.0)).unwrap();
    let timeout = Duration::from_secs(1);

    let size = FfmpegCutter::new(&ok, timeout)
        .cut(&video, None, cut, &output)
        .await
        .unwrap();
    assert_eq!(size, 10);
    assert_eq!(std::fs::read(&output).unwrap(), b"clip bytes");

    let err = FfmpegCutter::new(&failing, timeout)
        .cut(&video, None, cut, &output)
        .await
        .unwrap_err();
    match err {
        MediaError::FfmpegFailed {
            stderr, exit_code, ..
        } => {
            assert_eq!(exit_code, Some(3));
            assert!(stderr.unwrap().contains("Invalid data found"));
        }
        other => panic!("expected FfmpegFailed, got {:?}", other),
    }
    assert!(!output.exists());

    let err = FfmpegCutter::new(&empty, timeout)
        .cut(&video, None, cut, &output)
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::EmptyOutput(_)));
    assert!(!output.exists());

    let started = std::time::Instant::now();
    let err = FfmpegCutter::new(&slow, timeout)
        .cut(&video, None, cut, &output)
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::Timeout(1)));
    assert!(err.to_string().contains("1 seconds"));
    assert!(started.elapsed() < Duration::from_secs(8));
    assert!(!output.exists());

    let err = FfmpegCutter::new(dir.path().join("missing"), timeout)
        .cut(&video, None, cut, &output)
        .await
        .unwrap_err();
    assert!(matches!(err, MediaError::FfmpegFailed { exit_code: None, .. }));
}
