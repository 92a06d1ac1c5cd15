//! Subtitle ingestion, slicing and WebVTT output.
//!
//! Sources may be WebVTT, SRT, SBV or a four column CSV
//! (`id, start_seconds, end_seconds, text`). Whatever the source, sliced tracks
//! are written back out as WebVTT.

mod csv;
mod sbv;
mod srt;
mod timestamp;
mod vtt;

use regex::Regex;

use crate::error::{MediaError, MediaResult};

pub use timestamp::{format_timestamp, parse_timestamp};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A single caption.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub start: f64,
    /// A cue without an end has none after slicing either.
    pub end: Option<f64>,
    pub text: String,
}

impl Cue {
    pub fn new(start: f64, end: Option<f64>, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }

    fn intersects(&self, start: f64, end: Option<f64>) -> bool {
        let before_end = end.map_or(true, |end| self.start < end);
        let after_start = match self.end {
            Some(cue_end) => cue_end > start,
            None => self.start >= start,
        };
        before_end && after_start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    WebVtt,
    Srt,
    Sbv,
    Csv,
}

impl SubtitleFormat {
    /// Guess the format from the decoded text.
    pub fn detect(text: &str) -> MediaResult<Self> {
        let first_line = text.lines().next().unwrap_or_default();
        if first_line.split_whitespace().next() == Some("WEBVTT") {
            return Ok(SubtitleFormat::WebVtt);
        }
        let first_block = blocks(text).into_iter().next().unwrap_or_default();
        if srt::looks_like(&first_block)? {
            Ok(SubtitleFormat::Srt)
        } else if sbv::looks_like(&first_block)? {
            Ok(SubtitleFormat::Sbv)
        } else {
            Ok(SubtitleFormat::Csv)
        }
    }
}

/// A parsed subtitle track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleTrack {
    pub cues: Vec<Cue>,
}

impl SubtitleTrack {
    pub fn new(cues: Vec<Cue>) -> Self {
        Self { cues }
    }

    /// Decode and parse raw subtitle bytes.
    ///
    /// Returns `None` for an empty file.
    pub fn parse(bytes: &[u8]) -> MediaResult<Option<Self>> {
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        let text = std::str::from_utf8(bytes)
            .map_err(|e| MediaError::subtitles(format!("subtitles are not UTF-8: {}", e)))?;
        if text.trim().is_empty() {
            return Ok(None);
        }

        let format = SubtitleFormat::detect(text)?;
        let cues = match format {
            SubtitleFormat::WebVtt => vtt::parse(text)?,
            SubtitleFormat::Srt => srt::parse(text)?,
            SubtitleFormat::Sbv => sbv::parse(text)?,
            SubtitleFormat::Csv => csv::parse(text)?,
        };
        tracing::debug!(?format, cues = cues.len(), "Subtitles parsed");
        Ok(Some(Self { cues }))
    }

    pub async fn load(path: &std::path::Path) -> MediaResult<Option<Self>> {
        let bytes = tokio::fs::read(path).await?;
        Self::parse(&bytes)
    }

    /// Cues intersecting `[start, end)`, shifted so `start` becomes zero.
    ///
    /// A cue starting before the window starts at zero; ends are only shifted.
    pub fn slice(&self, start: f64, end: Option<f64>) -> SubtitleTrack {
        let cues = self
            .cues
            .iter()
            .filter(|cue| cue.intersects(start, end))
            .map(|cue| Cue {
                start: (cue.start - start).max(0.0),
                end: cue.end.map(|e| e - start),
                text: cue.text.clone(),
            })
            .collect();
        SubtitleTrack { cues }
    }

    /// Serialize as WebVTT. A cue without an end is written as zero length.
    pub fn to_webvtt(&self) -> String {
        let mut out = String::from("WEBVTT\n");
        for cue in &self.cues {
            out.push('\n');
            out.push_str(&format_timestamp(cue.start));
            out.push_str(" --> ");
            out.push_str(&format_timestamp(cue.end.unwrap_or(cue.start)));
            out.push('\n');
            out.push_str(&cue.text);
            out.push('\n');
        }
        out
    }
}

/// Split text into blank-line separated blocks of trimmed lines.
pub(crate) fn blocks(text: &str) -> Vec<Vec<&str>> {
    let mut blocks = Vec::new();
    let mut current = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

pub(crate) fn regex(pattern: &str) -> MediaResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| MediaError::subtitles(format!("invalid pattern {}: {}", pattern, e)))
}

/// Parse a `start --> end [settings]` line.
pub(crate) fn parse_timing(line: &str) -> MediaResult<(f64, Option<f64>)> {
    let (start, rest) = line
        .split_once("-->")
        .ok_or_else(|| MediaError::subtitles(format!("missing '-->' in '{}'", line)))?;
    let end = rest
        .split_whitespace()
        .next()
        .ok_or_else(|| MediaError::subtitles(format!("missing end time in '{}'", line)))?;
    Ok((parse_timestamp(start)?, Some(parse_timestamp(end)?)))
}
