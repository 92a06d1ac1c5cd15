//! Extension to MIME type table used when publishing files to the remote tier.

use std::path::Path;

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("aac", "audio/aac"),
    ("vtt", "text/vtt"),
    ("csv", "text/csv"),
    ("srt", "text/plain"),
];

/// Look up the content type for a file name by its extension (case-insensitive).
///
/// Unknown extensions yield `None`, meaning no content-type override is sent.
pub fn content_type_for(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(content_type_for("clip.mp4"), Some("video/mp4"));
        assert_eq!(content_type_for("a/b/track.MP3"), Some("audio/mpeg"));
        assert_eq!(content_type_for("subs.srt"), Some("text/plain"));
        assert_eq!(content_type_for("subs.vtt"), Some("text/vtt"));
    }

    #[test]
    fn test_unknown_or_missing_extension() {
        assert_eq!(content_type_for("movie.mkv"), None);
        assert_eq!(content_type_for("README"), None);
    }
}
