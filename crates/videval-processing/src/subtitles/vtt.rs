use super::{blocks, parse_timing, Cue};
use crate::error::MediaResult;

const NON_CUE_BLOCKS: [&str; 3] = ["NOTE", "STYLE", "REGION"];

pub(super) fn parse(text: &str) -> MediaResult<Vec<Cue>> {
    let mut cues = Vec::new();
    for (index, block) in blocks(text).into_iter().enumerate() {
        if index == 0 && block[0].starts_with("WEBVTT") {
            continue;
        }
        if NON_CUE_BLOCKS.iter().any(|kw| block[0].starts_with(kw)) {
            continue;
        }
        // optional cue identifier before the timing line
        let Some(timing_at) = block.iter().take(2).position(|l| l.contains("-->")) else {
            continue;
        };
        let (start, end) = parse_timing(block[timing_at])?;
        cues.push(Cue::new(start, end, block[timing_at + 1..].join("\n")));
    }
    Ok(cues)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_ids_notes_and_settings() {
        let text = "WEBVTT\n\nNOTE a comment\n\nintro\n00:00:01.000 --> 00:00:02.500 align:start\nfirst\nline two\n\n00:03.000 --> 00:04.000\nsecond\n";
        let cues = parse(text).unwrap();
        assert_eq!(
            cues,
            vec![
                Cue::new(1.0, Some(2.5), "first\nline two"),
                Cue::new(3.0, Some(4.0), "second"),
            ]
        );
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        assert!(parse("WEBVTT\n\n00:00:xx --> 00:00:02.000\nhi\n").is_err());
    }
}
