use super::{blocks, parse_timing, regex, Cue};
use crate::error::{MediaError, MediaResult};

const TIMING: &str = r"^\d+:\d{2}:\d{2}[,.]\d{3}\s+-->\s+\d+:\d{2}:\d{2}[,.]\d{3}";

/// An SRT block is a numeric index followed by a timing line.
pub(super) fn looks_like(block: &[&str]) -> MediaResult<bool> {
    if block.len() < 2 {
        return Ok(false);
    }
    let index = block[0].trim();
    Ok(!index.is_empty()
        && index.chars().all(|c| c.is_ascii_digit())
        && regex(TIMING)?.is_match(block[1].trim()))
}

pub(super) fn parse(text: &str) -> MediaResult<Vec<Cue>> {
    blocks(text)
        .into_iter()
        .map(|block| {
            if !looks_like(&block)? {
                return Err(MediaError::subtitles(format!(
                    "malformed SRT block starting '{}'",
                    block[0]
                )));
            }
            let (start, end) = parse_timing(block[1])?;
            Ok(Cue::new(start, end, block[2..].join("\n")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blocks() {
        let text = "1\r\n00:00:01,000 --> 00:00:02,000\r\nhello\r\n\r\n2\r\n00:00:03,500 --> 00:00:04,000\r\nworld\r\nagain\r\n";
        assert_eq!(
            parse(text).unwrap(),
            vec![
                Cue::new(1.0, Some(2.0), "hello"),
                Cue::new(3.5, Some(4.0), "world\nagain"),
            ]
        );
    }

    #[test]
    fn test_malformed_block_is_rejected() {
        let text = "1\n00:00:01,000 --> 00:00:02,000\nhello\n\nnot a block\n";
        assert!(parse(text).is_err());
    }
}
