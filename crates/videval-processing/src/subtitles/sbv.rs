use super::{blocks, parse_timestamp, regex, Cue};
use crate::error::{MediaError, MediaResult};

const TIMING: &str = r"^\d+:\d{2}:\d{2}\.\d{3},\d+:\d{2}:\d{2}\.\d{3}$";

/// An SBV block opens with `start,end` on one line.
pub(super) fn looks_like(block: &[&str]) -> MediaResult<bool> {
    Ok(!block.is_empty() && regex(TIMING)?.is_match(block[0].trim()))
}

pub(super) fn parse(text: &str) -> MediaResult<Vec<Cue>> {
    blocks(text)
        .into_iter()
        .map(|block| {
            let timing = block[0].trim();
            let valid = looks_like(&block)?;
            let (start, end) = match timing.split_once(',') {
                Some(parts) if valid => parts,
                _ => {
                    return Err(MediaError::subtitles(format!(
                        "malformed SBV block starting '{}'",
                        timing
                    )))
                }
            };
            Ok(Cue::new(
                parse_timestamp(start)?,
                Some(parse_timestamp(end)?),
                block[1..].join("\n"),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blocks() {
        let text = "0:00:00.000,0:00:05.000\nhi\n\n0:00:20.000,0:00:25.000\nbye\n";
        assert_eq!(
            parse(text).unwrap(),
            vec![
                Cue::new(0.0, Some(5.0), "hi"),
                Cue::new(20.0, Some(25.0), "bye"),
            ]
        );
    }
}
