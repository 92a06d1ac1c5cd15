//! Cue timestamp parsing and formatting.

use crate::error::{MediaError, MediaResult};

/// Parse `HH:MM:SS.mmm`, `MM:SS.mmm` or `H:MM:SS,mmm` into seconds.
pub fn parse_timestamp(text: &str) -> MediaResult<f64> {
    let text = text.trim().replace(',', ".");
    let parts: Vec<&str> = text.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => return Err(MediaError::subtitles(format!("bad timestamp '{}'", text))),
    };

    let bad = || MediaError::subtitles(format!("bad timestamp '{}'", text));
    let hours: u64 = hours.parse().map_err(|_| bad())?;
    let minutes: u64 = minutes.parse().map_err(|_| bad())?;
    if minutes >= 60 || !seconds.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return Err(bad());
    }
    let seconds: f64 = seconds.parse().map_err(|_| bad())?;
    if seconds >= 60.0 {
        return Err(bad());
    }
    let whole = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60))
        .ok_or_else(|| MediaError::subtitles(format!("timestamp out of range '{}'", text)))?;
    Ok(whole as f64 + seconds)
}

/// Format seconds as a WebVTT timestamp, `HH:MM:SS.mmm`.
pub fn format_timestamp(secs: f64) -> String {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    let (hours, rest) = (total_ms / 3_600_000, total_ms % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (seconds, millis) = (rest / 1000, rest % 1000);
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, seconds, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variants() {
        assert_eq!(parse_timestamp("00:00:12.500").unwrap(), 12.5);
        assert_eq!(parse_timestamp("01:02.250").unwrap(), 62.25);
        assert_eq!(parse_timestamp("1:00:00,500").unwrap(), 3600.5);
        assert!(parse_timestamp("12").is_err());
        assert!(parse_timestamp("00:61:00.000").is_err());
        assert!(parse_timestamp("aa:00:00.000").is_err());
    }

    #[test]
    fn test_huge_hours_are_rejected() {
        let err = parse_timestamp("9999999999999999999:00:00.000").unwrap_err();
        assert!(err.to_string().contains("out of range"), "{}", err);
        assert!(parse_timestamp("99999999999999999999:00:00.000").is_err());
        assert_eq!(parse_timestamp("100:00:00.000").unwrap(), 360_000.0);
    }

    #[test]
    fn test_format_rounds_to_millis() {
        assert_eq!(format_timestamp(0.0), "00:00:00.000");
        assert_eq!(format_timestamp(5.0), "00:00:05.000");
        assert_eq!(format_timestamp(3723.4567), "01:02:03.457");
        assert_eq!(format_timestamp(-1.0), "00:00:00.000");
    }
}
