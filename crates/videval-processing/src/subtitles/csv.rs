//! Four column CSV subtitles: `id, start_seconds, end_seconds, text`.
//!
//! The delimiter is sniffed among comma, semicolon and tab, and a header row is
//! skipped when its time columns are not numbers.

use super::Cue;
use crate::error::{MediaError, MediaResult};

const DELIMITERS: [char; 3] = [',', ';', '\t'];
const SNIFF_LINES: usize = 5;

pub(super) fn parse(text: &str) -> MediaResult<Vec<Cue>> {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let delimiter = sniff_delimiter(&lines);
    let mut rows = lines.iter().map(|line| split_row(line, delimiter)).peekable();

    if rows.peek().is_some_and(|row| is_header(row)) {
        rows.next();
    }

    rows.map(|row| {
        if row.len() < 4 {
            return Err(MediaError::subtitles("Bad CSV file"));
        }
        let seconds = |field: &str| {
            field.trim().parse::<f64>().map_err(|_| {
                MediaError::subtitles(format!("Bad CSV file: '{}' is not a time in seconds", field))
            })
        };
        Ok(Cue::new(
            seconds(&row[1])?,
            Some(seconds(&row[2])?),
            row[3].clone(),
        ))
    })
    .collect()
}

/// The candidate that splits the first lines into the same number (at least
/// four) of columns; comma otherwise.
fn sniff_delimiter(lines: &[&str]) -> char {
    let sample = &lines[..lines.len().min(SNIFF_LINES)];
    DELIMITERS
        .into_iter()
        .find(|&delimiter| {
            let mut counts = sample.iter().map(|line| split_row(line, delimiter).len());
            match counts.next() {
                Some(first) if first >= 4 => counts.all(|n| n == first),
                _ => false,
            }
        })
        .unwrap_or(',')
}

fn is_header(row: &[String]) -> bool {
    row.iter()
        .skip(1)
        .take(2)
        .any(|field| field.trim().parse::<f64>().is_err())
}

/// Split one line, honouring double quotes and `""` escapes.
fn split_row(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => fields.push(std::mem::take(&mut field)),
            c => field.push(c),
        }
    }
    fields.push(field);
    fields
}
