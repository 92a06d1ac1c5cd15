use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

/// One requested cut, in seconds from the start of the source.
///
/// Serialized as `[start]` or `[start, end]`; a missing end runs to the end of
/// the source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct CutInterval {
    pub start: f64,
    pub end: Option<f64>,
}

impl CutInterval {
    pub fn new(start: f64, end: Option<f64>) -> Result<Self, AppError> {
        if !start.is_finite() || start < 0.0 {
            return Err(AppError::InvalidInput(format!(
                "cut start must be a non-negative number, got {}",
                start
            )));
        }
        if let Some(end) = end {
            if !end.is_finite() || end <= start {
                return Err(AppError::InvalidInput(format!(
                    "cut end {} must be greater than start {}",
                    end, start
                )));
            }
        }
        Ok(Self { start, end })
    }

    /// The interval used when a video has no cuts: the whole source.
    pub fn whole() -> Self {
        Self {
            start: 0.0,
            end: None,
        }
    }

    pub fn duration(&self) -> Option<f64> {
        self.end.map(|end| end - self.start)
    }

    /// Parse a JSON list such as `[[0, 10], [15]]`.
    pub fn parse_list(json: &str) -> Result<Vec<CutInterval>, AppError> {
        serde_json::from_str::<Vec<CutInterval>>(json)
            .map_err(|e| AppError::InvalidInput(format!("invalid cut intervals: {}", e)))
    }

    /// The cuts to run, falling back to the whole source.
    pub fn or_whole(cuts: &[CutInterval]) -> Vec<CutInterval> {
        if cuts.is_empty() {
            vec![CutInterval::whole()]
        } else {
            cuts.to_vec()
        }
    }
}

impl TryFrom<Vec<f64>> for CutInterval {
    type Error = AppError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        match values.as_slice() {
            [start] => CutInterval::new(*start, None),
            [start, end] => CutInterval::new(*start, Some(*end)),
            other => Err(AppError::InvalidInput(format!(
                "a cut must have 1 or 2 elements, got {}",
                other.len()
            ))),
        }
    }
}

impl From<CutInterval> for Vec<f64> {
    fn from(cut: CutInterval) -> Self {
        match cut.end {
            Some(end) => vec![cut.start, end],
            None => vec![cut.start],
        }
    }
}

impl fmt::Display for CutInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "[{}, {})", self.start, end),
            None => write!(f, "[{}, end)", self.start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_ints_and_floats() {
        let cuts = CutInterval::parse_list("[[0, 10], [15.5]]").unwrap();
        assert_eq!(cuts.len(), 2);
        assert_eq!(cuts[0], CutInterval::new(0.0, Some(10.0)).unwrap());
        assert_eq!(cuts[1].start, 15.5);
        assert_eq!(cuts[1].end, None);
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(CutInterval::parse_list("[[]]").is_err());
        assert!(CutInterval::parse_list("[[1, 2, 3]]").is_err());
        assert!(CutInterval::parse_list("[[\"a\"]]").is_err());
        assert!(CutInterval::parse_list("{\"start\": 1}").is_err());
    }

    #[test]
    fn test_rejects_inverted_and_negative() {
        assert!(CutInterval::parse_list("[[10, 5]]").is_err());
        assert!(CutInterval::parse_list("[[5, 5]]").is_err());
        assert!(CutInterval::parse_list("[[-1]]").is_err());
    }

    #[test]
    fn test_serializes_as_arrays() {
        let cuts = vec![
            CutInterval::new(0.0, Some(10.0)).unwrap(),
            CutInterval::new(15.0, None).unwrap(),
        ];
        assert_eq!(serde_json::to_string(&cuts).unwrap(), "[[0.0,10.0],[15.0]]");
    }

    #[test]
    fn test_default_is_whole_source() {
        assert_eq!(CutInterval::or_whole(&[]), vec![CutInterval::whole()]);
        assert_eq!(CutInterval::whole().duration(), None);
    }
}
