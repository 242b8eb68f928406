use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{ForecastError, Result};

/// Quantile level strictly inside (0, 1)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct QuantileLevel(f64);

impl QuantileLevel {
    pub const MEDIAN: QuantileLevel = QuantileLevel(0.5);

    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(ForecastError::Config(format!(
                "quantile level must be in (0, 1), got {}",
                value
            )))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Default interval levels: 10th, 50th and 90th percentiles
    pub fn defaults() -> Vec<QuantileLevel> {
        vec![QuantileLevel(0.1), QuantileLevel(0.5), QuantileLevel(0.9)]
    }
}

impl TryFrom<f64> for QuantileLevel {
    type Error = ForecastError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<QuantileLevel> for f64 {
    fn from(level: QuantileLevel) -> f64 {
        level.0
    }
}

impl PartialEq for QuantileLevel {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for QuantileLevel {}

impl PartialOrd for QuantileLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QuantileLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for QuantileLevel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for QuantileLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{:.2}", self.0)
    }
}

/// Predicted range for one day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastInterval {
    pub date: NaiveDate,
    pub lower: f64,
    pub median: f64,
    pub upper: f64,
}

impl ForecastInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }

    pub fn is_ordered(&self) -> bool {
        self.lower <= self.median && self.median <= self.upper
    }
}

/// A lower/upper crossing that was corrected before output
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuantileCrossing {
    pub date: NaiveDate,
    pub lower: f64,
    pub upper: f64,
}

/// Point-forecast accuracy on one held-out fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub fold_label: String,
    pub mae: f64,
    pub rmse: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_level_bounds() {
        assert!(QuantileLevel::new(0.0).is_err());
        assert!(QuantileLevel::new(1.0).is_err());
        assert!(QuantileLevel::new(f64::NAN).is_err());
        assert_eq!(QuantileLevel::new(0.25).unwrap().value(), 0.25);
    }

    #[test]
    fn test_quantile_level_ordering() {
        let mut levels = vec![
            QuantileLevel::new(0.9).unwrap(),
            QuantileLevel::new(0.1).unwrap(),
            QuantileLevel::MEDIAN,
        ];
        levels.sort();
        assert_eq!(levels, QuantileLevel::defaults());
        assert_eq!(QuantileLevel::MEDIAN.to_string(), "q0.50");
    }

    #[test]
    fn test_quantile_level_serde_rejects_out_of_range() {
        let level: QuantileLevel = serde_json::from_str("0.1").unwrap();
        assert_eq!(level.value(), 0.1);
        assert!(serde_json::from_str::<QuantileLevel>("1.5").is_err());
    }

    #[test]
    fn test_interval_helpers() {
        let interval = ForecastInterval {
            date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            lower: 90.0,
            median: 100.0,
            upper: 120.0,
        };
        assert_eq!(interval.width(), 30.0);
        assert!(interval.contains(120.0));
        assert!(!interval.contains(121.0));
        assert!(interval.is_ordered());
    }
}
