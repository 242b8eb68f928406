use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::ObservationSeries;

/// Whether rolling windows end the day before the target or on it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAnchor {
    /// Windows cover the days strictly before the target date
    #[default]
    Exclusive,
    /// Windows end on (and include) the target date
    Inclusive,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LagFeatures {
    /// Count `lag_window` days before the target
    pub lag: Option<f64>,
    /// Mean per configured rolling window, in configuration order
    pub rolling: Vec<Option<f64>>,
}

/// Arithmetic mean of the `window` days ending on `end`; `None` if any day is unknown
pub fn rolling_mean<F>(lookup: &F, end: NaiveDate, window: usize) -> Option<f64>
where
    F: Fn(NaiveDate) -> Option<f64>,
{
    if window == 0 {
        return None;
    }
    let mut sum = 0.0;
    for offset in 0..window {
        sum += lookup(end - Duration::days(offset as i64))?;
    }
    Some(sum / window as f64)
}

/// Lag and rolling features for `target` from an arbitrary day lookup
pub fn lag_features_with<F>(
    lookup: &F,
    target: NaiveDate,
    lag_window: usize,
    rolling_windows: &[usize],
    anchor: WindowAnchor,
) -> LagFeatures
where
    F: Fn(NaiveDate) -> Option<f64>,
{
    let lag = if lag_window == 0 {
        None
    } else {
        lookup(target - Duration::days(lag_window as i64))
    };

    let window_end = match anchor {
        WindowAnchor::Exclusive => target - Duration::days(1),
        WindowAnchor::Inclusive => target,
    };

    let rolling = rolling_windows
        .iter()
        .map(|&window| rolling_mean(lookup, window_end, window))
        .collect();

    LagFeatures { lag, rolling }
}

/// Lag and rolling features for `target` from an observation series
pub fn lag_features(
    series: &ObservationSeries,
    target: NaiveDate,
    lag_window: usize,
    rolling_windows: &[usize],
    anchor: WindowAnchor,
) -> LagFeatures {
    lag_features_with(&|d| series.count_on(d), target, lag_window, rolling_windows, anchor)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ascending_series() -> ObservationSeries {
        // Day 1 = 100, day 2 = 102, ... day 20 = 138
        let counts: Vec<u32> = (0..20).map(|i| 100 + 2 * i).collect();
        ObservationSeries::from_counts(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), &counts)
    }

    fn nth_day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap() + Duration::days(n - 1)
    }

    #[test]
    fn test_day_fifteen_scenario() {
        let series = ascending_series();
        let f = lag_features(&series, nth_day(15), 1, &[7, 14], WindowAnchor::Exclusive);

        // Day 14 = 126
        assert_eq!(f.lag, Some(126.0));
        // Days 8..=14 = 114..=126
        let expected7 = (114..=126).step_by(2).map(|v| v as f64).sum::<f64>() / 7.0;
        assert_eq!(f.rolling[0], Some(expected7));
        // Days 1..=14 = 100..=126
        let expected14 = (100..=126).step_by(2).map(|v| v as f64).sum::<f64>() / 14.0;
        assert_eq!(f.rolling[1], Some(expected14));
    }

    #[test]
    fn test_insufficient_history_is_missing_not_zero() {
        let series = ascending_series();
        let f = lag_features(&series, nth_day(10), 1, &[7, 14], WindowAnchor::Exclusive);
        assert_eq!(f.lag, Some(116.0));
        assert!(f.rolling[0].is_some());
        assert_eq!(f.rolling[1], None);

        let first = lag_features(&series, nth_day(1), 1, &[7], WindowAnchor::Exclusive);
        assert_eq!(first.lag, None);
        assert_eq!(first.rolling, vec![None]);
    }

    #[test]
    fn test_exclusive_window_ignores_target_day() {
        let series = ascending_series();
        let exclusive = lag_features(&series, nth_day(15), 1, &[7], WindowAnchor::Exclusive);
        let inclusive = lag_features(&series, nth_day(15), 1, &[7], WindowAnchor::Inclusive);

        // Inclusive shifts the window forward by one day (+2 per day)
        assert_eq!(inclusive.rolling[0].unwrap() - exclusive.rolling[0].unwrap(), 2.0);
        assert_eq!(inclusive.lag, exclusive.lag);
    }

    #[test]
    fn test_rolling_mean_bounded_by_window() {
        let counts = [40, 7, 93, 12, 55, 3, 81, 29, 64, 18, 77, 5, 90, 36, 48, 61];
        let series = ObservationSeries::from_counts(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            &counts,
        );
        let last = series.last_date().unwrap();
        for end_offset in 0..3 {
            let end = last - Duration::days(end_offset);
            let mean = rolling_mean(&|d| series.count_on(d), end, 14).unwrap();
            let window: Vec<f64> = (0..14)
                .map(|o| series.count_on(end - Duration::days(o)).unwrap())
                .collect();
            let min = window.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            assert!(mean >= min && mean <= max);
        }
    }

    #[test]
    fn test_larger_lag_window() {
        let series = ascending_series();
        let f = lag_features(&series, nth_day(15), 7, &[], WindowAnchor::Exclusive);
        // Day 8 = 114
        assert_eq!(f.lag, Some(114.0));
        assert!(f.rolling.is_empty());
    }
}
