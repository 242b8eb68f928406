use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};

/// One day of recorded ticket redemptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub date: NaiveDate,
    pub redemption_count: u32,
}

impl Observation {
    pub fn new(date: NaiveDate, redemption_count: u32) -> Self {
        Self { date, redemption_count }
    }

    pub fn count(&self) -> f64 {
        self.redemption_count as f64
    }
}

/// Contiguous, strictly daily series of observations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationSeries {
    observations: Vec<Observation>,
}

impl ObservationSeries {
    /// Build a series, sorting by date and rejecting gaps or duplicate days
    pub fn new(mut observations: Vec<Observation>) -> Result<Self> {
        observations.sort_by_key(|o| o.date);

        for pair in observations.windows(2) {
            let (prev, next) = (pair[0].date, pair[1].date);
            if next == prev {
                return Err(ForecastError::IrregularSeries(format!(
                    "duplicate observation for {}", next
                )));
            }
            if next != prev + Duration::days(1) {
                return Err(ForecastError::IrregularSeries(format!(
                    "gap between {} and {} ({} missing days)",
                    prev,
                    next,
                    (next - prev).num_days() - 1
                )));
            }
        }

        Ok(Self { observations })
    }

    /// Series of consecutive days starting at `start`
    pub fn from_counts(start: NaiveDate, counts: &[u32]) -> Self {
        let observations = counts
            .iter()
            .enumerate()
            .map(|(i, &count)| Observation::new(start + Duration::days(i as i64), count))
            .collect();
        Self { observations }
    }

    /// Append the next consecutive day
    pub fn push(&mut self, observation: Observation) -> Result<()> {
        if let Some(last) = self.last_date() {
            let expected = last + Duration::days(1);
            if observation.date != expected {
                return Err(ForecastError::IrregularSeries(format!(
                    "expected {} after {}, got {}",
                    expected, last, observation.date
                )));
            }
        }
        self.observations.push(observation);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn iter(&self) -> impl Iterator<Item = &Observation> {
        self.observations.iter()
    }

    /// Observation on `date`, if the series covers it
    pub fn get(&self, date: NaiveDate) -> Option<&Observation> {
        let first = self.first_date()?;
        let offset = (date - first).num_days();
        if offset < 0 {
            return None;
        }
        self.observations.get(offset as usize)
    }

    pub fn count_on(&self, date: NaiveDate) -> Option<f64> {
        self.get(date).map(Observation::count)
    }

    pub fn counts(&self) -> Vec<f64> {
        self.observations.iter().map(Observation::count).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.observations.iter().map(|o| o.date).collect()
    }

    /// Observations dated strictly before `cutoff`
    pub fn before(&self, cutoff: NaiveDate) -> Self {
        let end = self.observations.partition_point(|o| o.date < cutoff);
        Self { observations: self.observations[..end].to_vec() }
    }

    /// Observations dated on or after `start`
    pub fn from_date(&self, start: NaiveDate) -> Self {
        let begin = self.observations.partition_point(|o| o.date < start);
        Self { observations: self.observations[begin..].to_vec() }
    }

    /// Split into the series before the last `n` days and those last `n` days
    pub fn split_tail(&self, n: usize) -> (Self, Self) {
        let split = self.observations.len().saturating_sub(n);
        (
            Self { observations: self.observations[..split].to_vec() },
            Self { observations: self.observations[split..].to_vec() },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_new_sorts_observations() {
        let series = ObservationSeries::new(vec![
            Observation::new(day(3), 30),
            Observation::new(day(1), 10),
            Observation::new(day(2), 20),
        ])
        .unwrap();
        assert_eq!(series.counts(), vec![10.0, 20.0, 30.0]);
        assert_eq!(series.first_date(), Some(day(1)));
    }

    #[test]
    fn test_gap_is_irregular() {
        let err = ObservationSeries::new(vec![
            Observation::new(day(1), 10),
            Observation::new(day(3), 30),
        ])
        .unwrap_err();
        assert!(matches!(err, ForecastError::IrregularSeries(_)));
    }

    #[test]
    fn test_duplicate_is_irregular() {
        let err = ObservationSeries::new(vec![
            Observation::new(day(1), 10),
            Observation::new(day(1), 11),
        ])
        .unwrap_err();
        assert!(matches!(err, ForecastError::IrregularSeries(_)));
    }

    #[test]
    fn test_push_requires_next_day() {
        let mut series = ObservationSeries::from_counts(day(1), &[1, 2]);
        assert!(series.push(Observation::new(day(3), 3)).is_ok());
        assert!(series.push(Observation::new(day(5), 5)).is_err());
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn test_get_and_slices() {
        let series = ObservationSeries::from_counts(day(1), &[1, 2, 3, 4, 5]);
        assert_eq!(series.count_on(day(4)), Some(4.0));
        assert_eq!(series.count_on(day(10)), None);
        assert_eq!(series.count_on(NaiveDate::from_ymd_opt(2024, 2, 28).unwrap()), None);

        assert_eq!(series.before(day(3)).counts(), vec![1.0, 2.0]);
        assert_eq!(series.from_date(day(4)).counts(), vec![4.0, 5.0]);

        let (head, tail) = series.split_tail(2);
        assert_eq!(head.len(), 3);
        assert_eq!(tail.first_date(), Some(day(4)));
    }
}
