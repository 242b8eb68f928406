use chrono::{Datelike, NaiveDate};
use std::f64::consts::PI;

pub const ANNUAL_PERIOD_DAYS: f64 = 365.25;

/// Annual sine/cosine encoding of the day of year (1..=366)
pub fn fourier_features(date: NaiveDate) -> (f64, f64) {
    let angle = 2.0 * PI * date.ordinal() as f64 / ANNUAL_PERIOD_DAYS;
    (angle.sin(), angle.cos())
}

/// `order` sin/cos pairs of `t` (in days) for a cycle of `period` days,
/// laid out as [sin(1), cos(1), sin(2), cos(2), ...]
pub fn fourier_terms(t: f64, period: f64, order: usize) -> Vec<f64> {
    let mut terms = Vec::with_capacity(2 * order);
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * t / period;
        terms.push(angle.sin());
        terms.push(angle.cos());
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fourier_features_unit_circle() {
        let mut day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        for _ in 0..366 {
            let (s, c) = fourier_features(day);
            assert!((s * s + c * c - 1.0).abs() < 1e-12);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_fourier_features_known_values() {
        let jan1 = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let (s, c) = fourier_features(jan1);
        let angle = 2.0 * PI / 365.25;
        assert!((s - angle.sin()).abs() < 1e-12);
        assert!((c - angle.cos()).abs() < 1e-12);

        // Roughly a quarter of the year in, sine peaks
        let apr1 = NaiveDate::from_ymd_opt(2023, 4, 1).unwrap();
        let (s, _) = fourier_features(apr1);
        assert!(s > 0.99);
    }

    #[test]
    fn test_fourier_terms_layout() {
        let terms = fourier_terms(0.0, 7.0, 3);
        assert_eq!(terms.len(), 6);
        assert_eq!(terms, vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }
}
