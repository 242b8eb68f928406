use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Inclusive month/day window treated as the summer season
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummerWindow {
    pub start_month: u32,
    pub start_day: u32,
    pub end_month: u32,
    pub end_day: u32,
}

impl Default for SummerWindow {
    fn default() -> Self {
        Self {
            start_month: 6,
            start_day: 1,
            end_month: 9,
            end_day: 30,
        }
    }
}

impl SummerWindow {
    /// True when (month, day) falls in the window; a window whose start is
    /// after its end wraps over the new year
    pub fn contains(&self, date: NaiveDate) -> bool {
        let md = (date.month(), date.day());
        let start = (self.start_month, self.start_day);
        let end = (self.end_month, self.end_day);
        if start <= end {
            md >= start && md <= end
        } else {
            md >= start || md <= end
        }
    }

    /// Both bounds must be real calendar days (Feb 29 allowed)
    pub fn is_valid(&self) -> bool {
        NaiveDate::from_ymd_opt(2024, self.start_month, self.start_day).is_some()
            && NaiveDate::from_ymd_opt(2024, self.end_month, self.end_day).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarFeatures {
    pub is_weekend: bool,
    pub is_summer: bool,
    pub is_summer_weekend: bool,
}

pub fn calendar_features(date: NaiveDate, summer: &SummerWindow) -> CalendarFeatures {
    let is_weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
    let is_summer = summer.contains(date);
    CalendarFeatures {
        is_weekend,
        is_summer,
        is_summer_weekend: is_weekend && is_summer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekend_detection() {
        // 2024-06-01 is a Saturday
        let summer = SummerWindow::default();
        assert!(calendar_features(date(2024, 6, 1), &summer).is_weekend);
        assert!(calendar_features(date(2024, 6, 2), &summer).is_weekend);
        assert!(!calendar_features(date(2024, 6, 3), &summer).is_weekend);
    }

    #[test]
    fn test_default_summer_bounds_inclusive() {
        let summer = SummerWindow::default();
        assert!(!summer.contains(date(2024, 5, 31)));
        assert!(summer.contains(date(2024, 6, 1)));
        assert!(summer.contains(date(2024, 9, 30)));
        assert!(!summer.contains(date(2024, 10, 1)));
    }

    #[test]
    fn test_wrapping_window() {
        let southern = SummerWindow { start_month: 12, start_day: 1, end_month: 2, end_day: 28 };
        assert!(southern.contains(date(2024, 12, 25)));
        assert!(southern.contains(date(2025, 1, 15)));
        assert!(!southern.contains(date(2025, 3, 1)));
    }

    #[test]
    fn test_summer_weekend_is_conjunction() {
        let summer = SummerWindow::default();
        let mut day = date(2024, 1, 1);
        while day.year() == 2024 {
            let f = calendar_features(day, &summer);
            assert_eq!(f.is_summer_weekend, f.is_weekend && f.is_summer, "{}", day);
            day = day.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_window_validity() {
        assert!(SummerWindow::default().is_valid());
        let bad = SummerWindow { start_month: 2, start_day: 30, end_month: 9, end_day: 30 };
        assert!(!bad.is_valid());
    }
}
