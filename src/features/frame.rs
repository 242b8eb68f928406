use chrono::{Duration, NaiveDate};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::calendar::calendar_features;
use super::fourier::fourier_features;
use super::lags::lag_features_with;
use crate::config::PipelineConfig;
use crate::error::{ForecastError, Result};
use crate::types::ObservationSeries;

/// How inference rows fill window days that fall after the known history
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationPolicy {
    /// Unknown days stay missing and the row is rejected
    #[default]
    None,
    /// Unknown days after the history take the last observed count
    CarryForward,
}

/// Model inputs for a single day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub is_weekend: bool,
    pub is_summer: bool,
    pub is_summer_weekend: bool,
    /// Count `lag_window` days back (`lag1` under the default configuration)
    pub lag: Option<f64>,
    /// (window, mean) per configured rolling window
    pub rolling: Vec<(usize, Option<f64>)>,
    pub sin_annual: f64,
    pub cos_annual: f64,
}

impl FeatureRow {
    pub fn rolling_mean(&self, window: usize) -> Option<f64> {
        self.rolling
            .iter()
            .find(|(w, _)| *w == window)
            .and_then(|(_, value)| *value)
    }

    pub fn rolling7(&self) -> Option<f64> {
        self.rolling_mean(7)
    }

    pub fn rolling14(&self) -> Option<f64> {
        self.rolling_mean(14)
    }

    pub fn is_complete(&self) -> bool {
        self.lag.is_some() && self.rolling.iter().all(|(_, v)| v.is_some())
    }

    /// Numeric vector in `feature_names` order; `None` while any value is missing
    pub fn to_vec(&self) -> Option<Vec<f64>> {
        let mut values = Vec::with_capacity(6 + self.rolling.len());
        values.push(flag(self.is_weekend));
        values.push(flag(self.is_summer));
        values.push(flag(self.is_summer_weekend));
        values.push(self.lag?);
        for (_, value) in &self.rolling {
            values.push((*value)?);
        }
        values.push(self.sin_annual);
        values.push(self.cos_annual);
        Some(values)
    }
}

fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// Column names matching `FeatureRow::to_vec`
pub fn feature_names(config: &PipelineConfig) -> Vec<String> {
    let mut names = vec![
        "is_weekend".to_string(),
        "is_summer".to_string(),
        "is_summer_weekend".to_string(),
        format!("lag{}", config.lag_window),
    ];
    names.extend(config.rolling_windows.iter().map(|w| format!("rolling{}", w)));
    names.push("sin_annual".to_string());
    names.push("cos_annual".to_string());
    names
}

/// Compose calendar, lag/rolling and Fourier features for one date
pub fn build_row<F>(lookup: &F, date: NaiveDate, config: &PipelineConfig) -> FeatureRow
where
    F: Fn(NaiveDate) -> Option<f64>,
{
    let calendar = calendar_features(date, &config.summer_window);
    let lags = lag_features_with(
        lookup,
        date,
        config.lag_window,
        &config.rolling_windows,
        config.window_anchor,
    );
    let (sin_annual, cos_annual) = fourier_features(date);

    FeatureRow {
        date,
        is_weekend: calendar.is_weekend,
        is_summer: calendar.is_summer,
        is_summer_weekend: calendar.is_summer_weekend,
        lag: lags.lag,
        rolling: config.rolling_windows.iter().copied().zip(lags.rolling).collect(),
        sin_annual,
        cos_annual,
    }
}

/// Complete feature rows aligned with their observed targets
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingFrame {
    pub rows: Vec<FeatureRow>,
    pub targets: Vec<f64>,
}

impl TrainingFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn matrix(&self) -> Result<Array2<f64>> {
        feature_matrix(&self.rows)
    }
}

/// One row per observed date; rows with missing lag/rolling values are dropped
pub fn training_frame(series: &ObservationSeries, config: &PipelineConfig) -> Result<TrainingFrame> {
    let lookup = |d: NaiveDate| series.count_on(d);
    let mut rows = Vec::with_capacity(series.len());
    let mut targets = Vec::with_capacity(series.len());
    let mut dropped = 0usize;

    for obs in series.iter() {
        let row = build_row(&lookup, obs.date, config);
        if row.is_complete() {
            rows.push(row);
            targets.push(obs.count());
        } else {
            dropped += 1;
        }
    }

    debug!(
        "Training frame: {} complete rows, {} warm-up rows dropped",
        rows.len(),
        dropped
    );

    if rows.is_empty() {
        let date = series
            .last_date()
            .ok_or_else(|| ForecastError::Training("empty observation series".to_string()))?;
        return Err(ForecastError::insufficient_history(
            date,
            format!(
                "{} observations cannot fill a {}-day warm-up window",
                series.len(),
                config.history_required()
            ),
        ));
    }

    Ok(TrainingFrame { rows, targets })
}

/// Feature rows for `start..=end` built only from observations before `start`
pub fn inference_frame(
    series: &ObservationSeries,
    start: NaiveDate,
    end: NaiveDate,
    config: &PipelineConfig,
) -> Result<Vec<FeatureRow>> {
    if end < start {
        return Err(ForecastError::Config(format!(
            "forecast range ends ({}) before it starts ({})",
            end, start
        )));
    }

    let history = series.before(start);
    let last_known = history.observations().last().copied();

    let lookup = |d: NaiveDate| {
        history.count_on(d).or_else(|| match (config.imputation, last_known) {
            (ImputationPolicy::CarryForward, Some(last)) if d > last.date => Some(last.count()),
            _ => None,
        })
    };

    let days = (end - start).num_days() + 1;
    // Rows can fail part way, so never reserve for an unbounded range up front
    let mut rows = Vec::with_capacity(days.min(366) as usize);
    for offset in 0..days {
        let date = start + Duration::days(offset);
        let row = build_row(&lookup, date, config);
        if !row.is_complete() {
            let reason = match last_known {
                None => "no observations before the forecast range".to_string(),
                Some(last) if date > last.date + Duration::days(1) => format!(
                    "lag/rolling window reaches past the last observation ({}) and no imputation is configured",
                    last.date
                ),
                Some(_) => format!(
                    "fewer than {} days of history before the forecast range",
                    config.history_required()
                ),
            };
            return Err(ForecastError::insufficient_history(date, reason));
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Stack complete rows into an (n_rows, n_features) matrix
pub fn feature_matrix(rows: &[FeatureRow]) -> Result<Array2<f64>> {
    let n_cols = rows.first().map(|r| 6 + r.rolling.len()).unwrap_or(0);
    let mut flat = Vec::with_capacity(rows.len() * n_cols);
    for row in rows {
        let values = row.to_vec().ok_or_else(|| {
            ForecastError::Training(format!("feature row for {} has missing values", row.date))
        })?;
        if values.len() != n_cols {
            return Err(ForecastError::Training(format!(
                "feature row for {} has {} columns, expected {}",
                row.date,
                values.len(),
                n_cols
            )));
        }
        flat.extend(values);
    }
    Array2::from_shape_vec((rows.len(), n_cols), flat)
        .map_err(|e| ForecastError::Training(format!("feature matrix shape: {}", e)))
}
