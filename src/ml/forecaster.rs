use chrono::{Duration, NaiveDate, Utc};
use tracing::{debug, warn};

use super::trainer::QuantileModels;
use crate::config::PipelineConfig;
use crate::error::{ForecastError, Result};
use crate::features::{feature_matrix, inference_frame, FeatureRow};
use crate::types::{ForecastInterval, Observation, ObservationSeries, QuantileCrossing, QuantileLevel};

/// Intervals plus any crossings corrected while building them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forecast {
    pub intervals: Vec<ForecastInterval>,
    pub crossings: Vec<QuantileCrossing>,
}

impl Forecast {
    pub fn medians(&self) -> Vec<f64> {
        self.intervals.iter().map(|i| i.median).collect()
    }
}

/// Turns per-quantile predictions into ordered lower/median/upper intervals
#[derive(Debug, Clone, Default)]
pub struct IntervalForecaster {
    median_substitute: Option<QuantileLevel>,
}

impl IntervalForecaster {
    pub fn new(median_substitute: Option<QuantileLevel>) -> Self {
        Self { median_substitute }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.median_substitute)
    }

    fn median_level(&self, models: &QuantileModels) -> Result<QuantileLevel> {
        if models.contains(QuantileLevel::MEDIAN) {
            return Ok(QuantileLevel::MEDIAN);
        }
        match self.median_substitute {
            Some(level) if models.contains(level) => Ok(level),
            Some(level) => Err(ForecastError::Config(format!(
                "median substitute {} has no trained model",
                level
            ))),
            None => Err(ForecastError::Config(
                "no 0.50 quantile model and no median substitute configured".to_string(),
            )),
        }
    }

    pub fn predict(&self, models: &QuantileModels, rows: &[FeatureRow]) -> Result<Forecast> {
        let lower_level = models
            .min_level()
            .ok_or_else(|| ForecastError::Config("no trained quantile models".to_string()))?;
        let upper_level = models
            .max_level()
            .ok_or_else(|| ForecastError::Config("no trained quantile models".to_string()))?;
        let median_level = self.median_level(models)?;

        if rows.is_empty() {
            return Ok(Forecast::default());
        }

        let matrix = feature_matrix(rows)?;
        let predict = |level: QuantileLevel| -> Result<Vec<f64>> {
            models
                .get(level)
                .ok_or_else(|| ForecastError::Config(format!("missing model for {}", level)))?
                .predict(&matrix)
        };
        let lower = predict(lower_level)?;
        let median = predict(median_level)?;
        let upper = predict(upper_level)?;

        let mut forecast = Forecast::default();
        for (i, row) in rows.iter().enumerate() {
            let (interval, crossing) = ordered_interval(row.date, lower[i], median[i], upper[i]);
            forecast.intervals.push(interval);
            forecast.crossings.extend(crossing);
        }
        Ok(forecast)
    }

    /// Forecast `horizon` days past the series end, feeding each median back
    /// in as a provisional observation for the next day's lag/rolling features
    pub fn forecast_horizon(
        &self,
        models: &QuantileModels,
        series: &ObservationSeries,
        horizon: usize,
        config: &PipelineConfig,
    ) -> Result<Forecast> {
        let last = series.last_date().ok_or_else(|| {
            ForecastError::insufficient_history(
                Utc::now().date_naive(),
                "no observations to forecast from",
            )
        })?;

        let mut history = series.clone();
        let mut forecast = Forecast::default();

        for step in 1..=horizon {
            let date = last + Duration::days(step as i64);
            let rows = inference_frame(&history, date, date, config)?;
            let day = self.predict(models, &rows)?;

            for interval in &day.intervals {
                let provisional = interval.median.round().max(0.0) as u32;
                history.push(Observation::new(interval.date, provisional))?;
            }
            forecast.intervals.extend(day.intervals);
            forecast.crossings.extend(day.crossings);
        }

        debug!(
            "Recursive forecast: {} days from {}, {} crossings corrected",
            horizon,
            last,
            forecast.crossings.len()
        );
        Ok(forecast)
    }
}

/// Swap crossed bounds and clamp the median inside them
pub fn ordered_interval(
    date: NaiveDate,
    lower: f64,
    median: f64,
    upper: f64,
) -> (ForecastInterval, Option<QuantileCrossing>) {
    let (lower, upper, crossing) = if lower > upper {
        warn!(
            %date,
            lower,
            upper,
            "QuantileCrossingWarning: lower quantile exceeds upper, swapping bounds"
        );
        (upper, lower, Some(QuantileCrossing { date, lower, upper }))
    } else {
        (lower, upper, None)
    };

    let interval = ForecastInterval {
        date,
        lower,
        median: median.clamp(lower, upper),
        upper,
    };
    (interval, crossing)
}
