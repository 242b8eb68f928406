pub mod backtest;

pub use backtest::{
    holdout, rolling_origin, BacktestReport, BacktestSummary, ModelScore, RollingOriginResult,
};

use serde::{Deserialize, Serialize};

use crate::error::{ForecastError, Result};
use crate::ml::gbm::pinball_loss;
use crate::types::{EvaluationResult, ForecastInterval, QuantileLevel};

pub const DEFAULT_FOLD_LABEL: &str = "holdout";

/// MAE and RMSE of point forecasts against actuals
pub fn evaluate(predicted: &[f64], actual: &[f64]) -> Result<EvaluationResult> {
    evaluate_labeled(DEFAULT_FOLD_LABEL, predicted, actual)
}

pub fn evaluate_labeled(
    fold_label: impl Into<String>,
    predicted: &[f64],
    actual: &[f64],
) -> Result<EvaluationResult> {
    if predicted.len() != actual.len() {
        return Err(ForecastError::ShapeMismatch {
            predicted: predicted.len(),
            actual: actual.len(),
        });
    }

    let (mae, rmse) = if actual.is_empty() {
        (0.0, 0.0)
    } else {
        let n = actual.len() as f64;
        let (abs_sum, sq_sum) = predicted
            .iter()
            .zip(actual)
            .fold((0.0, 0.0), |(abs_sum, sq_sum), (p, a)| {
                let err = p - a;
                (abs_sum + err.abs(), sq_sum + err * err)
            });
        (abs_sum / n, (sq_sum / n).sqrt())
    };

    Ok(EvaluationResult {
        fold_label: fold_label.into(),
        mae,
        rmse,
    })
}

/// Calibration and sharpness of interval forecasts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntervalScore {
    /// Share of actuals inside [lower, upper]
    pub coverage: f64,
    pub mean_width: f64,
    /// Mean pinball loss over the lower, median and upper quantiles
    pub pinball: f64,
}

pub fn score_intervals(
    intervals: &[ForecastInterval],
    actual: &[f64],
    lower: QuantileLevel,
    upper: QuantileLevel,
) -> Result<IntervalScore> {
    if intervals.len() != actual.len() {
        return Err(ForecastError::ShapeMismatch {
            predicted: intervals.len(),
            actual: actual.len(),
        });
    }
    if actual.is_empty() {
        return Ok(IntervalScore { coverage: 0.0, mean_width: 0.0, pinball: 0.0 });
    }

    let n = actual.len() as f64;
    let covered = intervals.iter().zip(actual).filter(|(i, a)| i.contains(**a)).count();
    let mean_width = intervals.iter().map(ForecastInterval::width).sum::<f64>() / n;
    let pinball = intervals
        .iter()
        .zip(actual)
        .map(|(i, &a)| {
            (pinball_loss(a, i.lower, lower.value())
                + pinball_loss(a, i.median, QuantileLevel::MEDIAN.value())
                + pinball_loss(a, i.upper, upper.value()))
                / 3.0
        })
        .sum::<f64>()
        / n;

    Ok(IntervalScore {
        coverage: covered as f64 / n,
        mean_width,
        pinball,
    })
}
