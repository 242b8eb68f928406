use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use super::{evaluate_labeled, score_intervals, IntervalScore};
use crate::config::PipelineConfig;
use crate::error::{ForecastError, Result};
use crate::ml::ModelBundle;
use crate::pipeline::ForecastPipeline;
use crate::types::{EvaluationResult, ForecastInterval, ObservationSeries, QuantileLevel};

pub const GBM_MODEL: &str = "quantile_gbm";
pub const SEASONAL_MODEL: &str = "seasonal";

/// Accuracy of one model on one fold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelScore {
    pub model: String,
    pub evaluation: EvaluationResult,
    pub intervals: IntervalScore,
}

/// Out-of-sample results for a single train/test split
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub fold: usize,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    pub scores: Vec<ModelScore>,
    pub crossings: usize,
}

impl BacktestReport {
    pub fn score(&self, model: &str) -> Option<&ModelScore> {
        self.scores.iter().find(|s| s.model == model)
    }

    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(60));
        println!("                 BACKTEST FOLD {}", self.fold);
        println!("{}", "=".repeat(60));
        println!("Train:              {} to {}", self.train_start, self.train_end);
        println!("Test:               {} to {}", self.test_start, self.test_end);
        println!("Crossings fixed:    {}", self.crossings);
        println!("{}", "-".repeat(60));
        println!("  {:<14} {:>8} {:>8} {:>9} {:>8} {:>8}", "MODEL", "MAE", "RMSE", "COVERAGE", "WIDTH", "PINBALL");
        for score in &self.scores {
            println!(
                "  {:<14} {:>8.2} {:>8.2} {:>8.1}% {:>8.1} {:>8.2}",
                score.model,
                score.evaluation.mae,
                score.evaluation.rmse,
                score.intervals.coverage * 100.0,
                score.intervals.mean_width,
                score.intervals.pinball
            );
        }
        println!("{}", "=".repeat(60));
    }
}

/// Per-model averages across folds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestSummary {
    pub model: String,
    pub folds: usize,
    pub mean_mae: f64,
    pub mean_rmse: f64,
    pub mean_coverage: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RollingOriginResult {
    pub horizon: usize,
    pub reports: Vec<BacktestReport>,
}

impl RollingOriginResult {
    pub fn summary(&self) -> Vec<BacktestSummary> {
        let mut models: Vec<&str> = Vec::new();
        for score in self.reports.iter().flat_map(|r| &r.scores) {
            if !models.contains(&score.model.as_str()) {
                models.push(&score.model);
            }
        }

        models
            .into_iter()
            .map(|model| {
                let scores: Vec<&ModelScore> =
                    self.reports.iter().filter_map(|r| r.score(model)).collect();
                let n = scores.len().max(1) as f64;
                BacktestSummary {
                    model: model.to_string(),
                    folds: scores.len(),
                    mean_mae: scores.iter().map(|s| s.evaluation.mae).sum::<f64>() / n,
                    mean_rmse: scores.iter().map(|s| s.evaluation.rmse).sum::<f64>() / n,
                    mean_coverage: scores.iter().map(|s| s.intervals.coverage).sum::<f64>() / n,
                }
            })
            .collect()
    }

    pub fn print_summary(&self) {
        for report in &self.reports {
            report.print_summary();
        }
        println!("\n{}", "=".repeat(60));
        println!("       ROLLING ORIGIN: {} folds x {} days", self.reports.len(), self.horizon);
        println!("{}", "=".repeat(60));
        for summary in self.summary() {
            println!(
                "  {:<14} MAE {:>8.2}  RMSE {:>8.2}  coverage {:>5.1}%",
                summary.model,
                summary.mean_mae,
                summary.mean_rmse,
                summary.mean_coverage * 100.0
            );
        }
        println!("{}", "=".repeat(60));
    }
}

/// Train on everything but the last `holdout_days`, then score the holdout
pub fn holdout(series: &ObservationSeries, holdout_days: usize, config: &PipelineConfig) -> Result<BacktestReport> {
    let (train, test) = series.split_tail(holdout_days);
    run_fold(1, &train, &test, config)
}

/// `folds` successive origins `horizon` days apart, the last test window ending at the series end
pub fn rolling_origin(
    series: &ObservationSeries,
    folds: usize,
    horizon: usize,
    config: &PipelineConfig,
) -> Result<RollingOriginResult> {
    if folds == 0 || horizon == 0 {
        return Err(ForecastError::Config("folds and horizon must be > 0".to_string()));
    }
    let needed = folds * horizon;
    if series.len() <= needed {
        return Err(ForecastError::Config(format!(
            "{} days cannot hold {} folds of {} days plus training history",
            series.len(),
            folds,
            horizon
        )));
    }

    info!("Rolling-origin backtest: {} folds, {}-day horizon", folds, horizon);

    let mut reports = Vec::with_capacity(folds);
    for fold in 0..folds {
        let cutoff = series.len() - (folds - fold) * horizon;
        let (history, rest) = series.split_tail(series.len() - cutoff);
        let (test, _) = rest.split_tail(rest.len() - horizon);
        reports.push(run_fold(fold + 1, &history, &test, config)?);
    }

    Ok(RollingOriginResult { horizon, reports })
}

fn run_fold(
    fold: usize,
    train: &ObservationSeries,
    test: &ObservationSeries,
    config: &PipelineConfig,
) -> Result<BacktestReport> {
    let (train_start, train_end, test_start, test_end) =
        match (train.first_date(), train.last_date(), test.first_date(), test.last_date()) {
            (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
            _ => {
                return Err(ForecastError::Config(
                    "backtest needs non-empty training and test windows".to_string(),
                ))
            }
        };

    info!(
        "Fold {}: train {} to {}, test {} to {}",
        fold, train_start, train_end, test_start, test_end
    );

    let bundle = ForecastPipeline::new(config.clone())?.fit(train)?;
    let actual = test.counts();
    let label = format!("fold-{}", fold);

    let forecast = ForecastPipeline::forecast(&bundle, train, test.len())?;
    let mut scores = vec![gbm_score(&bundle, &label, &forecast.intervals, &actual)?];

    if let Some(seasonal) = &bundle.seasonal {
        let intervals = seasonal.predict(&test.dates());
        let tail = (1.0 - config.seasonal.interval_width) / 2.0;
        let medians: Vec<f64> = intervals.iter().map(|i| i.median).collect();
        scores.push(ModelScore {
            model: SEASONAL_MODEL.to_string(),
            evaluation: evaluate_labeled(label.clone(), &medians, &actual)?,
            intervals: score_intervals(
                &intervals,
                &actual,
                QuantileLevel::new(tail)?,
                QuantileLevel::new(1.0 - tail)?,
            )?,
        });
    }

    for score in &scores {
        info!(
            "  {}: MAE {:.2}, RMSE {:.2}, coverage {:.1}%",
            score.model,
            score.evaluation.mae,
            score.evaluation.rmse,
            score.intervals.coverage * 100.0
        );
    }

    Ok(BacktestReport {
        fold,
        train_start,
        train_end,
        test_start,
        test_end,
        scores,
        crossings: forecast.crossings.len(),
    })
}

fn gbm_score(
    bundle: &ModelBundle,
    label: &str,
    intervals: &[ForecastInterval],
    actual: &[f64],
) -> Result<ModelScore> {
    let (lower, upper) = match (bundle.models.min_level(), bundle.models.max_level()) {
        (Some(lower), Some(upper)) => (lower, upper),
        _ => return Err(ForecastError::Config("no trained quantile models".to_string())),
    };
    let medians: Vec<f64> = intervals.iter().map(|i| i.median).collect();
    Ok(ModelScore {
        model: GBM_MODEL.to_string(),
        evaluation: evaluate_labeled(label, &medians, actual)?,
        intervals: score_intervals(intervals, actual, lower, upper)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::GbmParams;

    fn config() -> PipelineConfig {
        PipelineConfig {
            hyperparameters: GbmParams { n_estimators: 25, ..GbmParams::default() },
            ..PipelineConfig::default()
        }
    }

    fn series(days: u32) -> ObservationSeries {
        let counts: Vec<u32> = (0..days)
            .map(|i| {
                let weekend: u32 = if i % 7 >= 5 { 70 } else { 0 };
                220 + weekend + (i % 4) * 6
            })
            .collect();
        ObservationSeries::from_counts(NaiveDate::from_ymd_opt(2022, 5, 2).unwrap(), &counts)
    }

    #[test]
    fn test_holdout_scores_both_models() {
        let data = series(120);
        let report = holdout(&data, 14, &config()).unwrap();
        assert_eq!(report.test_end, data.last_date().unwrap());
        assert_eq!((report.test_end - report.test_start).num_days(), 13);
        assert!(report.score(GBM_MODEL).is_some());
        assert!(report.score(SEASONAL_MODEL).is_some());
        for score in &report.scores {
            assert!(score.evaluation.mae >= 0.0);
            assert!(score.evaluation.rmse >= score.evaluation.mae);
            assert!((0.0..=1.0).contains(&score.intervals.coverage));
        }
    }

    #[test]
    fn test_rolling_origin_windows_are_adjacent() {
        let data = series(110);
        let result = rolling_origin(&data, 3, 7, &config()).unwrap();
        assert_eq!(result.reports.len(), 3);
        for pair in result.reports.windows(2) {
            assert_eq!(pair[1].test_start, pair[0].test_end + chrono::Duration::days(1));
            assert_eq!(pair[1].train_end, pair[0].test_end);
        }
        assert_eq!(result.reports[2].test_end, data.last_date().unwrap());

        let summary = result.summary();
        let gbm = summary.iter().find(|s| s.model == GBM_MODEL).unwrap();
        assert_eq!(gbm.folds, 3);
        let mean: f64 = result
            .reports
            .iter()
            .map(|r| r.score(GBM_MODEL).unwrap().evaluation.mae)
            .sum::<f64>()
            / 3.0;
        assert!((gbm.mean_mae - mean).abs() < 1e-9);
    }

    #[test]
    fn test_rolling_origin_rejects_oversized_folds() {
        let data = series(30);
        assert!(matches!(rolling_origin(&data, 5, 7, &config()), Err(ForecastError::Config(_))));
        assert!(matches!(rolling_origin(&data, 0, 7, &config()), Err(ForecastError::Config(_))));
    }

    #[test]
    fn test_holdout_larger_than_series() {
        let data = series(20);
        assert!(holdout(&data, 30, &config()).is_err());
    }
}
