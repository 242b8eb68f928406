use chrono::{NaiveDate, Utc};
use ndarray::Array2;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{ForecastError, Result};
use crate::features::{feature_names, inference_frame, training_frame, TrainingFrame};
use crate::ml::{
    Forecast, IntervalForecaster, ModelBundle, ModelMetadata, QuantileModels, QuantileTrainer,
    SeasonalModel,
};
use crate::types::ObservationSeries;

/// Series in, model bundle out; bundle plus history in, intervals out
#[derive(Debug, Clone)]
pub struct ForecastPipeline {
    config: PipelineConfig,
}

impl ForecastPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|errors| ForecastError::Config(errors.join(", ")))?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Train on the calling thread, without a timeout
    pub fn fit(&self, series: &ObservationSeries) -> Result<ModelBundle> {
        let frame = training_frame(series, &self.config)?;
        let matrix = frame.matrix()?;
        let models = QuantileTrainer::from_config(&self.config).train(&matrix, &frame.targets)?;
        self.bundle(series, &frame, &matrix, models)
    }

    /// Train on the blocking pool, honoring `training_timeout_secs`
    pub async fn fit_async(&self, series: &ObservationSeries) -> Result<ModelBundle> {
        let frame = training_frame(series, &self.config)?;
        let matrix = frame.matrix()?;
        let trainer = QuantileTrainer::from_config(&self.config);

        let models = match self.config.training_timeout() {
            Some(timeout) => {
                trainer
                    .train_with_timeout(matrix.clone(), frame.targets.clone(), timeout)
                    .await?
            }
            None => trainer.train(&matrix, &frame.targets)?,
        };
        self.bundle(series, &frame, &matrix, models)
    }

    fn bundle(
        &self,
        series: &ObservationSeries,
        frame: &TrainingFrame,
        matrix: &Array2<f64>,
        models: QuantileModels,
    ) -> Result<ModelBundle> {
        let (history_start, history_end) = match (series.first_date(), series.last_date()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(ForecastError::Training("empty observation series".to_string())),
        };

        let training_loss = models
            .training_loss(matrix, &frame.targets)?
            .into_iter()
            .map(|(level, loss)| (level.value(), loss))
            .collect::<Vec<_>>();
        for (level, loss) in &training_loss {
            info!("  q{:.2} training pinball loss: {:.3}", level, loss);
        }

        let seasonal = match SeasonalModel::fit(series, &self.config.seasonal) {
            Ok(model) => Some(model),
            Err(ForecastError::InsufficientHistory { reason, .. }) => {
                warn!("Skipping seasonal baseline: {}", reason);
                None
            }
            Err(e) => return Err(e),
        };

        let metadata = ModelMetadata {
            trained_at: Utc::now(),
            history_start,
            history_end,
            training_rows: frame.len(),
            feature_names: feature_names(&self.config),
            training_loss,
        };
        Ok(ModelBundle::new(metadata, self.config.clone(), models, seasonal))
    }

    /// Recursive forecast for the `horizon` days after the series end
    pub fn forecast(bundle: &ModelBundle, series: &ObservationSeries, horizon: usize) -> Result<Forecast> {
        IntervalForecaster::from_config(&bundle.config).forecast_horizon(
            &bundle.models,
            series,
            horizon,
            &bundle.config,
        )
    }

    /// Direct forecast for `start..=end`; days past the history need carry-forward imputation
    pub fn forecast_range(
        bundle: &ModelBundle,
        series: &ObservationSeries,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Forecast> {
        let rows = inference_frame(series, start, end, &bundle.config)?;
        IntervalForecaster::from_config(&bundle.config).predict(&bundle.models, &rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ImputationPolicy;
    use crate::ml::GbmParams;
    use chrono::Duration;

    fn config() -> PipelineConfig {
        PipelineConfig {
            hyperparameters: GbmParams { n_estimators: 30, ..GbmParams::default() },
            ..PipelineConfig::default()
        }
    }

    fn series(days: u32) -> ObservationSeries {
        let counts: Vec<u32> = (0..days)
            .map(|i| {
                let weekend: u32 = if i % 7 >= 5 { 90 } else { 0 };
                150 + weekend + (i % 3) * 5
            })
            .collect();
        ObservationSeries::from_counts(NaiveDate::from_ymd_opt(2023, 3, 6).unwrap(), &counts)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = PipelineConfig { lag_window: 0, ..PipelineConfig::default() };
        assert!(matches!(ForecastPipeline::new(bad), Err(ForecastError::Config(_))));
    }

    #[test]
    fn test_fit_records_metadata() {
        let history = series(100);
        let bundle = ForecastPipeline::new(config()).unwrap().fit(&history).unwrap();
        assert_eq!(bundle.metadata.training_rows, 86);
        assert_eq!(bundle.metadata.history_end, history.last_date().unwrap());
        assert_eq!(bundle.metadata.training_loss.len(), 3);
        assert_eq!(bundle.models.len(), 3);
        assert!(bundle.seasonal.is_some());
    }

    #[test]
    fn test_short_history_skips_seasonal() {
        let bundle = ForecastPipeline::new(config()).unwrap().fit(&series(25)).unwrap();
        assert!(bundle.seasonal.is_none());
    }

    #[test]
    fn test_forecast_after_fit() {
        let history = series(90);
        let bundle = ForecastPipeline::new(config()).unwrap().fit(&history).unwrap();
        let forecast = ForecastPipeline::forecast(&bundle, &history, 7).unwrap();
        assert_eq!(forecast.intervals.len(), 7);
        assert!(forecast.intervals.iter().all(|i| i.is_ordered()));
    }

    #[test]
    fn test_forecast_range_needs_imputation_past_history() {
        let history = series(90);
        let last = history.last_date().unwrap();
        let bundle = ForecastPipeline::new(config()).unwrap().fit(&history).unwrap();

        let next_day = ForecastPipeline::forecast_range(&bundle, &history, last + Duration::days(1), last + Duration::days(1));
        assert_eq!(next_day.unwrap().intervals.len(), 1);

        let week = ForecastPipeline::forecast_range(&bundle, &history, last + Duration::days(1), last + Duration::days(7));
        assert!(matches!(week, Err(ForecastError::InsufficientHistory { .. })));

        let mut imputed = bundle.clone();
        imputed.config.imputation = ImputationPolicy::CarryForward;
        let week = ForecastPipeline::forecast_range(&imputed, &history, last + Duration::days(1), last + Duration::days(7));
        assert_eq!(week.unwrap().intervals.len(), 7);
    }

    #[tokio::test]
    async fn test_fit_async_matches_sync() {
        let history = series(80);
        let pipeline = ForecastPipeline::new(config()).unwrap();
        let sync = pipeline.fit(&history).unwrap();
        let async_bundle = pipeline.fit_async(&history).await.unwrap();
        assert_eq!(sync.models, async_bundle.models);
    }
}
