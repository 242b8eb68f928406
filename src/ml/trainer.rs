use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::gbm::{mean_pinball_loss, GbmParams, QuantileGbm};
use crate::config::PipelineConfig;
use crate::error::{ForecastError, Result};
use crate::types::QuantileLevel;

/// Fitted model for one quantile level
pub type TrainedQuantileModel = QuantileGbm;

/// Trained models keyed by quantile level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<QuantileGbm>", into = "Vec<QuantileGbm>")]
pub struct QuantileModels {
    models: BTreeMap<QuantileLevel, TrainedQuantileModel>,
}

impl From<Vec<QuantileGbm>> for QuantileModels {
    fn from(models: Vec<QuantileGbm>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.level(), m)).collect(),
        }
    }
}

impl From<QuantileModels> for Vec<QuantileGbm> {
    fn from(models: QuantileModels) -> Self {
        models.models.into_values().collect()
    }
}

impl QuantileModels {
    pub fn get(&self, level: QuantileLevel) -> Option<&TrainedQuantileModel> {
        self.models.get(&level)
    }

    pub fn contains(&self, level: QuantileLevel) -> bool {
        self.models.contains_key(&level)
    }

    pub fn levels(&self) -> Vec<QuantileLevel> {
        self.models.keys().copied().collect()
    }

    pub fn min_level(&self) -> Option<QuantileLevel> {
        self.models.keys().next().copied()
    }

    pub fn max_level(&self) -> Option<QuantileLevel> {
        self.models.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuantileLevel, &TrainedQuantileModel)> {
        self.models.iter()
    }

    /// In-sample mean pinball loss per level
    pub fn training_loss(&self, features: &Array2<f64>, target: &[f64]) -> Result<Vec<(QuantileLevel, f64)>> {
        self.models
            .iter()
            .map(|(level, model)| {
                let predicted = model.predict(features)?;
                Ok((*level, mean_pinball_loss(target, &predicted, level.value())))
            })
            .collect()
    }
}

/// Fits one independent boosted ensemble per quantile level
#[derive(Debug, Clone)]
pub struct QuantileTrainer {
    levels: Vec<QuantileLevel>,
    params: GbmParams,
}

impl QuantileTrainer {
    pub fn new(levels: Vec<QuantileLevel>, params: GbmParams) -> Self {
        let mut levels = levels;
        levels.sort();
        levels.dedup();
        Self { levels, params }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.quantile_levels.clone(), config.hyperparameters.clone())
    }

    pub fn levels(&self) -> &[QuantileLevel] {
        &self.levels
    }

    pub fn train(&self, features: &Array2<f64>, target: &[f64]) -> Result<QuantileModels> {
        self.train_cancellable(features, target, &AtomicBool::new(false))
    }

    /// Train every level on the rayon pool; all tasks share the read-only matrix
    pub fn train_cancellable(
        &self,
        features: &Array2<f64>,
        target: &[f64],
        cancel: &AtomicBool,
    ) -> Result<QuantileModels> {
        validate_training_data(features, target)?;
        if self.levels.is_empty() {
            return Err(ForecastError::Config("no quantile levels requested".to_string()));
        }
        self.params
            .validate()
            .map_err(|errors| ForecastError::Config(errors.join(", ")))?;

        info!(
            "Training {} quantile models on {} rows x {} features",
            self.levels.len(),
            features.nrows(),
            features.ncols()
        );
        let started = Instant::now();

        let fitted: Vec<QuantileGbm> = self
            .levels
            .par_iter()
            .map(|&level| QuantileGbm::fit(features, target, level, &self.params, cancel))
            .collect::<Result<_>>()?;

        info!("Quantile training complete in {:.1}s", started.elapsed().as_secs_f64());
        Ok(QuantileModels::from(fitted))
    }

    /// Train on tokio's blocking pool, cancelling the boosting loops on timeout
    pub async fn train_with_timeout(
        &self,
        features: Array2<f64>,
        target: Vec<f64>,
        timeout: Duration,
    ) -> Result<QuantileModels> {
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let trainer = self.clone();

        let handle = tokio::task::spawn_blocking(move || {
            trainer.train_cancellable(&features, &target, &worker_cancel)
        });

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ForecastError::Training(format!(
                "training task failed: {}",
                join_error
            ))),
            Err(_) => {
                cancel.store(true, Ordering::Relaxed);
                warn!("Quantile training exceeded {:?}, cancelling", timeout);
                Err(ForecastError::Cancelled(format!(
                    "training exceeded {}s timeout",
                    timeout.as_secs_f64()
                )))
            }
        }
    }
}

/// Train one model per level with the given hyperparameters
pub fn train(
    features: &Array2<f64>,
    target: &[f64],
    quantile_levels: &[QuantileLevel],
    hyperparameters: &GbmParams,
) -> Result<QuantileModels> {
    QuantileTrainer::new(quantile_levels.to_vec(), hyperparameters.clone()).train(features, target)
}

fn validate_training_data(features: &Array2<f64>, target: &[f64]) -> Result<()> {
    if features.nrows() != target.len() {
        return Err(ForecastError::Training(format!(
            "feature matrix has {} rows but target has {} values",
            features.nrows(),
            target.len()
        )));
    }
    if target.is_empty() {
        return Err(ForecastError::Training("no training rows".to_string()));
    }
    if let Some((i, value)) = target.iter().enumerate().find(|(_, v)| !v.is_finite() || **v < 0.0) {
        return Err(ForecastError::Training(format!(
            "target[{}] = {} is not a non-negative count",
            i, value
        )));
    }
    if features.iter().any(|v| !v.is_finite()) {
        return Err(ForecastError::Training("feature matrix contains non-finite values".to_string()));
    }
    Ok(())
}
