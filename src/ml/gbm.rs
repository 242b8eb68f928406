use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use super::tree::{RegressionTree, TreeParams};
use crate::error::{ForecastError, Result};
use crate::types::QuantileLevel;

/// Boosting hyperparameters shared by every quantile level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    /// Number of boosting rounds (trees)
    pub n_estimators: usize,
    /// Shrinkage applied to each tree's contribution
    pub learning_rate: f64,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples required in a leaf
    pub min_samples_leaf: usize,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.05,
            max_depth: 3,
            min_samples_split: 4,
            min_samples_leaf: 3,
        }
    }
}

impl GbmParams {
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.n_estimators == 0 {
            errors.push("n_estimators must be > 0".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            errors.push("learning_rate must be in (0, 1]".to_string());
        }
        if self.max_depth == 0 {
            errors.push("max_depth must be > 0".to_string());
        }
        if self.min_samples_split < 2 {
            errors.push("min_samples_split must be >= 2".to_string());
        }
        if self.min_samples_leaf == 0 {
            errors.push("min_samples_leaf must be > 0".to_string());
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// Gradient-boosted tree ensemble fitted under pinball loss for one quantile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileGbm {
    level: QuantileLevel,
    learning_rate: f64,
    n_features: usize,
    init: f64,
    trees: Vec<RegressionTree>,
}

impl QuantileGbm {
    /// Fit one ensemble; `cancel` is polled once per boosting round
    pub fn fit(
        features: &Array2<f64>,
        target: &[f64],
        level: QuantileLevel,
        params: &GbmParams,
        cancel: &AtomicBool,
    ) -> Result<Self> {
        let n = features.nrows();
        if n == 0 || n != target.len() {
            return Err(ForecastError::Training(format!(
                "{} feature rows vs {} targets",
                n,
                target.len()
            )));
        }

        let q = level.value();
        let tree_params = params.tree_params();
        let init = quantile(target, q);
        let mut fitted = vec![init; n];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for round in 0..params.n_estimators {
            if cancel.load(Ordering::Relaxed) {
                return Err(ForecastError::Cancelled(format!(
                    "{} stopped after {} of {} rounds",
                    level, round, params.n_estimators
                )));
            }

            let residuals: Vec<f64> = target.iter().zip(&fitted).map(|(y, f)| y - f).collect();
            // Negative gradient of the pinball loss
            let gradient: Vec<f64> = residuals
                .iter()
                .map(|&r| if r > 0.0 { q } else { q - 1.0 })
                .collect();

            let tree = RegressionTree::fit(features, &gradient, &tree_params, |rows: &[usize]| {
                let leaf_residuals: Vec<f64> = rows.iter().map(|&i| residuals[i]).collect();
                quantile(&leaf_residuals, q)
            });

            for (i, f) in fitted.iter_mut().enumerate() {
                *f += params.learning_rate * tree.predict_row(features.row(i));
            }
            trees.push(tree);
        }

        debug!(
            "Fitted {} with {} trees, training pinball loss {:.4}",
            level,
            trees.len(),
            mean_pinball_loss(target, &fitted, q)
        );

        Ok(Self {
            level,
            learning_rate: params.learning_rate,
            n_features: features.ncols(),
            init,
            trees,
        })
    }

    pub fn level(&self) -> QuantileLevel {
        self.level
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        self.init
            + self.learning_rate * self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>()
    }

    pub fn predict(&self, features: &Array2<f64>) -> Result<Vec<f64>> {
        if features.ncols() != self.n_features {
            return Err(ForecastError::Config(format!(
                "{} model expects {} features, got {}",
                self.level,
                self.n_features,
                features.ncols()
            )));
        }
        Ok(features.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }
}

/// Empirical quantile with linear interpolation between order statistics
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

pub fn pinball_loss(actual: f64, predicted: f64, q: f64) -> f64 {
    let diff = actual - predicted;
    if diff >= 0.0 { q * diff } else { (q - 1.0) * diff }
}

pub fn mean_pinball_loss(actual: &[f64], predicted: &[f64], q: f64) -> f64 {
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(&a, &p)| pinball_loss(a, p, q))
        .sum::<f64>()
        / actual.len() as f64
}
