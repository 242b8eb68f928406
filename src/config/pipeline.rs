use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::features::{ImputationPolicy, SummerWindow, WindowAnchor};
use crate::ml::{GbmParams, SeasonalParams};
use crate::types::QuantileLevel;

/// Every tunable of the feature, training and forecasting stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub quantile_levels: Vec<QuantileLevel>,
    /// Level used as the median when no 0.5 model is trained
    pub median_substitute: Option<QuantileLevel>,
    pub summer_window: SummerWindow,
    pub lag_window: usize,
    pub rolling_windows: Vec<usize>,
    pub window_anchor: WindowAnchor,
    pub imputation: ImputationPolicy,
    pub hyperparameters: GbmParams,
    pub training_timeout_secs: Option<u64>,
    pub seasonal: SeasonalParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quantile_levels: QuantileLevel::defaults(),
            median_substitute: None,
            summer_window: SummerWindow::default(),
            lag_window: 1,
            rolling_windows: vec![7, 14],
            window_anchor: WindowAnchor::default(),
            imputation: ImputationPolicy::default(),
            hyperparameters: GbmParams::default(),
            training_timeout_secs: Some(300),
            seasonal: SeasonalParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        // Quantiles
        if self.quantile_levels.is_empty() {
            errors.push("quantile_levels must not be empty".to_string());
        }
        let unique: HashSet<QuantileLevel> = self.quantile_levels.iter().copied().collect();
        if unique.len() != self.quantile_levels.len() {
            errors.push("quantile_levels contains duplicates".to_string());
        }
        if !unique.contains(&QuantileLevel::MEDIAN) {
            match self.median_substitute {
                Some(level) if unique.contains(&level) => {}
                Some(level) => errors.push(format!(
                    "median_substitute {} is not one of quantile_levels",
                    level
                )),
                None => errors.push(
                    "quantile_levels must include 0.5 or set median_substitute".to_string(),
                ),
            }
        }

        // Features
        if !self.summer_window.is_valid() {
            errors.push("summer_window has an invalid month/day".to_string());
        }
        if self.lag_window == 0 {
            errors.push("lag_window must be >= 1".to_string());
        }
        if self.rolling_windows.iter().any(|&w| w == 0) {
            errors.push("rolling_windows must all be >= 1".to_string());
        }
        let windows: HashSet<usize> = self.rolling_windows.iter().copied().collect();
        if windows.len() != self.rolling_windows.len() {
            errors.push("rolling_windows contains duplicates".to_string());
        }

        // Models
        if let Err(gbm) = self.hyperparameters.validate() {
            errors.extend(gbm.into_iter().map(|e| format!("hyperparameters: {}", e)));
        }
        if let Err(seasonal) = self.seasonal.validate() {
            errors.extend(seasonal);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Days of history a row needs before its lag and rolling features exist
    pub fn history_required(&self) -> usize {
        self.rolling_windows
            .iter()
            .copied()
            .chain(std::iter::once(self.lag_window))
            .max()
            .unwrap_or(0)
    }

    /// Training deadline; `None` or `0` trains without one
    pub fn training_timeout(&self) -> Option<Duration> {
        self.training_timeout_secs
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(q: f64) -> QuantileLevel {
        QuantileLevel::new(q).unwrap()
    }

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history_required(), 14);
        assert_eq!(config.training_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_missing_median_needs_substitute() {
        let config = PipelineConfig {
            quantile_levels: vec![level(0.1), level(0.9)],
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PipelineConfig {
            quantile_levels: vec![level(0.1), level(0.45), level(0.9)],
            median_substitute: Some(level(0.45)),
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let config = PipelineConfig {
            quantile_levels: vec![level(0.5), level(0.5)],
            lag_window: 0,
            rolling_windows: vec![7, 7, 0],
            ..PipelineConfig::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 4, "{:?}", errors);
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = PipelineConfig { training_timeout_secs: Some(0), ..PipelineConfig::default() };
        assert!(config.validate().is_ok());
        assert_eq!(config.training_timeout(), None);

        let config = PipelineConfig { training_timeout_secs: None, ..PipelineConfig::default() };
        assert_eq!(config.training_timeout(), None);
    }

    #[test]
    fn test_history_required_uses_largest_window() {
        let config = PipelineConfig {
            lag_window: 30,
            rolling_windows: vec![7],
            ..PipelineConfig::default()
        };
        assert_eq!(config.history_required(), 30);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"quantile_levels": [0.05, 0.5, 0.95], "lag_window": 2}"#).unwrap();
        assert_eq!(config.quantile_levels.len(), 3);
        assert_eq!(config.lag_window, 2);
        assert_eq!(config.rolling_windows, vec![7, 14]);
    }

    #[test]
    fn test_out_of_range_level_rejected_on_deserialize() {
        let result: Result<PipelineConfig, _> =
            serde_json::from_str(r#"{"quantile_levels": [0.5, 1.5]}"#);
        assert!(result.is_err());
    }
}
