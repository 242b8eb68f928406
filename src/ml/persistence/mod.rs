use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::seasonal::SeasonalModel;
use super::trainer::QuantileModels;
use crate::config::PipelineConfig;
use crate::error::{ForecastError, Result};
use crate::features::feature_names;

/// Bumped whenever the bundle layout changes incompatibly
pub const FORMAT_VERSION: u32 = 1;

/// Provenance recorded alongside the trained models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub trained_at: DateTime<Utc>,
    pub history_start: NaiveDate,
    pub history_end: NaiveDate,
    pub training_rows: usize,
    pub feature_names: Vec<String>,
    /// (quantile level, in-sample mean pinball loss)
    #[serde(default)]
    pub training_loss: Vec<(f64, f64)>,
}

/// Everything needed to forecast without retraining
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub metadata: ModelMetadata,
    pub config: PipelineConfig,
    pub models: QuantileModels,
    #[serde(default)]
    pub seasonal: Option<SeasonalModel>,
}

impl ModelBundle {
    pub fn new(
        metadata: ModelMetadata,
        config: PipelineConfig,
        models: QuantileModels,
        seasonal: Option<SeasonalModel>,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            metadata,
            config,
            models,
            seasonal,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let bundle: ModelBundle = serde_json::from_str(json)?;
        bundle.check()?;
        Ok(bundle)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        info!(
            "Saved {} quantile models ({} to {}) to {}",
            self.models.len(),
            self.metadata.history_start,
            self.metadata.history_end,
            path.display()
        );
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bundle = Self::from_json(&fs::read_to_string(path)?)?;
        info!(
            "Loaded {} quantile models trained {} from {}",
            bundle.models.len(),
            bundle.metadata.trained_at.format("%Y-%m-%d %H:%M"),
            path.display()
        );
        Ok(bundle)
    }

    /// Reject bundles whose layout this build cannot use
    fn check(&self) -> Result<()> {
        if self.format_version != FORMAT_VERSION {
            return Err(ForecastError::Config(format!(
                "unsupported model bundle format {} (expected {})",
                self.format_version, FORMAT_VERSION
            )));
        }

        let expected = feature_names(&self.config);
        if self.metadata.feature_names != expected {
            return Err(ForecastError::Config(format!(
                "bundle features {:?} do not match config layout {:?}",
                self.metadata.feature_names, expected
            )));
        }
        if let Some((level, model)) = self.models.iter().find(|(_, m)| m.n_features() != expected.len()) {
            return Err(ForecastError::Config(format!(
                "{} model expects {} features, config yields {}",
                level,
                model.n_features(),
                expected.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::gbm::GbmParams;
    use crate::ml::trainer::train;
    use crate::types::QuantileLevel;
    use ndarray::Array2;
    use tempfile::TempDir;

    fn bundle() -> ModelBundle {
        let config = PipelineConfig::default();
        let names = feature_names(&config);
        let n = 30;
        let x = Array2::from_shape_fn((n, names.len()), |(i, j)| ((i + j) % 5) as f64);
        let y: Vec<f64> = (0..n).map(|i| 100.0 + (i % 5) as f64 * 10.0).collect();
        let params = GbmParams { n_estimators: 10, ..GbmParams::default() };
        let models = train(&x, &y, &QuantileLevel::defaults(), &params).unwrap();

        let metadata = ModelMetadata {
            trained_at: Utc::now(),
            history_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            history_end: NaiveDate::from_ymd_opt(2024, 1, 30).unwrap(),
            training_rows: n,
            feature_names: names,
            training_loss: Vec::new(),
        };
        ModelBundle::new(metadata, config, models, None)
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("models").join("bundle.json");
        let original = bundle();
        original.save(&path).unwrap();

        let loaded = ModelBundle::load(&path).unwrap();
        assert_eq!(loaded.format_version, FORMAT_VERSION);
        assert_eq!(loaded.metadata, original.metadata);
        assert_eq!(loaded.models, original.models);
        assert_eq!(loaded.config, original.config);
    }

    #[test]
    fn test_rejects_unknown_format_version() {
        let mut b = bundle();
        b.format_version = 99;
        let json = serde_json::to_string(&b).unwrap();
        assert!(matches!(ModelBundle::from_json(&json), Err(ForecastError::Config(_))));
    }

    #[test]
    fn test_rejects_feature_layout_drift() {
        let mut b = bundle();
        b.config.rolling_windows = vec![7, 14, 28];
        let json = serde_json::to_string(&b).unwrap();
        assert!(matches!(ModelBundle::from_json(&json), Err(ForecastError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ModelBundle::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ForecastError::Io(_)));
    }
}
