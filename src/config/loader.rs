use config::{Config, Environment, File, FileFormat};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::PipelineConfig;
use crate::error::{ForecastError, Result};

/// Environment variables prefixed with this override file settings,
/// e.g. `FERRY__LAG_WINDOW=2` or `FERRY__HYPERPARAMETERS__N_ESTIMATORS=50`
pub const ENV_PREFIX: &str = "FERRY";

impl PipelineConfig {
    /// Defaults, then the optional TOML file, then `FERRY__*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = toml::to_string(&PipelineConfig::default())
            .map_err(|e| ForecastError::Config(format!("cannot encode defaults: {}", e)))?;

        let mut builder = Config::builder().add_source(File::from_str(&defaults, FileFormat::Toml));
        if let Some(path) = path {
            debug!("Reading pipeline config from {}", path.display());
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("quantile_levels")
                .with_list_parse_key("rolling_windows")
                .try_parsing(true),
        );

        let config: PipelineConfig = builder.build()?.try_deserialize()?;
        config
            .validate()
            .map_err(|errors| ForecastError::Config(errors.join(", ")))?;

        info!(
            "Pipeline config: levels {:?}, lag {}, rolling {:?}, {} trees",
            config.quantile_levels.iter().map(|l| l.value()).collect::<Vec<_>>(),
            config.lag_window,
            config.rolling_windows,
            config.hyperparameters.n_estimators
        );
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ForecastError::Config(format!("cannot encode config: {}", e)))
    }

    pub fn write_toml(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::WindowAnchor;
    use crate::types::QuantileLevel;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let text = PipelineConfig::default().to_toml().unwrap();
        assert!(text.contains("lag_window = 1"));
        let parsed: PipelineConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, PipelineConfig::default());
    }

    // File and environment layering share process env, so they run in one test
    #[test]
    fn test_load_layers_file_and_environment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.toml");
        fs::write(
            &path,
            r#"
quantile_levels = [0.05, 0.5, 0.95]
window_anchor = "inclusive"

[hyperparameters]
n_estimators = 25
"#,
        )
        .unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.quantile_levels[0], QuantileLevel::new(0.05).unwrap());
        assert_eq!(config.window_anchor, WindowAnchor::Inclusive);
        assert_eq!(config.hyperparameters.n_estimators, 25);
        assert_eq!(config.hyperparameters.max_depth, 3);
        assert_eq!(config.rolling_windows, vec![7, 14]);

        std::env::set_var("FERRY__LAG_WINDOW", "3");
        let overridden = PipelineConfig::load(Some(&path));
        std::env::remove_var("FERRY__LAG_WINDOW");
        assert_eq!(overridden.unwrap().lag_window, 3);

        let missing = PipelineConfig::load(Some(&dir.path().join("absent.toml")));
        assert!(matches!(missing, Err(ForecastError::ConfigSource(_))));
    }

    #[test]
    fn test_file_can_disable_training_timeout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("no_timeout.toml");
        fs::write(&path, "training_timeout_secs = 0\n").unwrap();
        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.training_timeout_secs, Some(0));
        assert_eq!(config.training_timeout(), None);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "rolling_windows = [0]\n").unwrap();
        let err = PipelineConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ForecastError::Config(_)));
    }
}
