pub mod forecaster;
pub mod gbm;
pub mod persistence;
pub mod seasonal;
pub mod trainer;
pub mod tree;

pub use forecaster::{ordered_interval, Forecast, IntervalForecaster};
pub use gbm::{mean_pinball_loss, pinball_loss, quantile, GbmParams, QuantileGbm};
pub use persistence::{ModelBundle, ModelMetadata, FORMAT_VERSION};
pub use seasonal::{SeasonalModel, SeasonalParams};
pub use trainer::{train, QuantileModels, QuantileTrainer, TrainedQuantileModel};
