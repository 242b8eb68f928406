pub mod calendar;
pub mod lags;
pub mod fourier;
pub mod frame;

pub use calendar::{calendar_features, CalendarFeatures, SummerWindow};
pub use lags::{lag_features, lag_features_with, rolling_mean, LagFeatures, WindowAnchor};
pub use fourier::{fourier_features, fourier_terms, ANNUAL_PERIOD_DAYS};
pub use frame::{
    build_row, feature_matrix, feature_names, inference_frame, training_frame, FeatureRow,
    ImputationPolicy, TrainingFrame,
};
