pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod ml;
pub mod pipeline;
pub mod types;

pub use config::PipelineConfig;
pub use error::{ForecastError, Result};
pub use pipeline::ForecastPipeline;
