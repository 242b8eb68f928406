pub mod loader;
pub mod pipeline;

pub use loader::ENV_PREFIX;
pub use pipeline::PipelineConfig;
