pub mod loader;

pub use loader::{load_series, read_series, save_forecast, save_series, write_forecast};
