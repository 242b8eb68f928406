pub mod observation;
pub mod forecast;

pub use observation::*;
pub use forecast::*;
