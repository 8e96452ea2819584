pub mod algorithm;
pub mod distributions;
pub mod env;
pub mod path;
pub mod policies;
pub mod processor;
pub mod rng;
pub mod sampler;
pub mod tabular;
pub mod utils;

pub use path::{InfoMap, Path, TaskPaths};
