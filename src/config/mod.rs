//! Configuration file loading and validation

mod errors;
mod settings;

pub use errors::{ConfigError, ConfigResult};
pub use settings::{Config, DATASET_FILE, REBUILD_STATE_FILE};
