//! Config loading and persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

mod load;
mod merge;
mod schema;

pub use load::{load_from_path, load_layer, write_config};
pub use merge::{apply_env_overrides, apply_overrides_from, merge_layers};
pub use schema::{
    Config, ConfigLayer, FileLoggingConfig, FileLoggingConfigOverride, LogFormat, LogRotation,
    LoggingConfig, LoggingConfigOverride, PipelineConfig, ProgressConfig, RefsConfig,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to render config")]
    Render(#[from] toml::ser::Error),

    #[error("failed to write config {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("config field `{field}` is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}
