//! CLI error types
//!
//! Every CLI error ends the process with a non-zero exit code.

use std::path::PathBuf;

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::rebuild::RebuildError;
use crate::record::RecordError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("data directory {0} is already initialized")]
    AlreadyInitialized(PathBuf),

    #[error("data directory {0} is not initialized; run 'galaxydb init' first")]
    NotInitialized(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("empty input")]
    EmptyInput,

    #[error("{failed} rebuild stage(s) failed")]
    RebuildFailed { failed: usize },

    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Rebuild(#[from] RebuildError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CliError {
    pub fn code(&self) -> &str {
        match self {
            CliError::Config(e) => e.code(),
            CliError::AlreadyInitialized(_) => "GALAXY_CLI_ALREADY_INITIALIZED",
            CliError::NotInitialized(_) => "GALAXY_CLI_NOT_INITIALIZED",
            CliError::Io(_) => "GALAXY_CLI_IO_ERROR",
            CliError::EmptyInput => "GALAXY_CLI_EMPTY_INPUT",
            CliError::RebuildFailed { .. } => "GALAXY_CLI_REBUILD_FAILED",
            CliError::Record(e) => e.code(),
            CliError::Rebuild(e) => e.code(),
            CliError::Api(e) => e.code(),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
