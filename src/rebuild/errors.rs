//! Rebuild errors
//!
//! Per-batch failures inside a stage do not surface here: they move the
//! stage to `failed` and the run continues. These errors are for requests
//! the coordinator refuses outright.

use std::path::PathBuf;

use thiserror::Error;

use super::state::StageStatus;
use crate::index::{IndexError, IndexName};
use crate::record::RecordError;

pub type RebuildResult<T> = Result<T, RebuildError>;

#[derive(Debug, Error)]
pub enum RebuildError {
    #[error("stage {index} cannot move from {from} to {to}")]
    InvalidTransition {
        index: IndexName,
        from: StageStatus,
        to: StageStatus,
    },

    #[error("no rebuild stage recorded for index {0}")]
    NoSuchStage(IndexName),

    #[error("no failed or unfinished stages to retry")]
    NothingToRetry,

    #[error("concurrency must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("no indexes selected")]
    EmptySelection,

    #[error("rebuild run {0} is still in progress")]
    RunInProgress(uuid::Uuid),

    #[error("rebuild state io error at {path}: {source}")]
    StateIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rebuild state corrupted: {0}")]
    StateCorrupted(String),

    #[error("rebuild state lock poisoned")]
    LockPoisoned,

    #[error("background rebuild run panicked")]
    RunPanicked,

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl RebuildError {
    pub fn code(&self) -> &'static str {
        match self {
            RebuildError::InvalidTransition { .. } => "GALAXY_INVALID_STAGE_TRANSITION",
            RebuildError::NoSuchStage(_) => "GALAXY_NO_SUCH_STAGE",
            RebuildError::NothingToRetry => "GALAXY_NOTHING_TO_RETRY",
            RebuildError::InvalidConcurrency(_) => "GALAXY_INVALID_CONCURRENCY",
            RebuildError::EmptySelection => "GALAXY_EMPTY_SELECTION",
            RebuildError::RunInProgress(_) => "GALAXY_RUN_IN_PROGRESS",
            RebuildError::StateIo { .. } => "GALAXY_IO_ERROR",
            RebuildError::StateCorrupted(_) => "GALAXY_STATE_CORRUPTED",
            RebuildError::LockPoisoned | RebuildError::RunPanicked => "GALAXY_INTERNAL",
            RebuildError::Index(e) => e.code(),
            RebuildError::Record(e) => e.code(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            RebuildError::Index(e) => e.is_retryable(),
            RebuildError::StateIo { .. } | RebuildError::RunInProgress(_) => true,
            _ => false,
        }
    }

    pub(crate) fn state_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RebuildError::StateIo {
            path: path.into(),
            source,
        }
    }
}
