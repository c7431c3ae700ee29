//! Backfill errors

use thiserror::Error;

use crate::record::RecordError;

pub type BackfillResult<T> = Result<T, BackfillError>;

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("backfill batch size must be at least 1")]
    BatchSizeInvalid,

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl BackfillError {
    pub fn code(&self) -> &'static str {
        match self {
            BackfillError::BatchSizeInvalid => "GALAXY_BATCH_SIZE_INVALID",
            BackfillError::Record(e) => e.code(),
        }
    }
}
