//! Record store errors

use std::path::PathBuf;

use thiserror::Error;

use crate::index::IndexError;

/// Result type for record store and table operations
pub type RecordResult<T> = Result<T, RecordError>;

#[derive(Debug, Error)]
pub enum RecordError {
    /// No record with this id
    #[error("record {0} not found")]
    NotFound(u64),

    /// A record failed field validation
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// A scan continuation token could not be decoded
    #[error("invalid scan cursor: {0}")]
    InvalidCursor(String),

    /// Dataset file could not be read or written
    #[error("dataset io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A dataset line is not a valid galaxy
    #[error("dataset line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Every numeric id below the missing-value key is taken
    #[error("numeric ids exhausted after {0}")]
    NumericIdsExhausted(i64),

    /// A lock guarding the store was poisoned by a panicking writer
    #[error("record store lock poisoned")]
    LockPoisoned,

    /// Index fan-out failed after the store was updated
    #[error("index update failed: {0}")]
    Index(#[from] IndexError),
}

impl RecordError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::NotFound(_) => "GALAXY_RECORD_NOT_FOUND",
            RecordError::InvalidRecord(_) => "GALAXY_INVALID_RECORD",
            RecordError::InvalidCursor(_) => "GALAXY_CURSOR_INVALID",
            RecordError::Io { .. } => "GALAXY_IO_ERROR",
            RecordError::Parse { .. } => "GALAXY_DATASET_PARSE",
            RecordError::NumericIdsExhausted(_) => "GALAXY_NUMERIC_IDS_EXHAUSTED",
            RecordError::LockPoisoned => "GALAXY_INTERNAL",
            RecordError::Index(e) => e.code(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecordError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(RecordError::NotFound(3).code(), "GALAXY_RECORD_NOT_FOUND");
        assert_eq!(
            RecordError::InvalidCursor("x".into()).code(),
            "GALAXY_CURSOR_INVALID"
        );
    }

    #[test]
    fn test_display_includes_line() {
        let err = RecordError::Parse {
            line: 7,
            message: "missing field `ra`".into(),
        };
        assert!(err.to_string().contains("line 7"));
    }
}
