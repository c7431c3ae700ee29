//! Browse query errors

use thiserror::Error;

use crate::index::IndexError;
use crate::record::{Field, RecordError};

/// Result type for browse operations
pub type QueryResult<T> = Result<T, QueryError>;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// The caller should restart from the first page
    #[error("invalid cursor: {0}; restart from the first page")]
    CursorInvalid(String),

    #[error("page size {requested} outside 1..={max}")]
    PageSizeInvalid { requested: usize, max: usize },

    #[error("offset jumps are only available without filters")]
    OffsetRequiresUnfiltered,

    #[error("offset {offset} beyond the {len} indexed records")]
    OffsetOutOfRange { offset: usize, len: usize },

    #[error("field {0} has no maintained index")]
    NoIndex(Field),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl QueryError {
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::InvalidFilter(_) => "GALAXY_INVALID_FILTER",
            QueryError::CursorInvalid(_) => "GALAXY_CURSOR_INVALID",
            QueryError::PageSizeInvalid { .. } => "GALAXY_PAGE_SIZE_INVALID",
            QueryError::OffsetRequiresUnfiltered => "GALAXY_OFFSET_REQUIRES_UNFILTERED",
            QueryError::OffsetOutOfRange { .. } => "GALAXY_OFFSET_OUT_OF_RANGE",
            QueryError::NoIndex(_) => "GALAXY_NO_INDEX",
            QueryError::Index(e) => e.code(),
            QueryError::Record(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_invalid_suggests_restart() {
        let err = QueryError::CursorInvalid("bad base64".into());
        assert_eq!(err.code(), "GALAXY_CURSOR_INVALID");
        assert!(err.to_string().contains("restart from the first page"));
    }
}
