//! Count errors

use thiserror::Error;

use crate::index::IndexError;
use crate::query::QueryError;
use crate::record::RecordError;

pub type CountResult<T> = Result<T, CountError>;

/// A failed batch aborts the whole exact count; a partial total is never
/// reported as final.
#[derive(Debug, Error)]
pub enum CountError {
    #[error("batch size {requested} outside 1..={max}")]
    BatchSizeInvalid { requested: usize, max: usize },

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl CountError {
    pub fn code(&self) -> &'static str {
        match self {
            CountError::BatchSizeInvalid { .. } => "GALAXY_BATCH_SIZE_INVALID",
            CountError::Query(e) => e.code(),
            CountError::Index(e) => e.code(),
            CountError::Record(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_pass_through() {
        let err: CountError = RecordError::InvalidCursor("x".into()).into();
        assert_eq!(err.code(), "GALAXY_CURSOR_INVALID");
        let err = CountError::BatchSizeInvalid { requested: 0, max: 10 };
        assert_eq!(err.code(), "GALAXY_BATCH_SIZE_INVALID");
    }
}
