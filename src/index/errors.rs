//! Index errors
//!
//! - `GALAXY_INVALID_KEY`: value cannot be ordered (NaN, wrong kind)
//! - `GALAXY_DUPLICATE_KEY`: a record already has an entry in this index
//! - `GALAXY_INDEX_ENTRY_NOT_FOUND`: delete/replace of an absent entry
//! - `GALAXY_INDEX_BUSY`: a rebuild already holds the index

use thiserror::Error;

use super::name::IndexName;
use crate::record::RecordId;

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    #[error("invalid key for index {index}: {reason}")]
    InvalidKey { index: IndexName, reason: String },

    #[error("duplicate key in index {index}: record {record} already has an entry")]
    DuplicateKey { index: IndexName, record: RecordId },

    #[error("index {index} has no entry for record {record}")]
    NotFound { index: IndexName, record: RecordId },

    #[error("index {0} is busy with another rebuild")]
    IndexBusy(IndexName),

    #[error("index {0} is not registered")]
    NotRegistered(IndexName),

    #[error("unknown index name '{0}'")]
    UnknownName(String),

    #[error("index {0} lock poisoned")]
    LockPoisoned(IndexName),
}

impl IndexError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            IndexError::InvalidKey { .. } => "GALAXY_INVALID_KEY",
            IndexError::DuplicateKey { .. } => "GALAXY_DUPLICATE_KEY",
            IndexError::NotFound { .. } => "GALAXY_INDEX_ENTRY_NOT_FOUND",
            IndexError::IndexBusy(_) => "GALAXY_INDEX_BUSY",
            IndexError::NotRegistered(_) => "GALAXY_INDEX_NOT_REGISTERED",
            IndexError::UnknownName(_) => "GALAXY_UNKNOWN_INDEX",
            IndexError::LockPoisoned(_) => "GALAXY_INTERNAL",
        }
    }

    /// Busy indexes free up once the running rebuild finishes; duplicate
    /// keys clear after a clean rebuild with writes paused.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IndexError::IndexBusy(_) | IndexError::DuplicateKey { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_retry() {
        let dup = IndexError::DuplicateKey {
            index: IndexName::Ra,
            record: RecordId(9),
        };
        assert_eq!(dup.code(), "GALAXY_DUPLICATE_KEY");
        assert!(dup.is_retryable());
        assert!(dup.to_string().contains("record 9"));

        let invalid = IndexError::InvalidKey {
            index: IndexName::Mag,
            reason: "NaN".into(),
        };
        assert_eq!(invalid.code(), "GALAXY_INVALID_KEY");
        assert!(!invalid.is_retryable());
        assert!(IndexError::IndexBusy(IndexName::Q).is_retryable());
    }
}
