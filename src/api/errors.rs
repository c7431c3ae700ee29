//! API error types
//!
//! API errors are pass-through: the code of the subsystem error that caused
//! them is preserved unchanged, so a client sees `GALAXY_INDEX_BUSY` rather
//! than a generic failure.

use std::fmt;

use crate::backfill::BackfillError;
use crate::count::CountError;
use crate::index::IndexError;
use crate::query::QueryError;
use crate::rebuild::RebuildError;
use crate::record::RecordError;

/// API-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    /// Malformed JSON or missing/ill-typed arguments
    InvalidRequest,
    /// `op` names no known operation
    UnknownOperation,
    /// Response could not be serialized
    Internal,
}

impl ApiErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidRequest => "GALAXY_INVALID_REQUEST",
            ApiErrorCode::UnknownOperation => "GALAXY_UNKNOWN_OPERATION",
            ApiErrorCode::Internal => "GALAXY_INTERNAL",
        }
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// API error with the originating subsystem code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    code: &'static str,
    message: String,
    retryable: bool,
}

impl ApiError {
    fn new(code: &'static str, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
        }
    }

    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InvalidRequest.code(), reason, false)
    }

    pub fn unknown_operation(op: impl Into<String>) -> Self {
        Self::new(
            ApiErrorCode::UnknownOperation.code(),
            format!("unknown operation: {}", op.into()),
            false,
        )
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::Internal.code(), reason, false)
    }

    pub fn code(&self) -> &str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether repeating the same request later can succeed
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<RecordError> for ApiError {
    fn from(err: RecordError) -> Self {
        Self::new(err.code(), err.to_string(), false)
    }
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        Self::new(err.code(), err.to_string(), err.is_retryable())
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self::new(err.code(), err.to_string(), false)
    }
}

impl From<CountError> for ApiError {
    fn from(err: CountError) -> Self {
        Self::new(err.code(), err.to_string(), false)
    }
}

impl From<RebuildError> for ApiError {
    fn from(err: RebuildError) -> Self {
        Self::new(err.code(), err.to_string(), err.is_retryable())
    }
}

impl From<BackfillError> for ApiError {
    fn from(err: BackfillError) -> Self {
        Self::new(err.code(), err.to_string(), false)
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexName;

    #[test]
    fn test_invalid_request_error() {
        let err = ApiError::invalid_request("missing field");
        assert_eq!(err.code(), "GALAXY_INVALID_REQUEST");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_subsystem_codes_pass_through() {
        let err: ApiError = RebuildError::from(IndexError::IndexBusy(IndexName::Ra)).into();
        assert_eq!(err.code(), "GALAXY_INDEX_BUSY");
        assert!(err.is_retryable());
        assert!(err.message().contains("ra"));

        let err = ApiError::unknown_operation("dropDatabase");
        assert_eq!(err.code(), "GALAXY_UNKNOWN_OPERATION");
        assert!(err.message().contains("dropDatabase"));
    }
}
