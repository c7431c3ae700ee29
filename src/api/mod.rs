//! JSON API
//!
//! Transport-agnostic request/response layer over every subsystem. The CLI
//! feeds it one JSON object per line.
//!
//! Operations: browse, offsetCursor, countBatch, countApproximate,
//! countExact, indexSummary, summaries, clearIndex, rebuildIndexBatch,
//! runRebuild, rebuildStatus, retryStage, retryFailed, stopRebuild,
//! staleHint, backfillBatch, insertGalaxy, deleteGalaxy, metrics.

mod errors;
mod handler;
mod request;
mod response;

pub use errors::{ApiError, ApiErrorCode, ApiResult};
pub use handler::{ApiHandler, Subsystems};
pub use request::{
    BackfillArgs, CountApproximateArgs, CountBatchArgs, CountExactArgs, DeleteArgs, IndexArgs,
    InsertArgs, OffsetCursorArgs, RebuildBatchArgs, Request, RetryFailedArgs, RunRebuildArgs,
};
pub use response::{ErrorResponse, Response, SuccessResponse};
