//! Counts for a browse query
//!
//! - `approximate`: the sort index's stored count, O(1)
//! - `count_batch`: one filtered batch of an exact store scan
//! - `ExactCountScan`: drives batches to completion with cooperative stop

mod errors;
mod estimator;
mod exact;

pub use errors::{CountError, CountResult};
pub use estimator::{ApproximateCount, CountBatch, CountEstimator, CountLimits};
pub use exact::{CountOutcome, CountProgress, ExactCountScan};
