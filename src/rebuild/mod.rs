//! Resumable clear-and-rebuild of order-statistics indexes
//!
//! Each selected index goes through one stage:
//!
//! ```text
//! pending -> clearing -> rebuilding -> done
//! ```
//!
//! Clearing walks the index's own entries in batches. Rebuilding scans the
//! record store forward and inserts one batch of keys at a time, persisting
//! `{processed, cursor}` after every batch.
//!
//! Rebuilding while writes are live is unsafe: a record written after the
//! clear is indexed by the write path and collides with the rebuild scan
//! when it reaches that record. The stage then fails with a duplicate-key
//! error naming how many records had been processed. Pause writes and retry.

mod coordinator;
mod diagnostics;
mod errors;
mod persist;
mod runner;
mod state;

pub use coordinator::{RebuildCoordinator, RebuildSettings, RunReport};
pub use diagnostics::{stale_index_hint, StaleHint};
pub use errors::{RebuildError, RebuildResult};
pub use persist::{JsonFileStateStore, MemoryStateStore, RebuildStateStore};
pub use runner::{BatchSizes, RebuildBatch, StageRunner, StepOutcome};
pub use state::{RebuildSnapshot, RebuildStage, StageStatus, INTERRUPTED, STOPPED_BY_OPERATOR};
