//! Derived-field backfills
//!
//! Same resumable batch shape as an index rebuild: `{cursor} -> {updated,
//! scanned, continue_cursor, is_done}`.

mod errors;
mod numeric_id;

pub use errors::{BackfillError, BackfillResult};
pub use numeric_id::{BackfillBatch, NumericIdBackfill};
