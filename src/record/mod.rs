//! Galaxy records and the primary store
//!
//! - `Galaxy`: one catalogue row with typed field access
//! - `RecordStore`: get/put/delete and a stable forward scan
//! - `GalaxyTable`: the write path that keeps every index in step

mod errors;
mod galaxy;
mod scan;
mod store;
mod table;

pub use errors::{RecordError, RecordResult};
pub use galaxy::{Field, FieldType, FieldValue, Galaxy, RecordId};
pub use scan::{ScanCursor, ScanPage, StopSignal};
pub use store::{load_jsonl, save_jsonl, MemoryRecordStore, RecordStore};
pub use table::GalaxyTable;
pub(crate) use table::next_numeric_id;
