//! Order-statistics indexes
//!
//! One index per sortable galaxy field. Each index answers
//! - how many entries sort before a key (`rank`)
//! - which key sits at a rank (`at_rank`)
//! - count/min/max (`summary`)
//!
//! in logarithmic time on top of a counted B+ tree. The registry ties each
//! `IndexName` to its instance and key extractor.

mod aggregate;
mod errors;
mod key;
mod name;
mod registry;
mod tree;

pub use aggregate::{AggregateSummary, OrderStatisticsIndex};
pub use errors::{IndexError, IndexResult};
pub use key::{IndexKey, KeyKind, MISSING_SORTS_LAST};
pub use name::{sort_key, IndexName, KeyExtractor};
pub use registry::{IndexRegistry, IndexSlot, RebuildLease};
pub use tree::{Entry, OrderTree};
