//! Browse queries
//!
//! Filters, opaque cursors and the page engine that walks an
//! order-statistics index (or scans the table) to serve one page.

mod bounds;
mod browse;
mod cursor;
mod errors;
mod filters;

pub use bounds::{PageBounds, Range};
pub use browse::{BrowseEngine, BrowsePage, BrowseRecord, BrowseRequest, PageLimits};
pub use cursor::{BrowseCursor, Direction, SortOrder};
pub use errors::{QueryError, QueryResult};
pub use filters::{Filter, FilterOp, FilterSet, FilterValue};
