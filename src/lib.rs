//! galaxydb - order-statistics indexes over a galaxy catalogue
//!
//! - `record`: galaxies, the primary store and the indexed write path
//! - `index`: counted B+ tree indexes with rank / at-rank / summary
//! - `query`: cursor-paginated browsing over any sort field and filter set
//! - `count`: approximate and batched exact counts
//! - `rebuild`: resumable clear-and-rebuild runs with persisted progress
//! - `backfill`: batched numeric-id assignment
//! - `api` / `cli`: JSON request layer and command line

pub mod api;
pub mod backfill;
pub mod cli;
pub mod config;
pub mod count;
pub mod index;
pub mod observability;
pub mod query;
pub mod rebuild;
pub mod record;
