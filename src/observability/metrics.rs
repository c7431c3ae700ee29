//! Operational counters
//!
//! Counters only, monotonic, reset on process start. Relaxed ordering is
//! enough because nothing synchronizes on these values.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters shared by the write path, rebuilds, browse and count
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    records_written: AtomicU64,
    index_entries_inserted: AtomicU64,
    index_entries_removed: AtomicU64,
    duplicate_key_failures: AtomicU64,
    rebuild_batches: AtomicU64,
    stages_done: AtomicU64,
    stages_failed: AtomicU64,
    browse_pages: AtomicU64,
    browse_candidates_scanned: AtomicU64,
    count_batches: AtomicU64,
    count_interruptions: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_records_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_index_entries_inserted(&self, n: u64) {
        self.index_entries_inserted.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_index_entries_removed(&self, n: u64) {
        self.index_entries_removed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn increment_duplicate_key_failures(&self) {
        self.duplicate_key_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rebuild_batches(&self) {
        self.rebuild_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stages_done(&self) {
        self.stages_done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_stages_failed(&self) {
        self.stages_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one served page and how many index candidates it examined
    pub fn record_browse_page(&self, candidates_scanned: u64) {
        self.browse_pages.fetch_add(1, Ordering::Relaxed);
        self.browse_candidates_scanned
            .fetch_add(candidates_scanned, Ordering::Relaxed);
    }

    pub fn increment_count_batches(&self) {
        self.count_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_count_interruptions(&self) {
        self.count_interruptions.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_written: self.records_written.load(Ordering::Relaxed),
            index_entries_inserted: self.index_entries_inserted.load(Ordering::Relaxed),
            index_entries_removed: self.index_entries_removed.load(Ordering::Relaxed),
            duplicate_key_failures: self.duplicate_key_failures.load(Ordering::Relaxed),
            rebuild_batches: self.rebuild_batches.load(Ordering::Relaxed),
            stages_done: self.stages_done.load(Ordering::Relaxed),
            stages_failed: self.stages_failed.load(Ordering::Relaxed),
            browse_pages: self.browse_pages.load(Ordering::Relaxed),
            browse_candidates_scanned: self.browse_candidates_scanned.load(Ordering::Relaxed),
            count_batches: self.count_batches.load(Ordering::Relaxed),
            count_interruptions: self.count_interruptions.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub records_written: u64,
    pub index_entries_inserted: u64,
    pub index_entries_removed: u64,
    pub duplicate_key_failures: u64,
    pub rebuild_batches: u64,
    pub stages_done: u64,
    pub stages_failed: u64,
    pub browse_pages: u64,
    pub browse_candidates_scanned: u64,
    pub count_batches: u64,
    pub count_interruptions: u64,
}
