//! Galaxy table: the record store plus synchronous index fan-out
//!
//! A write is complete only after every registered index has been updated.
//! Writes are serialized by a table-level lock so numeric id assignment
//! cannot hand out the same id twice.

use std::sync::{Arc, Mutex};

use super::errors::{RecordError, RecordResult};
use super::galaxy::{Galaxy, RecordId};
use super::scan::ScanCursor;
use super::store::RecordStore;
use crate::index::{IndexKey, IndexName, IndexRegistry, MISSING_SORTS_LAST};
use crate::observability::{log_event, Event, MetricsRegistry};

pub struct GalaxyTable {
    store: Arc<dyn RecordStore>,
    indexes: Arc<IndexRegistry>,
    metrics: Arc<MetricsRegistry>,
    write_lock: Mutex<()>,
}

impl GalaxyTable {
    pub fn new(
        store: Arc<dyn RecordStore>,
        indexes: Arc<IndexRegistry>,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            store,
            indexes,
            metrics,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn indexes(&self) -> &Arc<IndexRegistry> {
        &self.indexes
    }

    pub fn get(&self, id: RecordId) -> RecordResult<Option<Galaxy>> {
        self.store.get(id)
    }

    /// Stores a new galaxy and indexes it. A galaxy without a numeric id is
    /// given the next one.
    pub fn insert(&self, mut galaxy: Galaxy) -> RecordResult<RecordId> {
        galaxy.validate()?;
        let _guard = self.write_lock.lock().map_err(|_| RecordError::LockPoisoned)?;
        if galaxy.numeric_id.is_none() {
            galaxy.numeric_id = Some(next_numeric_id(self.max_numeric_id()?)?);
        }
        let id = self.store.allocate_id();
        self.store.put(id, galaxy.clone())?;
        let added = self.indexes.on_insert(id, &galaxy)?;

        self.metrics.increment_records_written();
        self.metrics.add_index_entries_inserted(added as u64);
        log_event(
            Event::RecordInserted,
            &[("record", &id.to_string()), ("galaxy", &galaxy.id)],
        );
        Ok(id)
    }

    /// Stores and indexes a galaxy exactly as given. Used when loading a
    /// dataset, where missing numeric ids are left for the backfill.
    pub fn import(&self, galaxy: Galaxy) -> RecordResult<RecordId> {
        galaxy.validate()?;
        let _guard = self.write_lock.lock().map_err(|_| RecordError::LockPoisoned)?;
        let id = self.store.allocate_id();
        self.store.put(id, galaxy.clone())?;
        let added = self.indexes.on_insert(id, &galaxy)?;
        self.metrics.add_index_entries_inserted(added as u64);
        Ok(id)
    }

    /// Replaces a stored galaxy, re-keying only indexes whose key changed
    pub fn update(&self, id: RecordId, galaxy: Galaxy) -> RecordResult<()> {
        galaxy.validate()?;
        let _guard = self.write_lock.lock().map_err(|_| RecordError::LockPoisoned)?;
        let old = self.store.get(id)?.ok_or(RecordError::NotFound(id.0))?;
        self.store.put(id, galaxy.clone())?;
        let touched = self.indexes.on_update(id, &old, &galaxy)? as u64;
        self.metrics.increment_records_written();
        self.metrics.add_index_entries_removed(touched);
        self.metrics.add_index_entries_inserted(touched);
        Ok(())
    }

    pub fn delete(&self, id: RecordId) -> RecordResult<Galaxy> {
        let _guard = self.write_lock.lock().map_err(|_| RecordError::LockPoisoned)?;
        let old = self.store.delete(id)?.ok_or(RecordError::NotFound(id.0))?;
        let removed = self.indexes.on_delete(id)?;
        self.metrics.increment_records_written();
        self.metrics.add_index_entries_removed(removed as u64);
        log_event(Event::RecordDeleted, &[("record", &id.to_string())]);
        Ok(old)
    }

    /// Largest assigned numeric id, or 0 when none exists. Uses the
    /// numericId index when it is registered and falls back to a scan.
    pub fn max_numeric_id(&self) -> RecordResult<i64> {
        if let Ok(slot) = self.indexes.get(IndexName::NumericId) {
            // A partially rebuilt index may be missing the maximum
            let index = slot.read()?;
            if index.len() == self.store.len()? {
                let assigned = index.rank(&IndexKey::int(MISSING_SORTS_LAST));
                return Ok(match assigned {
                    0 => 0,
                    n => match index.at_rank(n - 1) {
                        Some(IndexKey::Int(v)) => *v,
                        _ => 0,
                    },
                });
            }
        }
        self.scan_max_numeric_id()
    }

    fn scan_max_numeric_id(&self) -> RecordResult<i64> {
        let mut max = 0;
        let mut cursor: Option<ScanCursor> = None;
        loop {
            let page = self.store.scan(cursor, 1_000)?;
            for (_, g) in &page.records {
                if let Some(n) = g.numeric_id {
                    max = max.max(n);
                }
            }
            if page.is_done {
                return Ok(max);
            }
            cursor = page.continue_cursor;
        }
    }
}

/// Numeric id following `current`. Ids stop short of the missing-value key.
pub(crate) fn next_numeric_id(current: i64) -> RecordResult<i64> {
    match current.checked_add(1) {
        Some(next) if next < MISSING_SORTS_LAST => Ok(next),
        _ => Err(RecordError::NumericIdsExhausted(current)),
    }
}
