//! Approximate and batched exact counts
//!
//! The approximate count reads an index's stored size and is O(1). The
//! exact count scans the record store, never an index, so it stays correct
//! while indexes are stale or mid-rebuild.

use std::sync::Arc;

use serde::Serialize;

use super::errors::{CountError, CountResult};
use crate::index::{IndexName, IndexRegistry};
use crate::observability::{log_event, Event, MetricsRegistry};
use crate::query::FilterSet;
use crate::record::{RecordStore, ScanCursor};

#[derive(Debug, Clone, Copy)]
pub struct CountLimits {
    pub default_batch_size: usize,
    pub max_batch_size: usize,
}

impl Default for CountLimits {
    fn default() -> Self {
        Self {
            default_batch_size: 500,
            max_batch_size: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproximateCount {
    pub index: IndexName,
    pub count: usize,
    /// True only when no filters apply and the index is not being rebuilt
    pub exact_hint: bool,
}

/// One step of an exact count
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountBatch {
    pub matched_in_batch: usize,
    pub scanned: usize,
    pub next_cursor: Option<String>,
    pub is_done: bool,
}

pub struct CountEstimator {
    store: Arc<dyn RecordStore>,
    indexes: Arc<IndexRegistry>,
    metrics: Arc<MetricsRegistry>,
    limits: CountLimits,
}

impl CountEstimator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        indexes: Arc<IndexRegistry>,
        metrics: Arc<MetricsRegistry>,
        limits: CountLimits,
    ) -> Self {
        Self {
            store,
            indexes,
            metrics,
            limits,
        }
    }

    pub(crate) fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Stored entry count of the index for `index`
    pub fn approximate(&self, index: IndexName, filters: &FilterSet) -> CountResult<ApproximateCount> {
        filters.validate()?;
        let slot = self.indexes.get(index)?;
        let count = slot.read()?.len();
        Ok(ApproximateCount {
            index,
            count,
            exact_hint: filters.is_empty() && !slot.is_rebuilding(),
        })
    }

    fn batch_size(&self, requested: Option<usize>) -> CountResult<usize> {
        let size = requested.unwrap_or(self.limits.default_batch_size);
        if size == 0 || size > self.limits.max_batch_size {
            return Err(CountError::BatchSizeInvalid {
                requested: size,
                max: self.limits.max_batch_size,
            });
        }
        Ok(size)
    }

    /// Counts matches in the next batch of records after `cursor`
    pub fn count_batch(
        &self,
        filters: &FilterSet,
        cursor: Option<&str>,
        batch_size: Option<usize>,
    ) -> CountResult<CountBatch> {
        filters.validate()?;
        let size = self.batch_size(batch_size)?;
        let position = ScanCursor::decode_opt(cursor)?;
        let page = self.store.scan(position, size)?;

        let matched = page
            .records
            .iter()
            .filter(|(_, galaxy)| filters.matches(galaxy))
            .count();

        self.metrics.increment_count_batches();
        log_event(
            Event::CountBatch,
            &[
                ("matched", &matched.to_string()),
                ("scanned", &page.records.len().to_string()),
            ],
        );

        Ok(CountBatch {
            matched_in_batch: matched,
            scanned: page.records.len(),
            next_cursor: page.continue_cursor.map(|c| c.encode()),
            is_done: page.is_done,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filter, FilterOp};
    use crate::record::{Field, Galaxy, GalaxyTable, MemoryRecordStore, RecordId};

    fn setup(n: usize) -> (GalaxyTable, CountEstimator) {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let indexes = Arc::new(IndexRegistry::all());
        let metrics = Arc::new(MetricsRegistry::new());
        let table = GalaxyTable::new(store.clone(), indexes.clone(), metrics.clone());
        for i in 0..n {
            let mut g = Galaxy::new(format!("g{}", i));
            g.dec = i as f64;
            table.insert(g).unwrap();
        }
        (
            table,
            CountEstimator::new(store, indexes, metrics, CountLimits::default()),
        )
    }

    #[test]
    fn test_approximate_reads_index_size() {
        let (_t, counter) = setup(12);
        let approx = counter.approximate(IndexName::Dec, &FilterSet::empty()).unwrap();
        assert_eq!(approx.count, 12);
        assert!(approx.exact_hint);

        let filters = FilterSet::new(vec![Filter::number(Field::Dec, FilterOp::Lt, 3.0)]).unwrap();
        let approx = counter.approximate(IndexName::Dec, &filters).unwrap();
        assert_eq!(approx.count, 12);
        assert!(!approx.exact_hint);
    }

    #[test]
    fn test_batches_walk_the_store() {
        let (_t, counter) = setup(25);
        let filters = FilterSet::new(vec![Filter::number(Field::Dec, FilterOp::Gte, 5.0)]).unwrap();
        let mut cursor: Option<String> = None;
        let mut total = 0;
        let mut batches = 0;
        loop {
            let batch = counter.count_batch(&filters, cursor.as_deref(), Some(10)).unwrap();
            total += batch.matched_in_batch;
            batches += 1;
            if batch.is_done {
                break;
            }
            cursor = batch.next_cursor;
        }
        assert_eq!(total, 20);
        assert_eq!(batches, 3);
    }

    #[test]
    fn test_stale_index_diverges_from_exact() {
        let (table, counter) = setup(10);
        table.store().delete(RecordId(4)).unwrap();
        let exact = counter.count_batch(&FilterSet::empty(), None, None).unwrap();
        let approx = counter.approximate(IndexName::Ra, &FilterSet::empty()).unwrap();
        assert_eq!(approx.count - exact.matched_in_batch, 1);
    }

    #[test]
    fn test_batch_size_bounds_and_bad_cursor() {
        let (_t, counter) = setup(1);
        assert!(matches!(
            counter.count_batch(&FilterSet::empty(), None, Some(5_001)),
            Err(CountError::BatchSizeInvalid { .. })
        ));
        assert_eq!(
            counter
                .count_batch(&FilterSet::empty(), Some("???"), None)
                .unwrap_err()
                .code(),
            "GALAXY_CURSOR_INVALID"
        );
    }
}
