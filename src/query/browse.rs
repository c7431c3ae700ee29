//! Browse engine
//!
//! Serves one page of galaxies matching a filter set, ordered by any field.
//!
//! When the sort field has a maintained index the engine walks that index
//! outward from the cursor anchor, fetches each candidate's body and keeps
//! those that pass every filter. It stops after `page_size + 1` matches; the
//! extra one only tells whether another page exists. Fields without an
//! index fall back to a full filtered scan followed by an in-memory sort.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::bounds::PageBounds;
use super::cursor::{BrowseCursor, Direction, SortOrder};
use super::errors::{QueryError, QueryResult};
use super::filters::FilterSet;
use crate::index::{sort_key, Entry, IndexName, IndexRegistry, IndexSlot};
use crate::observability::{log_event, Event, MetricsRegistry};
use crate::record::{Field, Galaxy, RecordId, RecordStore, ScanCursor};

const MIN_WINDOW: usize = 32;
const MAX_WINDOW: usize = 1_024;
const FALLBACK_SCAN_BATCH: usize = 1_000;

/// Page size policy
#[derive(Debug, Clone, Copy)]
pub struct PageLimits {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            max_page_size: 500,
        }
    }
}

fn default_sort() -> Field {
    Field::NumericId
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseRequest {
    #[serde(default = "default_sort")]
    pub sort: Field,
    #[serde(default)]
    pub order: SortOrder,
    #[serde(default)]
    pub filters: FilterSet,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

impl BrowseRequest {
    pub fn new(sort: Field, order: SortOrder) -> Self {
        Self {
            sort,
            order,
            filters: FilterSet::empty(),
            cursor: None,
            page_size: None,
        }
    }

    pub fn with_filters(mut self, filters: FilterSet) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_cursor(mut self, cursor: Option<String>) -> Self {
        self.cursor = cursor;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseRecord {
    pub record_id: RecordId,
    #[serde(flatten)]
    pub galaxy: Galaxy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowsePage {
    pub records: Vec<BrowseRecord>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    pub has_next: bool,
    pub has_previous: bool,
    pub bounds: PageBounds,
    /// Index entries or table rows examined to build this page
    pub candidates_scanned: usize,
    pub used_index: bool,
}

/// Rows in display order plus neighbour flags
struct RawPage {
    rows: Vec<(Entry, Galaxy)>,
    has_next: bool,
    has_previous: bool,
}

pub struct BrowseEngine {
    store: Arc<dyn RecordStore>,
    indexes: Arc<IndexRegistry>,
    metrics: Arc<MetricsRegistry>,
    limits: PageLimits,
}

impl BrowseEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        indexes: Arc<IndexRegistry>,
        metrics: Arc<MetricsRegistry>,
        limits: PageLimits,
    ) -> Self {
        Self {
            store,
            indexes,
            metrics,
            limits,
        }
    }

    fn page_size(&self, requested: Option<usize>) -> QueryResult<usize> {
        let size = requested.unwrap_or(self.limits.default_page_size);
        if size == 0 || size > self.limits.max_page_size {
            return Err(QueryError::PageSizeInvalid {
                requested: size,
                max: self.limits.max_page_size,
            });
        }
        Ok(size)
    }

    fn index_for(&self, field: Field) -> Option<&Arc<IndexSlot>> {
        IndexName::for_field(field).and_then(|name| self.indexes.get(name).ok())
    }

    pub fn browse(&self, req: &BrowseRequest) -> QueryResult<BrowsePage> {
        req.filters.validate()?;
        let page_size = self.page_size(req.page_size)?;
        let fingerprint = req.filters.fingerprint();
        let cursor = match &req.cursor {
            Some(token) => Some(
                BrowseCursor::decode_for(token, req.sort, req.order, &fingerprint).map_err(|e| {
                    log_event(Event::CursorRejected, &[("reason", &e.to_string())]);
                    e
                })?,
            ),
            None => None,
        };

        let mut scanned = 0;
        let slot = self.index_for(req.sort);
        let raw = match slot {
            Some(slot) => self.page_from_index(slot, req, cursor.as_ref(), page_size, &mut scanned)?,
            None => self.page_from_scan(req, cursor.as_ref(), page_size, &mut scanned)?,
        };

        let mint = |direction: Direction, entry: &Entry| {
            BrowseCursor::new(req.sort, req.order, fingerprint.clone(), direction, entry).encode()
        };
        let next_cursor = match raw.rows.last() {
            Some((entry, _)) if raw.has_next => Some(mint(Direction::After, entry)),
            _ => None,
        };
        let prev_cursor = match raw.rows.first() {
            Some((entry, _)) if raw.has_previous => Some(mint(Direction::Before, entry)),
            _ => None,
        };

        let records: Vec<BrowseRecord> = raw
            .rows
            .into_iter()
            .map(|(entry, galaxy)| BrowseRecord {
                record_id: entry.id,
                galaxy,
            })
            .collect();
        let bounds = PageBounds::compute(records.iter().map(|r| &r.galaxy));

        self.metrics.record_browse_page(scanned as u64);
        log_event(
            Event::BrowseServed,
            &[
                ("sort", req.sort.as_str()),
                ("records", &records.len().to_string()),
                ("scanned", &scanned.to_string()),
            ],
        );

        Ok(BrowsePage {
            records,
            next_cursor,
            prev_cursor,
            has_next: raw.has_next,
            has_previous: raw.has_previous,
            bounds,
            candidates_scanned: scanned,
            used_index: slot.is_some(),
        })
    }

    fn page_from_index(
        &self,
        slot: &IndexSlot,
        req: &BrowseRequest,
        cursor: Option<&BrowseCursor>,
        page_size: usize,
        scanned: &mut usize,
    ) -> QueryResult<RawPage> {
        let forward = req.order == SortOrder::Asc;
        let filters = &req.filters;

        match cursor {
            Some(c) if c.direction == Direction::Before => {
                let anchor = c.anchor();
                let mut rows = self.walk(slot, Some(&anchor), !forward, filters, page_size + 1, scanned)?;
                let has_previous = rows.len() > page_size;
                rows.truncate(page_size);
                rows.reverse();
                let has_next = match rows.last() {
                    Some((last, _)) => !self.walk(slot, Some(last), forward, filters, 1, scanned)?.is_empty(),
                    None => true,
                };
                Ok(RawPage {
                    rows,
                    has_next,
                    has_previous,
                })
            }
            _ => {
                let anchor = cursor.map(BrowseCursor::anchor);
                let mut rows = self.walk(slot, anchor.as_ref(), forward, filters, page_size + 1, scanned)?;
                let has_next = rows.len() > page_size;
                rows.truncate(page_size);
                let has_previous = match (&anchor, rows.first()) {
                    (None, _) => false,
                    (Some(_), Some((first, _))) => {
                        !self.walk(slot, Some(first), !forward, filters, 1, scanned)?.is_empty()
                    }
                    (Some(_), None) => true,
                };
                Ok(RawPage {
                    rows,
                    has_next,
                    has_previous,
                })
            }
        }
    }

    /// Collects up to `want` matching rows strictly beyond `from`, walking
    /// the index in ascending key order when `ascending` is set.
    ///
    /// Each window re-anchors on the last entry seen, so concurrent writes
    /// between windows can shift ranks without repeating entries.
    fn walk(
        &self,
        slot: &IndexSlot,
        from: Option<&Entry>,
        ascending: bool,
        filters: &FilterSet,
        want: usize,
        scanned: &mut usize,
    ) -> QueryResult<Vec<(Entry, Galaxy)>> {
        let window = want.clamp(MIN_WINDOW, MAX_WINDOW);
        let mut anchor = from.cloned();
        let mut out = Vec::new();

        loop {
            let batch = {
                let index = slot.read()?;
                if ascending {
                    let start = match &anchor {
                        None => 0,
                        Some(a) => index.rank_of(&a.key, RecordId(a.id.0.saturating_add(1))),
                    };
                    index.entries(start, window)
                } else {
                    let end = match &anchor {
                        None => index.len(),
                        Some(a) => index.rank_of(&a.key, a.id),
                    };
                    let start = end.saturating_sub(window);
                    let mut entries = index.entries(start, end - start);
                    entries.reverse();
                    entries
                }
            };
            let exhausted = batch.len() < window;

            for entry in batch {
                *scanned += 1;
                anchor = Some(entry.clone());
                // Entries whose record is gone belong to a stale index
                if let Some(galaxy) = self.store.get(entry.id)? {
                    if filters.matches(&galaxy) {
                        out.push((entry, galaxy));
                        if out.len() >= want {
                            return Ok(out);
                        }
                    }
                }
            }
            if exhausted {
                return Ok(out);
            }
        }
    }

    fn page_from_scan(
        &self,
        req: &BrowseRequest,
        cursor: Option<&BrowseCursor>,
        page_size: usize,
        scanned: &mut usize,
    ) -> QueryResult<RawPage> {
        log_event(Event::BrowseFallbackScan, &[("sort", req.sort.as_str())]);

        let mut rows = Vec::new();
        let mut position: Option<ScanCursor> = None;
        loop {
            let page = self.store.scan(position, FALLBACK_SCAN_BATCH)?;
            for (id, galaxy) in page.records {
                *scanned += 1;
                if !req.filters.matches(&galaxy) {
                    continue;
                }
                if let Some(key) = sort_key(req.sort, &galaxy) {
                    rows.push((Entry::new(key, id), galaxy));
                }
            }
            if page.is_done {
                break;
            }
            position = page.continue_cursor;
        }

        let ascending = req.order == SortOrder::Asc;
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        if !ascending {
            rows.reverse();
        }
        let precedes = |e: &Entry, anchor: &Entry| if ascending { e < anchor } else { e > anchor };

        let (start, end) = match cursor {
            None => (0, page_size.min(rows.len())),
            Some(c) => {
                let anchor = c.anchor();
                match c.direction {
                    Direction::After => {
                        let s = rows.partition_point(|(e, _)| precedes(e, &anchor) || *e == anchor);
                        (s, (s + page_size).min(rows.len()))
                    }
                    Direction::Before => {
                        let e = rows.partition_point(|(e, _)| precedes(e, &anchor));
                        (e.saturating_sub(page_size), e)
                    }
                }
            }
        };
        let has_previous = start > 0;
        let has_next = end < rows.len();
        let rows = rows.drain(start..end).collect();
        Ok(RawPage {
            rows,
            has_next,
            has_previous,
        })
    }

    /// Cursor whose next forward page starts at the `offset`-th record in
    /// sort order. Offset zero is the first page and needs no cursor.
    pub fn cursor_at_offset(
        &self,
        sort: Field,
        order: SortOrder,
        filters: &FilterSet,
        offset: usize,
    ) -> QueryResult<Option<String>> {
        if !filters.is_empty() {
            return Err(QueryError::OffsetRequiresUnfiltered);
        }
        let slot = self.index_for(sort).ok_or(QueryError::NoIndex(sort))?;
        let index = slot.read()?;
        let len = index.len();
        if offset > len {
            return Err(QueryError::OffsetOutOfRange { offset, len });
        }
        if offset == 0 {
            return Ok(None);
        }
        let rank = match order {
            SortOrder::Asc => offset - 1,
            SortOrder::Desc => len - offset,
        };
        let anchor = index
            .entry_at(rank)
            .ok_or(QueryError::OffsetOutOfRange { offset, len })?;
        Ok(Some(
            BrowseCursor::new(sort, order, filters.fingerprint(), Direction::After, anchor).encode(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filter, FilterOp};
    use crate::record::{GalaxyTable, MemoryRecordStore};

    fn setup(n: usize, names: &[IndexName]) -> (GalaxyTable, BrowseEngine) {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let indexes = Arc::new(IndexRegistry::with_indexes(names));
        let metrics = Arc::new(MetricsRegistry::new());
        let table = GalaxyTable::new(store.clone(), indexes.clone(), metrics.clone());
        for i in 0..n {
            let mut g = Galaxy::new(format!("g{:04}", i));
            g.ra = ((i * 37) % 100) as f64;
            g.reff_pixels = ((i * 13) % 50) as f64;
            g.nucleus = i % 3 == 0;
            table.insert(g).unwrap();
        }
        let engine = BrowseEngine::new(store, indexes, metrics, PageLimits::default());
        (table, engine)
    }

    fn ids(page: &BrowsePage) -> Vec<u64> {
        page.records.iter().map(|r| r.record_id.0).collect()
    }

    #[test]
    fn test_first_page_in_key_order() {
        let (_t, engine) = setup(50, &IndexName::ALL);
        let page = engine
            .browse(&BrowseRequest::new(Field::Ra, SortOrder::Asc).with_page_size(10))
            .unwrap();
        assert_eq!(page.records.len(), 10);
        assert!(page.has_next);
        assert!(!page.has_previous);
        assert!(page.prev_cursor.is_none());
        assert!(page.used_index);
        let ras: Vec<f64> = page.records.iter().map(|r| r.galaxy.ra).collect();
        assert!(ras.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_desc_next_then_prev_returns_same_page() {
        let (_t, engine) = setup(40, &IndexName::ALL);
        let base = BrowseRequest::new(Field::Ra, SortOrder::Desc).with_page_size(7);
        let first = engine.browse(&base).unwrap();
        let second = engine
            .browse(&base.clone().with_cursor(first.next_cursor.clone()))
            .unwrap();
        assert!(second.has_previous);
        let back = engine
            .browse(&base.clone().with_cursor(second.prev_cursor.clone()))
            .unwrap();
        assert_eq!(ids(&back), ids(&first));
        assert!(!back.has_previous);
    }

    #[test]
    fn test_filters_apply_to_other_fields() {
        let (_t, engine) = setup(60, &IndexName::ALL);
        let filters = FilterSet::new(vec![Filter::new(
            Field::Nucleus,
            FilterOp::Eq,
            crate::query::FilterValue::Bool(true),
        )])
        .unwrap();
        let page = engine
            .browse(
                &BrowseRequest::new(Field::Ra, SortOrder::Asc)
                    .with_filters(filters)
                    .with_page_size(100),
            )
            .unwrap();
        assert_eq!(page.records.len(), 20);
        assert!(page.records.iter().all(|r| r.galaxy.nucleus));
        assert_eq!(page.bounds.nucleus_count, 20);
        assert!(!page.has_next);
    }

    #[test]
    fn test_fallback_scan_for_unindexed_field() {
        let (_t, engine) = setup(30, &IndexName::ALL);
        let base = BrowseRequest::new(Field::ReffPixels, SortOrder::Asc).with_page_size(12);
        let first = engine.browse(&base).unwrap();
        assert!(!first.used_index);
        assert_eq!(first.candidates_scanned, 30);
        let second = engine
            .browse(&base.clone().with_cursor(first.next_cursor.clone()))
            .unwrap();
        let third = engine
            .browse(&base.clone().with_cursor(second.next_cursor.clone()))
            .unwrap();
        assert_eq!(third.records.len(), 6);
        assert!(!third.has_next);

        let mut all: Vec<u64> = [ids(&first), ids(&second), ids(&third)].concat();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 30);
    }

    #[test]
    fn test_sort_field_without_registered_index_falls_back() {
        let (_t, engine) = setup(10, &[IndexName::Dec]);
        let page = engine
            .browse(&BrowseRequest::new(Field::Ra, SortOrder::Desc))
            .unwrap();
        assert!(!page.used_index);
        assert_eq!(page.records.len(), 10);
        assert_eq!(page.records[0].galaxy.ra, 96.0);
    }

    #[test]
    fn test_cursor_from_other_query_rejected() {
        let (_t, engine) = setup(20, &IndexName::ALL);
        let page = engine
            .browse(&BrowseRequest::new(Field::Ra, SortOrder::Asc).with_page_size(5))
            .unwrap();
        let err = engine
            .browse(&BrowseRequest::new(Field::Dec, SortOrder::Asc).with_cursor(page.next_cursor))
            .unwrap_err();
        assert!(matches!(err, QueryError::CursorInvalid(_)));
    }

    #[test]
    fn test_page_size_limits() {
        let (_t, engine) = setup(1, &IndexName::ALL);
        for size in [0, 501] {
            assert!(matches!(
                engine.browse(&BrowseRequest::new(Field::Ra, SortOrder::Asc).with_page_size(size)),
                Err(QueryError::PageSizeInvalid { .. })
            ));
        }
    }

    #[test]
    fn test_cursor_at_offset_matches_paging() {
        let (_t, engine) = setup(45, &IndexName::ALL);
        for order in [SortOrder::Asc, SortOrder::Desc] {
            let base = BrowseRequest::new(Field::Ra, order).with_page_size(10);
            let first = engine.browse(&base).unwrap();
            let second = engine
                .browse(&base.clone().with_cursor(first.next_cursor.clone()))
                .unwrap();

            let jump = engine
                .cursor_at_offset(Field::Ra, order, &FilterSet::empty(), 10)
                .unwrap();
            let jumped = engine.browse(&base.clone().with_cursor(jump)).unwrap();
            assert_eq!(ids(&jumped), ids(&second));
        }
        assert_eq!(
            engine
                .cursor_at_offset(Field::Ra, SortOrder::Asc, &FilterSet::empty(), 0)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_cursor_at_offset_rejects_filters_and_overflow() {
        let (_t, engine) = setup(5, &IndexName::ALL);
        let filters = FilterSet::new(vec![Filter::number(Field::Ra, FilterOp::Gt, 1.0)]).unwrap();
        assert!(matches!(
            engine.cursor_at_offset(Field::Ra, SortOrder::Asc, &filters, 2),
            Err(QueryError::OffsetRequiresUnfiltered)
        ));
        assert!(matches!(
            engine.cursor_at_offset(Field::Ra, SortOrder::Asc, &FilterSet::empty(), 6),
            Err(QueryError::OffsetOutOfRange { .. })
        ));
        assert!(matches!(
            engine.cursor_at_offset(Field::ReffPixels, SortOrder::Asc, &FilterSet::empty(), 1),
            Err(QueryError::NoIndex(Field::ReffPixels))
        ));
    }

    #[test]
    fn test_stale_index_entries_are_skipped() {
        let (table, engine) = setup(10, &IndexName::ALL);
        // Remove bodies behind the indexes' back
        for id in 1..=3 {
            table.store().delete(RecordId(id)).unwrap();
        }
        let page = engine
            .browse(&BrowseRequest::new(Field::Ra, SortOrder::Asc))
            .unwrap();
        assert_eq!(page.records.len(), 7);
        assert_eq!(page.candidates_scanned, 10);
    }
}
