//! Pagination Tests
//!
//! Tests for cursor browsing:
//! - Following next cursors visits every matching record exactly once
//! - Walking back with prev cursors returns the same pages
//! - The fallback scan orders records the same way an index does
//! - Offset jumps land on the right record
//! - Candidates scanned per page stay bounded under a known distribution

use std::collections::HashSet;
use std::sync::Arc;

use galaxydb::cli::synthetic_galaxies;
use galaxydb::index::{sort_key, IndexName, IndexRegistry};
use galaxydb::observability::MetricsRegistry;
use galaxydb::query::{
    BrowseEngine, BrowsePage, BrowseRequest, Filter, FilterOp, FilterSet, FilterValue, PageLimits,
    SortOrder,
};
use galaxydb::record::{Field, Galaxy, GalaxyTable, MemoryRecordStore, RecordId, RecordStore};

// =============================================================================
// Helper Functions
// =============================================================================

const DATASET: usize = 640;

fn engine(names: &[IndexName]) -> (GalaxyTable, BrowseEngine) {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    let indexes = Arc::new(IndexRegistry::with_indexes(names));
    let metrics = Arc::new(MetricsRegistry::new());
    let table = GalaxyTable::new(store.clone(), indexes.clone(), metrics.clone());
    for galaxy in synthetic_galaxies(DATASET, 3) {
        table.import(galaxy).unwrap();
    }
    let engine = BrowseEngine::new(store, indexes, metrics, PageLimits::default());
    (table, engine)
}

fn ids(page: &BrowsePage) -> Vec<RecordId> {
    page.records.iter().map(|r| r.record_id).collect()
}

/// Follows next cursors to the end, returning every page
fn walk_forward(engine: &BrowseEngine, req: BrowseRequest) -> Vec<BrowsePage> {
    let mut pages = Vec::new();
    let mut cursor = None;
    loop {
        let page = engine.browse(&req.clone().with_cursor(cursor)).unwrap();
        cursor = page.next_cursor.clone();
        pages.push(page);
        if cursor.is_none() {
            return pages;
        }
    }
}

fn matching_ids(table: &GalaxyTable, filters: &FilterSet) -> HashSet<RecordId> {
    table
        .store()
        .scan(None, DATASET * 2)
        .unwrap()
        .records
        .into_iter()
        .filter(|(_, g)| filters.matches(g))
        .map(|(id, _)| id)
        .collect()
}

fn northern_nucleated() -> FilterSet {
    FilterSet::new(vec![
        Filter::new(Field::Nucleus, FilterOp::Eq, FilterValue::Bool(true)),
        Filter::number(Field::Dec, FilterOp::Gt, 0.0),
    ])
    .unwrap()
}

// =============================================================================
// Completeness Tests
// =============================================================================

/// Filtered forward pagination returns each match once, in key order.
#[test]
fn test_forward_walk_is_complete() {
    let (table, engine) = engine(&IndexName::ALL);
    let filters = northern_nucleated();
    let req = BrowseRequest::new(Field::Ra, SortOrder::Asc)
        .with_filters(filters.clone())
        .with_page_size(7);

    let pages = walk_forward(&engine, req);
    let seen: Vec<RecordId> = pages.iter().flat_map(ids).collect();
    let unique: HashSet<RecordId> = seen.iter().copied().collect();
    assert_eq!(unique.len(), seen.len(), "a record was served twice");
    assert_eq!(unique, matching_ids(&table, &filters));

    let ras: Vec<f64> = pages
        .iter()
        .flat_map(|p| p.records.iter().map(|r| r.galaxy.ra))
        .collect();
    assert!(ras.windows(2).all(|w| w[0] <= w[1]));
    assert!(pages.iter().all(|p| p.used_index));
    assert!(!pages[0].has_previous);
    assert!(!pages.last().unwrap().has_next);
}

/// Descending walk on a field with missing values still covers everything.
#[test]
fn test_descending_walk_with_missing_values() {
    let (table, engine) = engine(&IndexName::ALL);
    let req = BrowseRequest::new(Field::Mag, SortOrder::Desc).with_page_size(50);

    let pages = walk_forward(&engine, req);
    let seen: Vec<RecordId> = pages.iter().flat_map(ids).collect();
    assert_eq!(seen.len(), DATASET);
    assert_eq!(
        seen.iter().copied().collect::<HashSet<_>>(),
        matching_ids(&table, &FilterSet::empty())
    );

    // Missing magnitudes sort last ascending, so they lead a descending walk
    let first = &pages[0].records[0].galaxy;
    assert!(first.mag.is_none());
}

// =============================================================================
// Backward Navigation Tests
// =============================================================================

/// Forward N pages then back N pages via prev cursors retraces the walk.
#[test]
fn test_back_navigation_retraces_pages() {
    let (_table, engine) = engine(&IndexName::ALL);
    let req = BrowseRequest::new(Field::Dec, SortOrder::Asc)
        .with_filters(northern_nucleated())
        .with_page_size(5);

    let mut forward = vec![engine.browse(&req).unwrap()];
    for _ in 0..5 {
        let next = forward.last().unwrap().next_cursor.clone();
        assert!(next.is_some());
        forward.push(engine.browse(&req.clone().with_cursor(next)).unwrap());
    }

    let mut current = forward.last().unwrap().clone();
    for expected in forward.iter().rev().skip(1) {
        assert!(current.has_previous);
        let prev = current.prev_cursor.clone();
        current = engine.browse(&req.clone().with_cursor(prev)).unwrap();
        assert_eq!(ids(&current), ids(expected));
        assert!(current.has_next);
    }
    assert!(!current.has_previous);
    assert!(current.prev_cursor.is_none());
}

/// A cursor minted for another filter set is refused.
#[test]
fn test_cursor_bound_to_query() {
    let (_table, engine) = engine(&IndexName::ALL);
    let req = BrowseRequest::new(Field::Ra, SortOrder::Asc).with_page_size(10);
    let next = engine.browse(&req).unwrap().next_cursor;

    let other = req
        .clone()
        .with_filters(northern_nucleated())
        .with_cursor(next.clone());
    assert_eq!(
        engine.browse(&other).unwrap_err().code(),
        "GALAXY_CURSOR_INVALID"
    );

    let reversed = BrowseRequest::new(Field::Ra, SortOrder::Desc).with_cursor(next);
    assert_eq!(
        engine.browse(&reversed).unwrap_err().code(),
        "GALAXY_CURSOR_INVALID"
    );
}

// =============================================================================
// Fallback Scan Tests
// =============================================================================

/// Without an ra index the scan serves the same sequence the index would.
#[test]
fn test_fallback_matches_indexed_order() {
    let (_t1, indexed) = engine(&[IndexName::Ra]);
    let (_t2, scanned) = engine(&[IndexName::Dec]);
    let req = BrowseRequest::new(Field::Ra, SortOrder::Desc)
        .with_filters(northern_nucleated())
        .with_page_size(9);

    let a = walk_forward(&indexed, req.clone());
    let b = walk_forward(&scanned, req);
    let a_ids: Vec<RecordId> = a.iter().flat_map(ids).collect();
    let b_ids: Vec<RecordId> = b.iter().flat_map(ids).collect();
    assert_eq!(a_ids, b_ids);
    assert!(b.iter().all(|p| !p.used_index));
    assert!(b[0].candidates_scanned >= DATASET);
}

/// reffPixels has no index at all and is always served by the scan.
#[test]
fn test_fallback_sort_on_unindexed_field() {
    let (table, engine) = engine(&IndexName::ALL);
    let req = BrowseRequest::new(Field::ReffPixels, SortOrder::Asc).with_page_size(100);

    let pages = walk_forward(&engine, req);
    let records: Vec<_> = pages.iter().flat_map(|p| p.records.iter()).collect();
    assert_eq!(records.len(), table.store().len().unwrap());
    let keys: Vec<_> = records
        .iter()
        .map(|r| sort_key(Field::ReffPixels, &r.galaxy).unwrap())
        .collect();
    assert!(keys.windows(2).all(|w| w[0] <= w[1]));
}

// =============================================================================
// Offset and Cost Tests
// =============================================================================

/// An offset cursor starts the next page at exactly that rank.
#[test]
fn test_offset_cursor_lands_on_rank() {
    let (_table, engine) = engine(&IndexName::ALL);
    for order in [SortOrder::Asc, SortOrder::Desc] {
        let req = BrowseRequest::new(Field::CreatedAt, order).with_page_size(20);
        let all: Vec<RecordId> = walk_forward(&engine, req.clone())
            .iter()
            .flat_map(ids)
            .collect();

        let cursor = engine
            .cursor_at_offset(Field::CreatedAt, order, &FilterSet::empty(), 125)
            .unwrap();
        let page = engine.browse(&req.with_cursor(cursor)).unwrap();
        assert_eq!(ids(&page), all[125..145].to_vec());
    }

    let err = engine
        .cursor_at_offset(Field::Ra, SortOrder::Asc, &northern_nucleated(), 3)
        .unwrap_err();
    assert_eq!(err.code(), "GALAXY_OFFSET_REQUIRES_UNFILTERED");
}

/// An unfiltered indexed page examines only the rows it returns plus one.
#[test]
fn test_indexed_page_reads_only_what_it_needs() {
    let (_table, engine) = engine(&IndexName::ALL);
    let page = engine
        .browse(&BrowseRequest::new(Field::Ra, SortOrder::Asc).with_page_size(10))
        .unwrap();
    assert_eq!(page.records.len(), 10);
    assert_eq!(page.candidates_scanned, 11);

    let next = engine
        .browse(
            &BrowseRequest::new(Field::Ra, SortOrder::Asc)
                .with_page_size(10)
                .with_cursor(page.next_cursor),
        )
        .unwrap();
    assert!(next.candidates_scanned <= 12);
}

/// With one galaxy in four nucleated, a filtered page examines about four
/// candidates per row, counting the peek beyond each end.
#[test]
fn test_selective_filter_scan_is_bounded() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
    let indexes = Arc::new(IndexRegistry::with_indexes(&[IndexName::Ra]));
    let metrics = Arc::new(MetricsRegistry::new());
    let table = GalaxyTable::new(store.clone(), indexes.clone(), metrics.clone());
    for i in 0..400 {
        let mut g = Galaxy::new(format!("S{:04}", i));
        g.ra = i as f64 * 0.5;
        g.nucleus = i % 4 == 0;
        table.import(g).unwrap();
    }
    let engine = BrowseEngine::new(store, indexes, metrics.clone(), PageLimits::default());
    let req = BrowseRequest::new(Field::Ra, SortOrder::Asc)
        .with_filters(
            FilterSet::new(vec![Filter::new(
                Field::Nucleus,
                FilterOp::Eq,
                FilterValue::Bool(true),
            )])
            .unwrap(),
        )
        .with_page_size(10);

    let pages = walk_forward(&engine, req);
    assert_eq!(pages.len(), 10);
    for page in &pages {
        assert!(page.records.iter().all(|r| r.galaxy.nucleus));
        assert!(
            page.candidates_scanned <= 4 * (page.records.len() + 2),
            "scanned {} for {} rows",
            page.candidates_scanned,
            page.records.len()
        );
    }
    let total: usize = pages.iter().map(|p| p.candidates_scanned).sum();
    assert_eq!(metrics.snapshot().browse_candidates_scanned, total as u64);
}
