//! Primary record store
//!
//! The store is a collaborator of the index subsystem: it owns record
//! bodies and offers a stable forward scan in primary-key order. Index
//! maintenance lives in `GalaxyTable`, not here.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::ops::Bound;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::errors::{RecordError, RecordResult};
use super::galaxy::{Galaxy, RecordId};
use super::scan::{ScanCursor, ScanPage};

/// Primary table of galaxies keyed by `RecordId`
pub trait RecordStore: Send + Sync {
    /// Reserves the next id. Ids are strictly increasing.
    fn allocate_id(&self) -> RecordId;

    fn get(&self, id: RecordId) -> RecordResult<Option<Galaxy>>;

    /// Stores a record, returning the previous body if any
    fn put(&self, id: RecordId, galaxy: Galaxy) -> RecordResult<Option<Galaxy>>;

    /// Removes a record, returning its body if it existed
    fn delete(&self, id: RecordId) -> RecordResult<Option<Galaxy>>;

    fn len(&self) -> RecordResult<usize>;

    fn is_empty(&self) -> RecordResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns up to `limit` records with ids strictly after `cursor`
    fn scan(&self, cursor: Option<ScanCursor>, limit: usize) -> RecordResult<ScanPage>;
}

/// In-memory store ordered by id
#[derive(Debug)]
pub struct MemoryRecordStore {
    records: RwLock<BTreeMap<RecordId, Galaxy>>,
    next_id: AtomicU64,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryRecordStore {
    fn allocate_id(&self) -> RecordId {
        RecordId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn get(&self, id: RecordId) -> RecordResult<Option<Galaxy>> {
        let records = self.records.read().map_err(|_| RecordError::LockPoisoned)?;
        Ok(records.get(&id).cloned())
    }

    fn put(&self, id: RecordId, galaxy: Galaxy) -> RecordResult<Option<Galaxy>> {
        let mut records = self.records.write().map_err(|_| RecordError::LockPoisoned)?;
        // Keep allocate_id ahead of ids written directly
        self.next_id.fetch_max(id.0.saturating_add(1), Ordering::SeqCst);
        Ok(records.insert(id, galaxy))
    }

    fn delete(&self, id: RecordId) -> RecordResult<Option<Galaxy>> {
        let mut records = self.records.write().map_err(|_| RecordError::LockPoisoned)?;
        Ok(records.remove(&id))
    }

    fn len(&self) -> RecordResult<usize> {
        let records = self.records.read().map_err(|_| RecordError::LockPoisoned)?;
        Ok(records.len())
    }

    fn scan(&self, cursor: Option<ScanCursor>, limit: usize) -> RecordResult<ScanPage> {
        let records = self.records.read().map_err(|_| RecordError::LockPoisoned)?;
        let lower = match cursor {
            Some(ScanCursor(id)) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };

        let mut range = records.range((lower, Bound::Unbounded));
        let page: Vec<(RecordId, Galaxy)> = range
            .by_ref()
            .take(limit)
            .map(|(id, g)| (*id, g.clone()))
            .collect();
        let is_done = range.next().is_none();
        let continue_cursor = page.last().map(|(id, _)| ScanCursor(*id)).or(cursor);

        Ok(ScanPage {
            records: page,
            continue_cursor,
            is_done,
        })
    }
}

/// Reads a JSON-lines dataset, one galaxy per line. Blank lines are skipped.
pub fn load_jsonl(path: &Path) -> RecordResult<Vec<Galaxy>> {
    let file = File::open(path).map_err(|e| RecordError::io(path, e))?;
    let mut out = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| RecordError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let galaxy: Galaxy = serde_json::from_str(&line).map_err(|e| RecordError::Parse {
            line: n + 1,
            message: e.to_string(),
        })?;
        galaxy.validate().map_err(|e| RecordError::Parse {
            line: n + 1,
            message: e.to_string(),
        })?;
        out.push(galaxy);
    }
    Ok(out)
}

/// Writes galaxies as JSON lines, replacing the file
pub fn save_jsonl<'a>(path: &Path, galaxies: impl IntoIterator<Item = &'a Galaxy>) -> RecordResult<usize> {
    let file = File::create(path).map_err(|e| RecordError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut written = 0;
    for galaxy in galaxies {
        let line = serde_json::to_string(galaxy)
            .map_err(|e| RecordError::InvalidRecord(e.to_string()))?;
        writeln!(writer, "{}", line).map_err(|e| RecordError::io(path, e))?;
        written += 1;
    }
    writer.flush().map_err(|e| RecordError::io(path, e))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_with(n: usize) -> MemoryRecordStore {
        let store = MemoryRecordStore::new();
        for i in 0..n {
            let id = store.allocate_id();
            store.put(id, Galaxy::new(format!("g{}", i))).unwrap();
        }
        store
    }

    #[test]
    fn test_allocate_is_monotonic() {
        let store = MemoryRecordStore::new();
        let a = store.allocate_id();
        let b = store.allocate_id();
        assert!(b > a);
    }

    #[test]
    fn test_scan_pages_until_done() {
        let store = store_with(5);
        let first = store.scan(None, 2).unwrap();
        assert_eq!(first.records.len(), 2);
        assert!(!first.is_done);

        let second = store.scan(first.continue_cursor, 2).unwrap();
        assert_eq!(second.records.len(), 2);
        assert!(!second.is_done);

        let third = store.scan(second.continue_cursor, 2).unwrap();
        assert_eq!(third.records.len(), 1);
        assert!(third.is_done);
    }

    #[test]
    fn test_scan_exact_multiple_reports_done_on_last_page() {
        let store = store_with(4);
        let first = store.scan(None, 2).unwrap();
        let second = store.scan(first.continue_cursor, 2).unwrap();
        assert!(second.is_done);
    }

    #[test]
    fn test_scan_empty_store() {
        let page = MemoryRecordStore::new().scan(None, 10).unwrap();
        assert!(page.records.is_empty());
        assert!(page.is_done);
        assert_eq!(page.continue_cursor, None);
    }

    #[test]
    fn test_put_directly_advances_allocator() {
        let store = MemoryRecordStore::new();
        store.put(RecordId(50), Galaxy::new("x")).unwrap();
        assert!(store.allocate_id() > RecordId(50));
    }

    #[test]
    fn test_delete_returns_body() {
        let store = store_with(1);
        let removed = store.delete(RecordId(1)).unwrap();
        assert_eq!(removed.map(|g| g.id), Some("g0".to_string()));
        assert_eq!(store.len().unwrap(), 0);
        assert!(store.delete(RecordId(1)).unwrap().is_none());
    }

    #[test]
    fn test_jsonl_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("galaxies.jsonl");
        let mut g = Galaxy::new("a");
        g.mag = Some(19.5);
        save_jsonl(&path, [&g, &Galaxy::new("b")]).unwrap();
        let loaded = load_jsonl(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], g);
    }

    #[test]
    fn test_jsonl_reports_bad_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("galaxies.jsonl");
        std::fs::write(&path, "{\"id\":\"a\",\"ra\":1,\"dec\":1,\"reff\":1,\"q\":1,\"pa\":1,\"nucleus\":false}\n\n{oops}\n").unwrap();
        match load_jsonl(&path) {
            Err(RecordError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other),
        }
    }
}
