//! Index registry
//!
//! Maps every maintained `IndexName` to its index instance and key
//! extractor. The write path, browse, count and rebuild all receive the
//! registry explicitly; nothing reaches an index through global state.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::aggregate::{AggregateSummary, OrderStatisticsIndex};
use super::errors::{IndexError, IndexResult};
use super::key::IndexKey;
use super::name::{IndexName, KeyExtractor};
use crate::record::{Galaxy, RecordId};

/// One registered index with its extractor and rebuild flag
#[derive(Debug)]
pub struct IndexSlot {
    name: IndexName,
    extract: KeyExtractor,
    index: RwLock<OrderStatisticsIndex>,
    rebuilding: AtomicBool,
}

impl IndexSlot {
    fn new(name: IndexName) -> Self {
        Self {
            name,
            extract: name.extractor(),
            index: RwLock::new(OrderStatisticsIndex::new(name)),
            rebuilding: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> IndexName {
        self.name
    }

    /// Key of `galaxy` in this index
    pub fn key_for(&self, galaxy: &Galaxy) -> IndexResult<IndexKey> {
        (self.extract)(galaxy).ok_or_else(|| IndexError::InvalidKey {
            index: self.name,
            reason: format!("record '{}' has a non-orderable {}", galaxy.id, self.name),
        })
    }

    pub fn read(&self) -> IndexResult<RwLockReadGuard<'_, OrderStatisticsIndex>> {
        self.index
            .read()
            .map_err(|_| IndexError::LockPoisoned(self.name))
    }

    pub fn write(&self) -> IndexResult<RwLockWriteGuard<'_, OrderStatisticsIndex>> {
        self.index
            .write()
            .map_err(|_| IndexError::LockPoisoned(self.name))
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::SeqCst)
    }

    /// Claims the index for a rebuild. Fails with `IndexBusy` while another
    /// lease is held; the claim is released when the lease drops.
    pub fn lease(self: &Arc<Self>) -> IndexResult<RebuildLease> {
        self.rebuilding
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| IndexError::IndexBusy(self.name))?;
        Ok(RebuildLease {
            slot: Arc::clone(self),
        })
    }
}

/// Exclusive right to clear and rebuild one index
#[derive(Debug)]
pub struct RebuildLease {
    slot: Arc<IndexSlot>,
}

impl RebuildLease {
    pub fn slot(&self) -> &Arc<IndexSlot> {
        &self.slot
    }
}

impl Drop for RebuildLease {
    fn drop(&mut self) {
        self.slot.rebuilding.store(false, Ordering::SeqCst);
    }
}

/// The set of maintained indexes
#[derive(Debug)]
pub struct IndexRegistry {
    slots: BTreeMap<IndexName, Arc<IndexSlot>>,
}

impl IndexRegistry {
    /// Registry with every known index
    pub fn all() -> Self {
        Self::with_indexes(&IndexName::ALL)
    }

    pub fn with_indexes(names: &[IndexName]) -> Self {
        Self {
            slots: names.iter().map(|n| (*n, Arc::new(IndexSlot::new(*n)))).collect(),
        }
    }

    pub fn names(&self) -> Vec<IndexName> {
        self.slots.keys().copied().collect()
    }

    pub fn contains(&self, name: IndexName) -> bool {
        self.slots.contains_key(&name)
    }

    pub fn get(&self, name: IndexName) -> IndexResult<&Arc<IndexSlot>> {
        self.slots.get(&name).ok_or(IndexError::NotRegistered(name))
    }

    pub fn slots(&self) -> impl Iterator<Item = &Arc<IndexSlot>> {
        self.slots.values()
    }

    pub fn summary(&self, name: IndexName) -> IndexResult<AggregateSummary> {
        Ok(self.get(name)?.read()?.summary())
    }

    /// Summary of every registered index
    pub fn summaries(&self) -> IndexResult<BTreeMap<IndexName, AggregateSummary>> {
        self.slots
            .iter()
            .map(|(name, slot)| Ok((*name, slot.read()?.summary())))
            .collect()
    }

    /// Computes every key first so that an unorderable record touches no
    /// index.
    fn keys_for(&self, galaxy: &Galaxy) -> IndexResult<Vec<(&Arc<IndexSlot>, IndexKey)>> {
        self.slots
            .values()
            .map(|slot| Ok((slot, slot.key_for(galaxy)?)))
            .collect()
    }

    /// Adds a new record to every index. Returns the number of entries added.
    pub fn on_insert(&self, id: RecordId, galaxy: &Galaxy) -> IndexResult<usize> {
        let keys = self.keys_for(galaxy)?;
        for (slot, key) in &keys {
            slot.write()?.insert(key.clone(), id)?;
        }
        Ok(keys.len())
    }

    /// Re-keys a changed record. Only indexes whose key changed are touched.
    /// An index that no longer holds the record (cleared mid-rebuild) gets a
    /// fresh entry.
    pub fn on_update(&self, id: RecordId, old: &Galaxy, new: &Galaxy) -> IndexResult<usize> {
        let keys = self.keys_for(new)?;
        let mut touched = 0;
        for (slot, new_key) in keys {
            let old_key = slot.key_for(old)?;
            if old_key == new_key {
                continue;
            }
            let mut index = slot.write()?;
            match index.replace(&old_key, new_key.clone(), id) {
                Ok(()) => {}
                Err(IndexError::NotFound { .. }) if !index.contains(id) => {
                    index.insert(new_key, id)?;
                }
                Err(e) => return Err(e),
            }
            touched += 1;
        }
        Ok(touched)
    }

    /// Removes a record from every index. Missing entries are skipped since
    /// a rebuild may have cleared them. Returns the number removed.
    pub fn on_delete(&self, id: RecordId) -> IndexResult<usize> {
        let mut removed = 0;
        for slot in self.slots.values() {
            match slot.write()?.delete(id) {
                Ok(_) => removed += 1,
                Err(IndexError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}
