//! Order-statistics index over one key space
//!
//! Wraps an `OrderTree` with a record → key map so that every record has at
//! most one entry. A second insert for the same record is a duplicate-key
//! condition and is rejected, never merged.

use std::collections::HashMap;

use serde::{Serialize, Serializer};

use super::errors::{IndexError, IndexResult};
use super::key::{IndexKey, KeyKind};
use super::name::IndexName;
use super::tree::{Entry, OrderTree};
use crate::record::RecordId;

/// Read-only aggregate view of an index
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSummary {
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "key_as_json")]
    pub min: Option<IndexKey>,
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "key_as_json")]
    pub max: Option<IndexKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub true_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub false_count: Option<usize>,
}

fn key_as_json<S: Serializer>(key: &Option<IndexKey>, s: S) -> Result<S::Ok, S::Error> {
    key.as_ref().map(IndexKey::to_json).serialize(s)
}

#[derive(Debug)]
pub struct OrderStatisticsIndex {
    name: IndexName,
    tree: OrderTree,
    keys: HashMap<RecordId, IndexKey>,
}

impl OrderStatisticsIndex {
    pub fn new(name: IndexName) -> Self {
        Self {
            name,
            tree: OrderTree::new(),
            keys: HashMap::new(),
        }
    }

    pub fn name(&self) -> IndexName {
        self.name
    }

    pub fn kind(&self) -> KeyKind {
        self.name.kind()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.keys.contains_key(&id)
    }

    pub fn key_of(&self, id: RecordId) -> Option<&IndexKey> {
        self.keys.get(&id)
    }

    /// Adds the entry for `id`. Fails with `DuplicateKey` when the record
    /// already has one and with `InvalidKey` on a key of the wrong kind.
    pub fn insert(&mut self, key: IndexKey, id: RecordId) -> IndexResult<()> {
        if key.kind() != self.kind() {
            return Err(IndexError::InvalidKey {
                index: self.name,
                reason: format!("expected {:?} key, got {:?}", self.kind(), key.kind()),
            });
        }
        if self.keys.contains_key(&id) {
            return Err(IndexError::DuplicateKey {
                index: self.name,
                record: id,
            });
        }
        self.tree.insert(Entry::new(key.clone(), id));
        self.keys.insert(id, key);
        Ok(())
    }

    /// Removes the entry for `id`, returning its key
    pub fn delete(&mut self, id: RecordId) -> IndexResult<IndexKey> {
        let key = self.keys.remove(&id).ok_or(IndexError::NotFound {
            index: self.name,
            record: id,
        })?;
        self.tree.remove(&Entry::new(key.clone(), id));
        Ok(key)
    }

    /// Moves `id` from `old_key` to `new_key`. The stored key must equal
    /// `old_key`; anything else means the caller's view is stale.
    pub fn replace(&mut self, old_key: &IndexKey, new_key: IndexKey, id: RecordId) -> IndexResult<()> {
        match self.keys.get(&id) {
            Some(stored) if stored == old_key => {}
            _ => {
                return Err(IndexError::NotFound {
                    index: self.name,
                    record: id,
                })
            }
        }
        if new_key.kind() != self.kind() {
            return Err(IndexError::InvalidKey {
                index: self.name,
                reason: format!("expected {:?} key, got {:?}", self.kind(), new_key.kind()),
            });
        }
        self.delete(id)?;
        self.insert(new_key, id)
    }

    /// Number of entries with a key strictly less than `key`
    pub fn rank(&self, key: &IndexKey) -> usize {
        self.tree.count_less(&Entry::new(key.clone(), RecordId::MIN))
    }

    /// Number of entries ordered strictly before `(key, id)`
    pub fn rank_of(&self, key: &IndexKey, id: RecordId) -> usize {
        self.tree.count_less(&Entry::new(key.clone(), id))
    }

    /// Key at zero-based rank `n`
    pub fn at_rank(&self, n: usize) -> Option<&IndexKey> {
        self.tree.get(n).map(|e| &e.key)
    }

    /// Full entry at rank `n`
    pub fn entry_at(&self, n: usize) -> Option<&Entry> {
        self.tree.get(n)
    }

    /// Up to `len` entries in ascending order starting at rank `start`
    pub fn entries(&self, start: usize, len: usize) -> Vec<Entry> {
        self.tree.range(start, len)
    }

    pub fn min(&self) -> Option<&IndexKey> {
        self.tree.first().map(|e| &e.key)
    }

    pub fn max(&self) -> Option<&IndexKey> {
        self.tree.last().map(|e| &e.key)
    }

    pub fn summary(&self) -> AggregateSummary {
        let count = self.len();
        if self.kind() == KeyKind::Bool {
            let false_count = self.rank(&IndexKey::Bool(true));
            return AggregateSummary {
                count,
                min: None,
                max: None,
                true_count: Some(count - false_count),
                false_count: Some(false_count),
            };
        }
        AggregateSummary {
            count,
            min: self.min().cloned(),
            max: self.max().cloned(),
            true_count: None,
            false_count: None,
        }
    }

    /// Removes up to `limit` entries from the front of the index. Returns how
    /// many were removed.
    pub fn clear_batch(&mut self, limit: usize) -> usize {
        let batch = self.tree.range(0, limit);
        for entry in &batch {
            self.tree.remove(entry);
            self.keys.remove(&entry.id);
        }
        batch.len()
    }
}
