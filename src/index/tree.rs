//! Counted B+ tree
//!
//! Every branch child carries the size of its subtree and its smallest
//! entry, which gives O(log n) rank (`count_less`) and select (`get`) on top
//! of ordinary ordered insert/remove.
//!
//! Entries are `(key, record)` pairs; the record id breaks ties between
//! equal keys so that every entry is unique and rank is stable.

use std::cmp::Ordering;

use super::key::IndexKey;
use crate::record::RecordId;

const MAX_FANOUT: usize = 64;
const MIN_FANOUT: usize = MAX_FANOUT / 4;

/// One `(key, record)` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    pub key: IndexKey,
    pub id: RecordId,
}

impl Entry {
    pub fn new(key: IndexKey, id: RecordId) -> Self {
        Self { key, id }
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key).then(self.id.cmp(&other.id))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
struct Child {
    min: Entry,
    count: usize,
    node: Box<Node>,
}

#[derive(Debug)]
enum Node {
    Leaf(Vec<Entry>),
    Branch(Vec<Child>),
}

enum Inserted {
    Done,
    Exists,
    Split(Node),
}

impl Node {
    fn width(&self) -> usize {
        match self {
            Node::Leaf(entries) => entries.len(),
            Node::Branch(children) => children.len(),
        }
    }

    fn total(&self) -> usize {
        match self {
            Node::Leaf(entries) => entries.len(),
            Node::Branch(children) => children.iter().map(|c| c.count).sum(),
        }
    }

    fn first(&self) -> Option<&Entry> {
        match self {
            Node::Leaf(entries) => entries.first(),
            Node::Branch(children) => children.first().map(|c| &c.min),
        }
    }

    fn last(&self) -> Option<&Entry> {
        match self {
            Node::Leaf(entries) => entries.last(),
            Node::Branch(children) => children.last().and_then(|c| c.node.last()),
        }
    }

    fn insert(&mut self, entry: Entry) -> Inserted {
        match self {
            Node::Leaf(entries) => match entries.binary_search(&entry) {
                Ok(_) => Inserted::Exists,
                Err(pos) => {
                    entries.insert(pos, entry);
                    if entries.len() > MAX_FANOUT {
                        let right = entries.split_off(entries.len() / 2);
                        Inserted::Split(Node::Leaf(right))
                    } else {
                        Inserted::Done
                    }
                }
            },
            Node::Branch(children) => {
                let idx = route(children, &entry);
                let child = &mut children[idx];
                // A smaller entry cannot already exist in this subtree
                if entry < child.min {
                    child.min = entry.clone();
                }
                match child.node.insert(entry) {
                    Inserted::Exists => Inserted::Exists,
                    Inserted::Done => {
                        child.count += 1;
                        Inserted::Done
                    }
                    Inserted::Split(right) => {
                        let right_count = right.total();
                        child.count = child.count + 1 - right_count;
                        let right_min = match right.first() {
                            Some(e) => e.clone(),
                            // Split halves are never empty
                            None => return Inserted::Done,
                        };
                        children.insert(
                            idx + 1,
                            Child {
                                min: right_min,
                                count: right_count,
                                node: Box::new(right),
                            },
                        );
                        if children.len() > MAX_FANOUT {
                            let right = children.split_off(children.len() / 2);
                            Inserted::Split(Node::Branch(right))
                        } else {
                            Inserted::Done
                        }
                    }
                }
            }
        }
    }

    fn remove(&mut self, entry: &Entry) -> bool {
        match self {
            Node::Leaf(entries) => match entries.binary_search(entry) {
                Ok(pos) => {
                    entries.remove(pos);
                    true
                }
                Err(_) => false,
            },
            Node::Branch(children) => {
                let idx = route(children, entry);
                if !children[idx].node.remove(entry) {
                    return false;
                }
                let child = &mut children[idx];
                child.count -= 1;
                if child.count == 0 {
                    children.remove(idx);
                    return true;
                }
                if let Some(first) = child.node.first() {
                    child.min = first.clone();
                }
                if child.node.width() < MIN_FANOUT {
                    merge_with_neighbour(children, idx);
                }
                true
            }
        }
    }

    fn count_less(&self, entry: &Entry) -> usize {
        match self {
            Node::Leaf(entries) => entries.partition_point(|e| e < entry),
            Node::Branch(children) => {
                let p = children.partition_point(|c| c.min < *entry);
                if p == 0 {
                    return 0;
                }
                let before: usize = children[..p - 1].iter().map(|c| c.count).sum();
                before + children[p - 1].node.count_less(entry)
            }
        }
    }

    fn get(&self, mut n: usize) -> Option<&Entry> {
        match self {
            Node::Leaf(entries) => entries.get(n),
            Node::Branch(children) => {
                for child in children {
                    if n < child.count {
                        return child.node.get(n);
                    }
                    n -= child.count;
                }
                None
            }
        }
    }

    fn collect(&self, mut skip: usize, remaining: &mut usize, out: &mut Vec<Entry>) {
        match self {
            Node::Leaf(entries) => {
                if skip < entries.len() {
                    let take = (*remaining).min(entries.len() - skip);
                    out.extend_from_slice(&entries[skip..skip + take]);
                    *remaining -= take;
                }
            }
            Node::Branch(children) => {
                for child in children {
                    if *remaining == 0 {
                        return;
                    }
                    if skip >= child.count {
                        skip -= child.count;
                        continue;
                    }
                    child.node.collect(skip, remaining, out);
                    skip = 0;
                }
            }
        }
    }

    fn absorb(&mut self, other: Node) {
        match (self, other) {
            (Node::Leaf(left), Node::Leaf(right)) => left.extend(right),
            (Node::Branch(left), Node::Branch(right)) => left.extend(right),
            // Siblings always sit at the same depth
            _ => {}
        }
    }
}

fn route(children: &[Child], entry: &Entry) -> usize {
    children.partition_point(|c| c.min <= *entry).saturating_sub(1)
}

fn merge_with_neighbour(children: &mut Vec<Child>, idx: usize) {
    let (left, right) = if idx + 1 < children.len() {
        (idx, idx + 1)
    } else if idx > 0 {
        (idx - 1, idx)
    } else {
        return;
    };
    if children[left].node.width() + children[right].node.width() > MAX_FANOUT {
        return;
    }
    let absorbed = children.remove(right);
    let target = &mut children[left];
    target.count += absorbed.count;
    target.node.absorb(*absorbed.node);
}

/// Ordered multiset of entries with rank and select
#[derive(Debug)]
pub struct OrderTree {
    root: Node,
}

impl Default for OrderTree {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderTree {
    pub fn new() -> Self {
        Self {
            root: Node::Leaf(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.root.total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts an entry. Returns false if the exact entry is already present.
    pub fn insert(&mut self, entry: Entry) -> bool {
        match self.root.insert(entry) {
            Inserted::Exists => false,
            Inserted::Done => true,
            Inserted::Split(right) => {
                let left = std::mem::replace(&mut self.root, Node::Leaf(Vec::new()));
                let (left_min, right_min) = match (left.first(), right.first()) {
                    (Some(l), Some(r)) => (l.clone(), r.clone()),
                    _ => {
                        self.root = left;
                        return true;
                    }
                };
                self.root = Node::Branch(vec![
                    Child {
                        min: left_min,
                        count: left.total(),
                        node: Box::new(left),
                    },
                    Child {
                        min: right_min,
                        count: right.total(),
                        node: Box::new(right),
                    },
                ]);
                true
            }
        }
    }

    /// Removes an entry. Returns false if it was not present.
    pub fn remove(&mut self, entry: &Entry) -> bool {
        let removed = self.root.remove(entry);
        if removed {
            self.collapse_root();
        }
        removed
    }

    fn collapse_root(&mut self) {
        loop {
            match &mut self.root {
                Node::Branch(children) if children.len() == 1 => {
                    if let Some(only) = children.pop() {
                        self.root = *only.node;
                    }
                }
                Node::Branch(children) if children.is_empty() => {
                    self.root = Node::Leaf(Vec::new());
                }
                _ => return,
            }
        }
    }

    /// Number of entries strictly less than `entry`
    pub fn count_less(&self, entry: &Entry) -> usize {
        self.root.count_less(entry)
    }

    /// Entry at zero-based rank `n`
    pub fn get(&self, n: usize) -> Option<&Entry> {
        self.root.get(n)
    }

    /// Up to `len` consecutive entries starting at rank `start`
    pub fn range(&self, start: usize, len: usize) -> Vec<Entry> {
        let mut out = Vec::with_capacity(len.min(self.len().saturating_sub(start)));
        let mut remaining = len;
        if start < self.len() {
            self.root.collect(start, &mut remaining, &mut out);
        }
        out
    }

    pub fn first(&self) -> Option<&Entry> {
        self.root.first()
    }

    pub fn last(&self) -> Option<&Entry> {
        self.root.last()
    }

    pub fn contains(&self, entry: &Entry) -> bool {
        self.get(self.count_less(entry)) == Some(entry)
    }

    #[cfg(test)]
    fn check(&self) {
        fn walk(node: &Node, out: &mut Vec<Entry>) -> usize {
            match node {
                Node::Leaf(entries) => {
                    out.extend(entries.iter().cloned());
                    entries.len()
                }
                Node::Branch(children) => {
                    let mut total = 0;
                    for c in children {
                        let before = out.len();
                        let n = walk(&c.node, out);
                        assert_eq!(n, c.count, "stale subtree count");
                        assert_eq!(out[before], c.min, "stale subtree min");
                        total += n;
                    }
                    total
                }
            }
        }
        let mut all = Vec::new();
        let n = walk(&self.root, &mut all);
        assert_eq!(n, self.len());
        assert!(all.windows(2).all(|w| w[0] < w[1]), "entries out of order");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn e(k: i64, id: u64) -> Entry {
        Entry::new(IndexKey::int(k), RecordId(id))
    }

    #[test]
    fn test_empty_tree() {
        let tree = OrderTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.first(), None);
        assert_eq!(tree.get(0), None);
        assert_eq!(tree.count_less(&e(5, 0)), 0);
        assert!(tree.range(0, 10).is_empty());
    }

    #[test]
    fn test_insert_rejects_exact_duplicate() {
        let mut tree = OrderTree::new();
        assert!(tree.insert(e(1, 1)));
        assert!(!tree.insert(e(1, 1)));
        assert!(tree.insert(e(1, 2)));
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_rank_and_select_agree_after_splits() {
        let mut tree = OrderTree::new();
        let mut ids: Vec<u64> = (0..5_000).collect();
        ids.shuffle(&mut StdRng::seed_from_u64(7));
        for id in &ids {
            // Many ties on the key exercise the id tiebreak
            assert!(tree.insert(e((*id % 97) as i64, *id)));
        }
        tree.check();
        assert_eq!(tree.len(), 5_000);

        for n in (0..5_000).step_by(37) {
            let entry = tree.get(n).unwrap().clone();
            assert_eq!(tree.count_less(&entry), n);
            assert!(tree.contains(&entry));
        }
        assert_eq!(tree.first(), tree.get(0));
        assert_eq!(tree.last(), tree.get(4_999));
    }

    #[test]
    fn test_remove_rebalances_and_collapses() {
        let mut tree = OrderTree::new();
        let mut ids: Vec<u64> = (0..3_000).collect();
        for id in &ids {
            tree.insert(e(*id as i64, *id));
        }
        ids.shuffle(&mut StdRng::seed_from_u64(11));
        for (i, id) in ids.iter().enumerate() {
            assert!(tree.remove(&e(*id as i64, *id)));
            assert!(!tree.remove(&e(*id as i64, *id)));
            if i % 250 == 0 {
                tree.check();
            }
        }
        assert!(tree.is_empty());
        tree.check();
    }

    #[test]
    fn test_range_crosses_leaves() {
        let mut tree = OrderTree::new();
        for id in 0..1_000u64 {
            tree.insert(e(id as i64, id));
        }
        let slice = tree.range(95, 200);
        assert_eq!(slice.len(), 200);
        assert_eq!(slice[0], e(95, 95));
        assert_eq!(slice[199], e(294, 294));
        assert_eq!(tree.range(990, 50).len(), 10);
        assert!(tree.range(1_000, 5).is_empty());
    }

    #[test]
    fn test_count_less_for_absent_entry() {
        let mut tree = OrderTree::new();
        for k in [10, 20, 30] {
            tree.insert(e(k, k as u64));
        }
        assert_eq!(tree.count_less(&e(25, 0)), 2);
        assert_eq!(tree.count_less(&e(5, 0)), 0);
        assert_eq!(tree.count_less(&e(99, 0)), 3);
        assert!(!tree.contains(&e(25, 0)));
    }
}
