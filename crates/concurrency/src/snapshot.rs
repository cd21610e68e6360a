//! Per-transaction snapshot sets
//!
//! A transaction tracks its footprint in two `SnapshotSet`s: the read-set
//! (what it observed, at which version) and the write-set (what it staged).
//! Both are plain vectors scanned linearly; typical transactions touch a
//! handful of keys, and the commit protocol wants in-order iteration more
//! than it wants fast point lookup. Duplicates are collapsed in place at
//! the call sites, so each set holds at most one entry per key.

use silt_core::{Key, TidWord};
use silt_index::Record;
use std::sync::Arc;

/// One read- or write-set entry.
pub struct Snapshot {
    /// The key this entry covers.
    pub key: Key,
    /// Observed payload (read-set) or staged payload (write-set).
    pub value: Arc<[u8]>,
    /// Handle into the point index, cached at first touch so precommit
    /// never re-hashes the key.
    pub record: Arc<Record>,
    /// Read-set only: the identifier the payload was observed under.
    pub observed_tid: TidWord,
    /// Set when the transaction both read and wrote this key.
    pub is_read_modify_write: bool,
}

/// Append-only sequence of snapshots with linear-scan lookup.
pub struct SnapshotSet {
    entries: Vec<Snapshot>,
}

impl SnapshotSet {
    /// Create an empty set.
    pub fn new() -> Self {
        SnapshotSet {
            entries: Vec::new(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Position of the entry for `key`, if present.
    pub fn position(&self, key: &[u8]) -> Option<usize> {
        self.entries.iter().position(|s| s.key.as_bytes() == key)
    }

    /// Entry at `pos`.
    ///
    /// # Panics
    ///
    /// Panics if `pos` is out of bounds; positions come from
    /// [`position`](Self::position) or [`push`](Self::push).
    pub fn get(&self, pos: usize) -> &Snapshot {
        &self.entries[pos]
    }

    /// Mutable entry at `pos`.
    pub fn get_mut(&mut self, pos: usize) -> &mut Snapshot {
        &mut self.entries[pos]
    }

    /// Append an entry. The caller keeps the one-entry-per-key invariant.
    pub fn push(&mut self, snapshot: Snapshot) {
        debug_assert!(
            self.position(snapshot.key.as_bytes()).is_none(),
            "duplicate snapshot entry"
        );
        self.entries.push(snapshot);
    }

    /// Iterate entries in insertion (or sorted, after
    /// [`sort_by_key`](Self::sort_by_key)) order.
    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.entries.iter()
    }

    /// Sort entries ascending by key bytes.
    ///
    /// Precommit sorts the write-set this way before locking; the global
    /// lock order is what keeps concurrent committers deadlock-free.
    pub fn sort_by_key(&mut self) {
        self.entries.sort_by(|a, b| a.key.cmp(&b.key));
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for SnapshotSet {
    fn default() -> Self {
        Self::new()
    }
}
