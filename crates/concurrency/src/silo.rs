//! Baseline Silo protocol
//!
//! Optimistic concurrency control with epoch-based group commit. Reads go
//! through the point index's optimistic read; writes are staged locally.
//! Precommit runs the four-phase commit:
//!
//! 1. lock the write-set in ascending key order (CAS failure aborts,
//!    no retries inside the protocol);
//! 2. compute the commit identifier as the successor of the maximum over
//!    the pinned epoch, every observed read identifier, and every
//!    write-set record's current identifier;
//! 3. validate the read-set by resampling each record: any identifier
//!    change or foreign lock aborts;
//! 4. install the staged payloads under the commit identifier, clearing
//!    each record lock in the same store.
//!
//! The abort path releases every held lock and leaves records untouched.

use crate::snapshot::{Snapshot, SnapshotSet};
use silt_core::{Key, TidWord, TxStatus};
use silt_epoch::{EpochFramework, EpochGuard, EpochParticipant};
use silt_index::PointIndex;
use std::sync::Arc;

/// Baseline Silo concurrency control, bound to one transaction.
pub struct Silo {
    pub(crate) index: Arc<PointIndex>,
    pub(crate) framework: Arc<EpochFramework>,
    pub(crate) guard: EpochGuard,
    pub(crate) thread_id: u8,
    pub(crate) read_set: SnapshotSet,
    pub(crate) write_set: SnapshotSet,
    /// Number of write-set entries (post-sort prefix) currently locked.
    pub(crate) locked: usize,
    pub(crate) commit_tid: Option<TidWord>,
    /// Payloads displaced by install, awaiting epoch retirement.
    pub(crate) displaced: Vec<Arc<[u8]>>,
}

impl Silo {
    /// Bind a protocol instance to the shared index and the worker's epoch
    /// slot. Entering pins the worker's epoch until post-processing.
    pub fn new(index: Arc<PointIndex>, participant: &EpochParticipant) -> Self {
        Silo {
            framework: Arc::clone(participant.framework()),
            guard: participant.enter(),
            thread_id: participant.thread_id(),
            index,
            read_set: SnapshotSet::new(),
            write_set: SnapshotSet::new(),
            locked: 0,
            commit_tid: None,
            displaced: Vec::new(),
        }
    }

    /// The epoch this transaction is pinned to.
    pub fn epoch(&self) -> u64 {
        self.guard.epoch()
    }

    /// The identifier assigned at commit, if committed.
    pub fn commit_tid(&self) -> Option<TidWord> {
        self.commit_tid
    }

    /// The staged write-set.
    pub fn write_set(&self) -> &SnapshotSet {
        &self.write_set
    }

    /// Read `key`: write-set first (read-your-own-writes), then read-set
    /// (repeatable read), then an optimistic read from the index that is
    /// memoized into the read-set. Empty payloads read as absent.
    pub fn read(&mut self, key: &[u8]) -> Option<&[u8]> {
        if let Some(pos) = self.write_set.position(key) {
            return present(&self.write_set.get(pos).value);
        }
        if let Some(pos) = self.read_set.position(key) {
            return present(&self.read_set.get(pos).value);
        }

        let owned = Key::from(key);
        let record = self.index.get_or_insert(&owned);
        let (payload, observed_tid) = record.optimistic_read();
        let pos = self.read_set.len();
        self.read_set.push(Snapshot {
            key: owned,
            value: payload,
            record,
            observed_tid,
            is_read_modify_write: false,
        });
        present(&self.read_set.get(pos).value)
    }

    /// Stage a write of `value` to `key`. A key already in the read-set is
    /// marked read-modify-write; a key already in the write-set is updated
    /// in place. The index handle is resolved here so precommit never
    /// hashes a key.
    pub fn write(&mut self, key: &[u8], value: &[u8]) {
        let mut is_rmw = false;
        if let Some(pos) = self.read_set.position(key) {
            self.read_set.get_mut(pos).is_read_modify_write = true;
            is_rmw = true;
        }

        if let Some(pos) = self.write_set.position(key) {
            let entry = self.write_set.get_mut(pos);
            entry.value = Arc::from(value);
            if is_rmw {
                entry.is_read_modify_write = true;
            }
            return;
        }

        let owned = Key::from(key);
        let record = self.index.get_or_insert(&owned);
        self.write_set.push(Snapshot {
            key: owned,
            value: Arc::from(value),
            record,
            observed_tid: TidWord::ZERO,
            is_read_modify_write: is_rmw,
        });
    }

    /// Run the baseline commit protocol. Returns whether the transaction
    /// committed; on `false` every held lock has been released and the
    /// index is untouched.
    pub fn precommit(&mut self) -> bool {
        self.write_set.sort_by_key();

        if !self.lock_write_set() {
            tracing::trace!(thread = self.thread_id, "abort: write-set lock contention");
            self.release_locks();
            return false;
        }

        let commit_tid = self.compute_commit_tid(false);

        if !self.validate_read_set() {
            tracing::trace!(thread = self.thread_id, "abort: read validation failed");
            self.release_locks();
            return false;
        }

        self.install(commit_tid, false);
        self.commit_tid = Some(commit_tid);
        true
    }

    /// Terminal cleanup, invoked exactly once per transaction.
    ///
    /// Commit retires displaced payloads under the pinned epoch; abort
    /// discards all staged state. Either way, no lock is still held.
    pub fn post_processing(&mut self, status: TxStatus) {
        assert_eq!(self.locked, 0, "post-processing with locks still held");
        match status {
            TxStatus::Committed => {
                let epoch = self.guard.epoch();
                for buffer in self.displaced.drain(..) {
                    self.framework.retire(epoch, buffer);
                }
            }
            TxStatus::Aborted => {
                self.displaced.clear();
                self.read_set.clear();
                self.write_set.clear();
            }
            TxStatus::Running => unreachable!("post-processing requires a terminal status"),
        }
    }

    // === commit phases, shared with the reordering variant ===

    /// Phase 1: acquire record locks over the sorted write-set. A record
    /// that is already locked, or whose word moves between sample and CAS,
    /// fails the whole phase.
    pub(crate) fn lock_write_set(&mut self) -> bool {
        for pos in 0..self.write_set.len() {
            let entry = self.write_set.get(pos);
            let current = entry.record.tid();
            if current.is_locked() || !entry.record.try_lock(current) {
                return false;
            }
            self.locked = pos + 1;
        }
        true
    }

    /// Release the locked prefix of the write-set (abort path).
    pub(crate) fn release_locks(&mut self) {
        for pos in 0..self.locked {
            self.write_set.get(pos).record.unlock();
        }
        self.locked = 0;
    }

    /// Phase 2: commit identifier assignment.
    ///
    /// With `include_pivots`, each overwritten record's pivot joins the
    /// max, so the writer also serializes after every committed reader of
    /// the version it displaces (reordering variant).
    pub(crate) fn compute_commit_tid(&self, include_pivots: bool) -> TidWord {
        let mut max = TidWord::from_epoch(self.guard.epoch());
        for entry in self.read_set.iter() {
            max = max.max(entry.observed_tid);
        }
        for entry in self.write_set.iter() {
            max = max.max(entry.record.tid().unlocked());
            if include_pivots {
                max = max.max(entry.record.pivot());
            }
        }
        max.successor(self.thread_id)
    }

    /// Phase 3: read validation. An entry passes if its record still
    /// carries the observed identifier and is not locked by another
    /// transaction (our own write locks are fine).
    pub(crate) fn validate_read_set(&self) -> bool {
        for entry in self.read_set.iter() {
            let current = entry.record.tid();
            let own_write = self.write_set.position(entry.key.as_bytes()).is_some();
            if current.is_locked() && !own_write {
                return false;
            }
            if current.unlocked() != entry.observed_tid {
                return false;
            }
        }
        true
    }

    /// Phase 4: install staged payloads under `commit_tid`, releasing each
    /// record lock in the same atomic store. Displaced payloads are kept
    /// for epoch retirement in post-processing.
    pub(crate) fn install(&mut self, commit_tid: TidWord, mark_blind: bool) {
        assert_eq!(self.locked, self.write_set.len(), "install without all locks");
        for pos in 0..self.write_set.len() {
            let entry = self.write_set.get(pos);
            let blind = mark_blind && !entry.is_read_modify_write;
            let displaced = entry
                .record
                .install(Arc::clone(&entry.value), commit_tid, blind);
            self.displaced.push(displaced);
        }
        self.locked = 0;
    }
}

fn present(value: &Arc<[u8]>) -> Option<&[u8]> {
    if value.is_empty() {
        None
    } else {
        Some(&value[..])
    }
}
