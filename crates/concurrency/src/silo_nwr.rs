//! Silo with non-visible write reordering
//!
//! SiloNWR keeps the baseline read/write surface and the four-phase commit
//! but refines validation around blind writes (writes to keys the writer
//! never read). A blind write carries no information about the version it
//! displaces, so a transaction whose read was superseded by one does not
//! have to abort: it can serialize immediately before the blind writer, as
//! long as that position is consistent.
//!
//! Two pieces of record metadata support the reordering decision:
//! - the blind flag, stamped at install time on versions written blind;
//! - the pivot identifier, the highest commit identifier under which the
//!   current version was read-validated. Writers fold the pivot of every
//!   version they displace into their own commit identifier, so overwrites
//!   serialize after all committed readers of the displaced version.
//!
//! Reordering is granted only to transactions with an empty write-set:
//! they install nothing, so placing them just before the blind writer can
//! never introduce a dependency cycle. Read-write transactions keep the
//! baseline validation rule.

use crate::silo::Silo;
use silt_core::{TidWord, TxStatus};
use silt_epoch::EpochParticipant;
use silt_index::PointIndex;
use std::sync::Arc;

/// SiloNWR concurrency control, bound to one transaction.
pub struct SiloNwr {
    base: Silo,
}

impl SiloNwr {
    /// Bind a protocol instance to the shared index and the worker's epoch
    /// slot.
    pub fn new(index: Arc<PointIndex>, participant: &EpochParticipant) -> Self {
        SiloNwr {
            base: Silo::new(index, participant),
        }
    }

    /// The epoch this transaction is pinned to.
    pub fn epoch(&self) -> u64 {
        self.base.epoch()
    }

    /// The identifier assigned at commit, if committed.
    pub fn commit_tid(&self) -> Option<TidWord> {
        self.base.commit_tid()
    }

    /// The staged write-set.
    pub fn write_set(&self) -> &crate::snapshot::SnapshotSet {
        self.base.write_set()
    }

    /// See [`Silo::read`].
    pub fn read(&mut self, key: &[u8]) -> Option<&[u8]> {
        self.base.read(key)
    }

    /// See [`Silo::write`]. The staged entry's read-modify-write marking
    /// doubles as the pre-announcement: entries without it install as blind
    /// versions, which is what later validators key their reordering on.
    pub fn write(&mut self, key: &[u8], value: &[u8]) {
        self.base.write(key, value)
    }

    /// Run the commit protocol with write reordering.
    pub fn precommit(&mut self) -> bool {
        self.base.write_set.sort_by_key();

        if !self.base.lock_write_set() {
            tracing::trace!(thread = self.base.thread_id, "abort: write-set lock contention");
            self.base.release_locks();
            return false;
        }

        let commit_tid = self.base.compute_commit_tid(true);

        if !self.validate_with_reordering() {
            tracing::trace!(thread = self.base.thread_id, "abort: read validation failed");
            self.base.release_locks();
            return false;
        }

        self.publish_pivots(commit_tid);
        self.base.install(commit_tid, true);
        self.base.commit_tid = Some(commit_tid);
        true
    }

    /// See [`Silo::post_processing`].
    pub fn post_processing(&mut self, status: TxStatus) {
        self.base.post_processing(status)
    }

    /// Read validation with the blind-write escape hatch.
    ///
    /// A superseded entry passes when all of:
    /// - the superseding version was installed blind;
    /// - this transaction installs nothing (empty write-set);
    /// - every identifier in the read-set predates the superseding one, so
    ///   the whole snapshot was current just before the blind install.
    ///
    /// The transaction then serializes at that point, before the blind
    /// writer, and the writer's installation logically reorders after it.
    fn validate_with_reordering(&self) -> bool {
        let read_only = self.base.write_set.is_empty();
        for entry in self.base.read_set.iter() {
            let current = entry.record.tid();
            let own_write = self
                .base
                .write_set
                .position(entry.key.as_bytes())
                .is_some();

            if own_write {
                // Read-modify-write: our own lock is expected, but the
                // version underneath must be the one we read.
                if current.unlocked() != entry.observed_tid {
                    return false;
                }
                continue;
            }
            if current.is_locked() {
                return false;
            }
            if current == entry.observed_tid {
                continue;
            }

            let superseding = current;
            if !entry.record.is_blind_version() || !read_only {
                return false;
            }
            let snapshot_predates = self
                .base
                .read_set
                .iter()
                .all(|other| other.observed_tid < superseding);
            if !snapshot_predates {
                return false;
            }
            tracing::trace!(
                thread = self.base.thread_id,
                "read of {:?} reordered before blind write {:?}",
                entry.key,
                superseding
            );
        }
        true
    }

    /// Publish this commit identifier as the pivot of every cleanly
    /// validated read. Read-only commits skip this: they install nothing
    /// and nothing ever needs to serialize after them.
    fn publish_pivots(&self, commit_tid: TidWord) {
        if self.base.write_set.is_empty() {
            return;
        }
        for entry in self.base.read_set.iter() {
            if entry.record.tid().unlocked() == entry.observed_tid {
                entry.record.raise_pivot(commit_tid);
            }
        }
    }
}
