//! Protocol variant dispatch
//!
//! The two protocol variants share one operation surface. The variant is
//! chosen from configuration when the transaction is constructed and
//! embedded inline, so there is no per-transaction heap allocation for the
//! protocol object and every call dispatches statically through a `match`.

use crate::silo::Silo;
use crate::silo_nwr::SiloNwr;
use crate::snapshot::SnapshotSet;
use silt_core::{ConcurrencyControlKind, TidWord, TxStatus};
use silt_epoch::EpochParticipant;
use silt_index::PointIndex;
use std::sync::Arc;

/// A concurrency control instance: one of the protocol variants, bound to
/// one transaction.
pub enum ConcurrencyControl {
    /// Baseline Silo.
    Silo(Silo),
    /// Silo with non-visible write reordering.
    SiloNwr(SiloNwr),
}

impl ConcurrencyControl {
    /// Construct the configured variant over the shared index and the
    /// worker's epoch slot.
    pub fn new(
        kind: ConcurrencyControlKind,
        index: Arc<PointIndex>,
        participant: &EpochParticipant,
    ) -> Self {
        match kind {
            ConcurrencyControlKind::Silo => ConcurrencyControl::Silo(Silo::new(index, participant)),
            ConcurrencyControlKind::SiloNwr => {
                ConcurrencyControl::SiloNwr(SiloNwr::new(index, participant))
            }
        }
    }

    /// Protocol read (write-set, read-set, then index).
    pub fn read(&mut self, key: &[u8]) -> Option<&[u8]> {
        match self {
            ConcurrencyControl::Silo(cc) => cc.read(key),
            ConcurrencyControl::SiloNwr(cc) => cc.read(key),
        }
    }

    /// Stage a write.
    pub fn write(&mut self, key: &[u8], value: &[u8]) {
        match self {
            ConcurrencyControl::Silo(cc) => cc.write(key, value),
            ConcurrencyControl::SiloNwr(cc) => cc.write(key, value),
        }
    }

    /// Run the commit protocol; `true` means committed.
    pub fn precommit(&mut self) -> bool {
        match self {
            ConcurrencyControl::Silo(cc) => cc.precommit(),
            ConcurrencyControl::SiloNwr(cc) => cc.precommit(),
        }
    }

    /// Terminal cleanup, exactly once.
    pub fn post_processing(&mut self, status: TxStatus) {
        match self {
            ConcurrencyControl::Silo(cc) => cc.post_processing(status),
            ConcurrencyControl::SiloNwr(cc) => cc.post_processing(status),
        }
    }

    /// The identifier assigned at commit, if committed.
    pub fn commit_tid(&self) -> Option<TidWord> {
        match self {
            ConcurrencyControl::Silo(cc) => cc.commit_tid(),
            ConcurrencyControl::SiloNwr(cc) => cc.commit_tid(),
        }
    }

    /// The staged write-set.
    pub fn write_set(&self) -> &SnapshotSet {
        match self {
            ConcurrencyControl::Silo(cc) => cc.write_set(),
            ConcurrencyControl::SiloNwr(cc) => cc.write_set(),
        }
    }

    /// The epoch this transaction is pinned to.
    pub fn epoch(&self) -> u64 {
        match self {
            ConcurrencyControl::Silo(cc) => cc.epoch(),
            ConcurrencyControl::SiloNwr(cc) => cc.epoch(),
        }
    }
}
