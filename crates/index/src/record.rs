//! Versioned value records
//!
//! Each record carries its payload plus one atomic word holding the
//! version identifier and the record lock bit together, so a reader can
//! sample version-and-lock in a single load and a committer can take the
//! lock with a single CAS.
//!
//! Protocol invariants:
//! - the payload is only replaced while the lock bit is held;
//! - the stored identifier never decreases;
//! - at most one transaction holds the lock at a time (CAS from unlocked).

use parking_lot::RwLock;
use silt_core::TidWord;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// A single key's versioned record.
pub struct Record {
    word: AtomicU64,
    payload: RwLock<Arc<[u8]>>,
    // Reordering metadata, maintained only by the SiloNWR protocol:
    // `pivot` is the highest identifier under which the current version was
    // read-validated; `blind` marks a version installed without a prior
    // read of the key.
    pivot: AtomicU64,
    blind: AtomicBool,
}

impl Record {
    /// A fresh record: empty payload, identifier zero, unlocked.
    pub fn new() -> Self {
        Record {
            word: AtomicU64::new(TidWord::ZERO.raw()),
            payload: RwLock::new(Arc::from(&[][..])),
            pivot: AtomicU64::new(TidWord::ZERO.raw()),
            blind: AtomicBool::new(false),
        }
    }

    /// Atomically sample the identifier word (including the lock bit).
    pub fn tid(&self) -> TidWord {
        TidWord::from_raw(self.word.load(Ordering::Acquire))
    }

    /// Optimistically read the record: sample the word, copy the payload,
    /// resample, and retry until the two samples agree and are unlocked.
    ///
    /// The returned identifier is the version the payload belongs to.
    pub fn optimistic_read(&self) -> (Arc<[u8]>, TidWord) {
        loop {
            let before = self.tid();
            if before.is_locked() {
                std::hint::spin_loop();
                continue;
            }
            let payload = Arc::clone(&self.payload.read());
            let after = self.tid();
            if before == after {
                return (payload, before);
            }
            // A committer installed between the samples; go again
        }
    }

    /// Try to take the record lock: CAS the word from `expected` (which
    /// must be unlocked) to its locked form.
    pub fn try_lock(&self, expected: TidWord) -> bool {
        debug_assert!(!expected.is_locked());
        self.word
            .compare_exchange(
                expected.raw(),
                expected.locked().raw(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Replace the payload and publish `commit_tid` with the lock cleared,
    /// in that order. Returns the displaced payload for retirement.
    ///
    /// Caller must hold the record lock, and `commit_tid` must exceed the
    /// locked version.
    pub fn install(&self, new_payload: Arc<[u8]>, commit_tid: TidWord, blind: bool) -> Arc<[u8]> {
        let held = self.tid();
        assert!(held.is_locked(), "install without holding the record lock");
        assert!(
            commit_tid.unlocked() > held.unlocked(),
            "identifier regression on install"
        );
        let displaced = {
            let mut payload = self.payload.write();
            std::mem::replace(&mut *payload, new_payload)
        };
        self.blind.store(blind, Ordering::Release);
        // New version, not yet observed by anyone
        self.pivot.store(TidWord::ZERO.raw(), Ordering::Release);
        self.word.store(commit_tid.unlocked().raw(), Ordering::Release);
        displaced
    }

    /// Release the lock without touching payload or identifier (abort path).
    pub fn unlock(&self) {
        let held = self.tid();
        assert!(held.is_locked(), "unlock without holding the record lock");
        self.word.store(held.unlocked().raw(), Ordering::Release);
    }

    /// The highest identifier under which the current version was
    /// read-validated (SiloNWR metadata).
    pub fn pivot(&self) -> TidWord {
        TidWord::from_raw(self.pivot.load(Ordering::Acquire))
    }

    /// Raise the pivot to `tid` if it is higher than the stored value.
    pub fn raise_pivot(&self, tid: TidWord) {
        self.pivot.fetch_max(tid.raw(), Ordering::AcqRel);
    }

    /// Whether the current version was installed by a blind write.
    pub fn is_blind_version(&self) -> bool {
        self.blind.load(Ordering::Acquire)
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}
