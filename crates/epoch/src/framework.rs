//! Global and per-worker epochs
//!
//! `EpochFramework` owns the global epoch counter and the registry of
//! per-worker slots. Each worker registers one `EpochParticipant` for its
//! lifetime; each transaction pins an epoch by holding an `EpochGuard` from
//! entry to post-processing.
//!
//! Write ownership is strict: the global counter is only stored by
//! `advance`, and each slot is only stored by its owning worker. Everyone
//! else just reads.

use crate::reclaim::RetireList;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// First epoch of a fresh database. Zero is reserved so that a zero
/// `TidWord` can never collide with a committed identifier.
pub const INITIAL_EPOCH: u64 = 1;

/// Sentinel published by a worker that is not inside a transaction.
/// Idle workers never hold back advancement.
const IDLE: u64 = u64::MAX;

struct Slot {
    local: AtomicU64,
}

/// The global epoch counter, the worker registry, and the retirement list.
pub struct EpochFramework {
    global: AtomicU64,
    slots: RwLock<Vec<Arc<Slot>>>,
    retired: RetireList,
}

impl EpochFramework {
    /// Create a framework starting at [`INITIAL_EPOCH`].
    pub fn new() -> Self {
        Self::with_initial_epoch(INITIAL_EPOCH)
    }

    /// Create a framework starting at `epoch`.
    ///
    /// Used after recovery so that fresh commit identifiers stay above
    /// every identifier replayed from the log.
    pub fn with_initial_epoch(epoch: u64) -> Self {
        assert!(epoch > 0, "epoch 0 is reserved");
        assert!(epoch <= u32::MAX as u64, "epoch exceeds the identifier field");
        EpochFramework {
            global: AtomicU64::new(epoch),
            slots: RwLock::new(Vec::new()),
            retired: RetireList::new(),
        }
    }

    /// Current global epoch.
    pub fn global(&self) -> u64 {
        self.global.load(Ordering::SeqCst)
    }

    /// Advance the global epoch by one step if the fence permits.
    ///
    /// The step from `e` to `e + 1` is taken only once every active worker
    /// has published `e`; a worker still inside an older epoch blocks it.
    /// Returns the global epoch after the attempt.
    pub fn advance(&self) -> u64 {
        let current = self.global.load(Ordering::SeqCst);
        {
            let slots = self.slots.read();
            for slot in slots.iter() {
                let local = slot.local.load(Ordering::SeqCst);
                if local != IDLE && local < current {
                    // Reclamation fence: someone is still in an older epoch
                    return current;
                }
            }
        }
        assert!(
            current < u32::MAX as u64,
            "epoch counter exceeded the identifier field"
        );
        // Racing advancers are fine: exactly one CAS wins each step
        let _ = self
            .global
            .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst);
        self.global.load(Ordering::SeqCst)
    }

    /// Block until the global epoch has advanced at least two full steps.
    ///
    /// After `sync` returns, every transaction that was in flight when it
    /// was called has drained out of its epoch, and everything retired
    /// before the call is reclaimable.
    pub fn sync(&self) {
        let target = self.global.load(Ordering::SeqCst) + 2;
        while self.global.load(Ordering::SeqCst) < target {
            self.advance();
            std::thread::yield_now();
        }
        self.collect();
    }

    /// Retire a displaced payload buffer under `epoch`.
    pub fn retire(&self, epoch: u64, buffer: Arc<[u8]>) {
        self.retired.retire(epoch, buffer);
    }

    /// Release every retired buffer whose epoch the global counter has
    /// moved at least two steps past. Returns the number released.
    pub fn collect(&self) -> usize {
        self.retired.collect(self.global())
    }

    /// Number of buffers currently awaiting reclamation.
    pub fn retired_len(&self) -> usize {
        self.retired.len()
    }
}

impl Default for EpochFramework {
    fn default() -> Self {
        Self::new()
    }
}

/// A worker's registration with the epoch framework.
///
/// One participant per worker thread; the participant's slot is written
/// only by that worker. Transactions pin an epoch with [`enter`].
///
/// [`enter`]: EpochParticipant::enter
pub struct EpochParticipant {
    framework: Arc<EpochFramework>,
    slot: Arc<Slot>,
    thread_id: u8,
}

impl EpochParticipant {
    /// Register a new worker with `framework` and hand it its epoch slot.
    ///
    /// # Panics
    ///
    /// Panics when the registry is full; the identifier layout carries
    /// 8 thread bits, so at most 256 workers can ever register.
    pub fn register(framework: &Arc<EpochFramework>) -> EpochParticipant {
        let slot = Arc::new(Slot {
            local: AtomicU64::new(IDLE),
        });
        let mut slots = framework.slots.write();
        let id = slots.len();
        assert!(id < 256, "epoch participant registry full (256 workers)");
        slots.push(Arc::clone(&slot));
        EpochParticipant {
            framework: Arc::clone(framework),
            slot,
            thread_id: id as u8,
        }
    }

    /// The framework this participant is registered with.
    pub fn framework(&self) -> &Arc<EpochFramework> {
        &self.framework
    }

    /// Stable small id for this worker, embedded in commit identifiers.
    pub fn thread_id(&self) -> u8 {
        self.thread_id
    }

    /// Pin the current global epoch for the duration of the returned guard.
    ///
    /// The publish loop re-checks the global counter after the store so the
    /// pinned value can lag the global epoch by at most the fence allows.
    pub fn enter(&self) -> EpochGuard {
        debug_assert_eq!(
            self.slot.local.load(Ordering::Relaxed),
            IDLE,
            "nested epoch entry on one participant"
        );
        loop {
            let epoch = self.framework.global.load(Ordering::SeqCst);
            self.slot.local.store(epoch, Ordering::SeqCst);
            if self.framework.global.load(Ordering::SeqCst) == epoch {
                return EpochGuard {
                    slot: Arc::clone(&self.slot),
                    epoch,
                };
            }
            // The advancer slipped past between the load and the publish;
            // republish against the new value.
        }
    }
}

impl Drop for EpochParticipant {
    fn drop(&mut self) {
        // A dropped worker must never hold back the fence
        self.slot.local.store(IDLE, Ordering::SeqCst);
    }
}

/// RAII pin on an epoch. Dropping the guard publishes the idle sentinel.
pub struct EpochGuard {
    slot: Arc<Slot>,
    epoch: u64,
}

impl EpochGuard {
    /// The epoch pinned by this guard.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for EpochGuard {
    fn drop(&mut self) {
        self.slot.local.store(IDLE, Ordering::SeqCst);
    }
}
