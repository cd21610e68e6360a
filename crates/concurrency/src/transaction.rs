//! The transaction facade
//!
//! A thin per-transaction object bound to one protocol instance. User
//! procedures see only this type: `read`, `write`, `abort`. The dispatcher
//! drives `precommit` when the procedure returns and reports the terminal
//! status through its callback.
//!
//! Lifecycle: running while the procedure executes, then precommit decides
//! committed or aborted, post-processing runs exactly once, and the
//! transaction is dropped. A user abort short-circuits: reads return
//! nothing, writes are dropped, precommit goes straight to aborted.

use crate::protocol::ConcurrencyControl;
use silt_core::{ConcurrencyControlKind, Key, TidWord, TxStatus};
use silt_epoch::EpochParticipant;
use silt_index::PointIndex;
use std::sync::Arc;

/// A single transaction.
///
/// Owned by exactly one worker thread for its whole lifetime; the read- and
/// write-sets inside are invisible to every other transaction until commit
/// installs them.
pub struct Transaction {
    cc: ConcurrencyControl,
    status: TxStatus,
    user_aborted: bool,
}

impl Transaction {
    /// Begin a transaction on the calling worker.
    ///
    /// Pins the worker's epoch slot and embeds the configured protocol
    /// variant inline.
    pub fn begin(
        index: Arc<PointIndex>,
        participant: &EpochParticipant,
        kind: ConcurrencyControlKind,
    ) -> Self {
        Transaction {
            cc: ConcurrencyControl::new(kind, index, participant),
            status: TxStatus::Running,
            user_aborted: false,
        }
    }

    /// Read the value for `key`.
    ///
    /// Returns the staged write if this transaction wrote the key, the
    /// memoized value if it already read it (repeatable read), otherwise a
    /// validated copy from the index. `None` means the key is absent, or
    /// the transaction is no longer running.
    pub fn read(&mut self, key: impl AsRef<[u8]>) -> Option<&[u8]> {
        if self.user_aborted || self.status != TxStatus::Running {
            return None;
        }
        self.cc.read(key.as_ref())
    }

    /// Stage a write of `value` to `key`. No effect once the transaction
    /// is aborted or terminal.
    pub fn write(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) {
        if self.user_aborted || self.status != TxStatus::Running {
            return;
        }
        self.cc.write(key.as_ref(), value.as_ref());
    }

    /// Mark the transaction user-aborted. Subsequent reads and writes are
    /// no-ops and precommit will not install anything.
    pub fn abort(&mut self) {
        self.user_aborted = true;
    }

    /// Run the commit protocol and post-processing; returns whether the
    /// transaction committed.
    ///
    /// # Panics
    ///
    /// Panics if called twice; the terminal transition happens once.
    pub fn precommit(&mut self) -> bool {
        assert_eq!(
            self.status,
            TxStatus::Running,
            "precommit on a terminated transaction"
        );

        let committed = if self.user_aborted {
            false
        } else {
            self.cc.precommit()
        };

        self.status = if committed {
            TxStatus::Committed
        } else {
            TxStatus::Aborted
        };
        self.cc.post_processing(self.status);
        committed
    }

    /// Current status.
    pub fn status(&self) -> TxStatus {
        self.status
    }

    /// Whether precommit succeeded.
    pub fn is_committed(&self) -> bool {
        self.status == TxStatus::Committed
    }

    /// The commit identifier, once committed.
    pub fn commit_tid(&self) -> Option<TidWord> {
        self.cc.commit_tid()
    }

    /// The epoch this transaction is pinned to.
    pub fn epoch(&self) -> u64 {
        self.cc.epoch()
    }

    /// The installed writes of a committed transaction, in lock order.
    /// Empty for aborted transactions (their staged state is discarded).
    pub fn committed_writes(&self) -> impl Iterator<Item = (&Key, &[u8])> + '_ {
        self.cc
            .write_set()
            .iter()
            .filter(move |_| self.status == TxStatus::Committed)
            .map(|s| (&s.key, &s.value[..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silt_epoch::EpochFramework;

    fn setup() -> (Arc<PointIndex>, Arc<EpochFramework>) {
        (Arc::new(PointIndex::new()), Arc::new(EpochFramework::new()))
    }

    fn begin(
        index: &Arc<PointIndex>,
        participant: &EpochParticipant,
        kind: ConcurrencyControlKind,
    ) -> Transaction {
        Transaction::begin(Arc::clone(index), participant, kind)
    }

    #[test]
    fn test_read_absent_key_is_none() {
        let (index, fw) = setup();
        let p = EpochParticipant::register(&fw);
        let mut tx = begin(&index, &p, ConcurrencyControlKind::Silo);
        assert!(tx.read("missing").is_none());
        assert!(tx.precommit());
    }

    #[test]
    fn test_read_your_own_writes() {
        let (index, fw) = setup();
        let p = EpochParticipant::register(&fw);
        let mut tx = begin(&index, &p, ConcurrencyControlKind::Silo);
        tx.write("alice", b"1");
        assert_eq!(tx.read("alice"), Some(&b"1"[..]));
        tx.write("alice", b"2");
        assert_eq!(tx.read("alice"), Some(&b"2"[..]));
    }

    #[test]
    fn test_commit_installs_and_next_transaction_reads() {
        let (index, fw) = setup();
        let p = EpochParticipant::register(&fw);

        let mut tx = begin(&index, &p, ConcurrencyControlKind::Silo);
        tx.write("alice", b"payload");
        assert!(tx.precommit());
        let tid = tx.commit_tid().unwrap();
        assert!(tid > TidWord::ZERO);
        drop(tx);

        let mut tx = begin(&index, &p, ConcurrencyControlKind::Silo);
        assert_eq!(tx.read("alice"), Some(&b"payload"[..]));
        assert!(tx.precommit());
    }

    #[test]
    fn test_user_abort_short_circuits() {
        let (index, fw) = setup();
        let p = EpochParticipant::register(&fw);

        let mut tx = begin(&index, &p, ConcurrencyControlKind::SiloNwr);
        tx.write("alice", b"x");
        tx.abort();
        assert!(tx.read("alice").is_none());
        tx.write("bob", b"y");
        assert!(!tx.precommit());
        assert_eq!(tx.status(), TxStatus::Aborted);
        drop(tx);

        // Nothing was installed
        let mut tx = begin(&index, &p, ConcurrencyControlKind::SiloNwr);
        assert!(tx.read("alice").is_none());
        assert!(tx.read("bob").is_none());
        assert!(tx.precommit());
    }

    #[test]
    fn test_committed_writes_iteration() {
        let (index, fw) = setup();
        let p = EpochParticipant::register(&fw);

        let mut tx = begin(&index, &p, ConcurrencyControlKind::Silo);
        tx.write("bob", b"2");
        tx.write("alice", b"1");
        assert!(tx.precommit());

        let writes: Vec<_> = tx
            .committed_writes()
            .map(|(k, v)| (k.clone(), v.to_vec()))
            .collect();
        // Lock order: ascending key bytes
        assert_eq!(
            writes,
            vec![
                (Key::from("alice"), b"1".to_vec()),
                (Key::from("bob"), b"2".to_vec())
            ]
        );
    }

    #[test]
    fn test_aborted_transaction_exposes_no_writes() {
        let (index, fw) = setup();
        let p = EpochParticipant::register(&fw);

        let mut tx = begin(&index, &p, ConcurrencyControlKind::Silo);
        tx.write("alice", b"1");
        tx.abort();
        assert!(!tx.precommit());
        assert_eq!(tx.committed_writes().count(), 0);
    }

    #[test]
    #[should_panic(expected = "precommit on a terminated transaction")]
    fn test_double_precommit_panics() {
        let (index, fw) = setup();
        let p = EpochParticipant::register(&fw);
        let mut tx = begin(&index, &p, ConcurrencyControlKind::Silo);
        assert!(tx.precommit());
        tx.precommit();
    }
}
