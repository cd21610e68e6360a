//! # siltdb
//!
//! An embedded transactional key-value store built around optimistic
//! concurrency control with epoch-based group commit.
//!
//! Transactions are submitted as procedures; the engine executes them on a
//! worker pool against a shared in-memory point index, validates at commit
//! time, and reports `Committed` or `Aborted` through a callback. Two
//! protocol variants are available: `Silo` (the baseline) and `SiloNWR`
//! (the default), which resequences blind writes at commit time to avoid
//! spurious aborts under write-heavy workloads.
//!
//! # Quick Start
//!
//! ```no_run
//! use siltdb::{Database, TxStatus};
//!
//! fn main() -> siltdb::Result<()> {
//!     let db = Database::open("./my-data")?;
//!
//!     db.execute_transaction(
//!         |tx| {
//!             let balance = tx.read("alice").map(|v| v.to_vec());
//!             tx.write("alice", b"100");
//!             let _ = balance;
//!         },
//!         |status| assert_eq!(status, TxStatus::Committed),
//!     )?;
//!
//!     // Wait for every in-flight transaction, then everything committed
//!     // so far is visible and (with logging enabled) durable.
//!     db.fence();
//!     Ok(())
//! }
//! ```
//!
//! # Guarantees
//!
//! - Strict serializability: commit order is consistent with commit
//!   identifier order, which respects real time for non-overlapping
//!   transactions.
//! - Within a transaction: read-your-own-writes and repeatable reads.
//! - Aborted transactions leave no trace in shared state.
//!
//! # Configuration
//!
//! `silt.toml` in the data directory selects the protocol variant, epoch
//! cadence, worker count, and logging/recovery switches. See [`Config`].
//!
//! Internal crates (index, epoch, concurrency, durability, engine) are not
//! part of the stable surface; only the re-exports here are.

pub use silt_engine::{
    Config, ConcurrencyControlKind, Database, Key, Result, SiltError, TidWord, Transaction,
    TxStatus,
};
