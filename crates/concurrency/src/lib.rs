//! Concurrency control for siltdb
//!
//! This crate implements the transactional core:
//! - Snapshot: per-transaction read/write-set entries
//! - Silo: optimistic concurrency control with epoch-based group commit
//! - SiloNwr: Silo with non-visible write reordering for blind writes
//! - Transaction: the per-transaction facade handed to user procedures
//!
//! A transaction stages reads and writes in thread-local snapshot sets and
//! defers every index mutation to precommit, where the protocol locks the
//! write-set in ascending key order, computes a commit identifier, validates
//! the read-set against the index, and either installs or aborts. Aborted
//! transactions leave the shared index bitwise untouched.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod protocol;
pub mod silo;
pub mod silo_nwr;
pub mod snapshot;
pub mod transaction;

pub use protocol::ConcurrencyControl;
pub use silo::Silo;
pub use silo_nwr::SiloNwr;
pub use snapshot::{Snapshot, SnapshotSet};
pub use transaction::Transaction;
