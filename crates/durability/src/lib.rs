//! Durability layer for siltdb
//!
//! An append-only write-ahead log of committed write-sets, grouped by
//! epoch: the engine appends one record per committed transaction and syncs
//! the file once per epoch advancement. Recovery replays the log into a
//! fresh point index, stopping at the first torn or corrupt record.
//!
//! The core commit protocol never waits on this layer; log append happens
//! after post-processing, outside every record lock.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod recovery;
pub mod wal;

pub use recovery::{recover, RecoveredState};
pub use wal::{WalWriter, WAL_FILE_NAME};
