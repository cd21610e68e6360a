//! Database engine for siltdb
//!
//! Wires the core together: the shared point index, the epoch framework
//! with its background advancer, the worker pool that dispatches
//! transaction procedures, and the optional write-ahead log with recovery
//! replay on open.
//!
//! The public surface is [`Database`]: submit a transaction procedure with
//! a status callback, and call [`Database::fence`] to wait for everything
//! in flight to land.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod logging;
mod pool;

pub mod database;

pub use database::Database;

// Re-export the types a Database user needs
pub use silt_concurrency::Transaction;
pub use silt_core::{Config, ConcurrencyControlKind, Key, Result, SiltError, TidWord, TxStatus};
