//! Error types for siltdb
//!
//! We use `thiserror` for automatic `Display` and `Error` trait
//! implementations.
//!
//! Transaction aborts are deliberately NOT errors: a conflicting or
//! user-aborted transaction terminates with `TxStatus::Aborted` and is
//! reported through the dispatcher's status callback. `SiltError` covers the
//! conditions that are errors at the database boundary: I/O failures, log
//! corruption, bad configuration, and engine shutdown.

use thiserror::Error;

/// Unified error type for all siltdb APIs.
#[derive(Debug, Error)]
pub enum SiltError {
    /// Underlying I/O failure (log file, config file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The write-ahead log contains a record that fails validation.
    ///
    /// Recovery stops at the first corrupt record; everything before it is
    /// replayed, everything after it is discarded.
    #[error("log corruption: {0}")]
    Corruption(String),

    /// The database is shutting down and no longer accepts transactions.
    #[error("database is shutting down")]
    ShuttingDown,

    /// The transaction queue is at capacity.
    ///
    /// Retryable: resubmit once in-flight transactions have drained.
    #[error("transaction queue is full")]
    QueueFull,
}

/// Result alias used throughout siltdb.
pub type Result<T> = std::result::Result<T, SiltError>;
