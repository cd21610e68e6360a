//! Core types for siltdb
//!
//! This crate defines the foundational types used throughout the system:
//! - Key: opaque byte-string keys
//! - TidWord: transaction identifier packed with its lock bit into one word
//! - TxStatus: transaction lifecycle status
//! - Config: database configuration (`silt.toml`)
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod tid;
pub mod types;

pub use config::{ConcurrencyControlKind, Config, CONFIG_FILE_NAME};
pub use error::{Result, SiltError};
pub use tid::TidWord;
pub use types::{Key, TxStatus};
