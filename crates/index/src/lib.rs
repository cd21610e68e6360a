//! Concurrent point index for siltdb
//!
//! A concurrent mapping from byte-string keys to versioned value records.
//! Lookups are lock-free via dashmap sharding; mutation goes through each
//! record's one-word lock protocol (see [`record`]).
//!
//! The index owns every record for its whole lifetime. Records are never
//! removed; handles returned by [`PointIndex::get_or_insert`] stay valid
//! until the index is dropped.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod point_index;
pub mod record;

pub use point_index::PointIndex;
pub use record::Record;
