//! Log replay
//!
//! Recovery scans the log front to back, keeps the highest-identifier
//! version of every key, and installs the survivors into a fresh point
//! index. The scan stops at the first record that fails to decode: a torn
//! tail from a crash mid-append loses that epoch group and nothing else.

use crate::wal::{decode_record, WAL_FILE_NAME};
use rustc_hash::FxHashMap;
use silt_core::{Key, Result, TidWord};
use silt_index::PointIndex;
use std::path::Path;
use std::sync::Arc;

/// Outcome of log replay.
pub struct RecoveredState {
    /// Index holding the recovered versions.
    pub index: PointIndex,
    /// Highest epoch seen in any replayed identifier; the epoch framework
    /// resumes past it so new commits stay above recovered ones.
    pub max_epoch: u64,
    /// Number of log records replayed.
    pub records_replayed: usize,
}

impl RecoveredState {
    fn empty() -> Self {
        RecoveredState {
            index: PointIndex::new(),
            max_epoch: 0,
            records_replayed: 0,
        }
    }
}

/// Replay the write-ahead log under `log_dir`.
///
/// Missing log file means a fresh database: an empty index is returned.
/// Decode failures end the scan with a warning rather than an error, so a
/// crash-torn tail never blocks opening the database.
pub fn recover(log_dir: impl AsRef<Path>) -> Result<RecoveredState> {
    let path = log_dir.as_ref().join(WAL_FILE_NAME);
    if !path.exists() {
        return Ok(RecoveredState::empty());
    }
    let bytes = std::fs::read(&path)?;

    let mut latest: FxHashMap<Key, (TidWord, Vec<u8>)> = FxHashMap::default();
    let mut max_epoch = 0;
    let mut records_replayed = 0;
    let mut at = 0;

    while at < bytes.len() {
        let (record, consumed) = match decode_record(&bytes[at..]) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(
                    offset = at,
                    error = %e,
                    "log scan stopped at undecodable record; discarding tail"
                );
                break;
            }
        };
        at += consumed;
        records_replayed += 1;
        max_epoch = max_epoch.max(record.tid.epoch());
        for (key, value) in record.writes {
            match latest.get(&key) {
                Some((tid, _)) if *tid > record.tid => {}
                _ => {
                    latest.insert(key, (record.tid, value));
                }
            }
        }
    }

    let mut index = PointIndex::new();
    for (key, (tid, value)) in latest {
        index.apply_recovered(key, Arc::from(value.into_boxed_slice()), tid);
    }

    tracing::debug!(
        records_replayed,
        keys = index.len(),
        max_epoch,
        "log replay complete"
    );

    Ok(RecoveredState {
        index,
        max_epoch,
        records_replayed,
    })
}
