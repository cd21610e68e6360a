//! Write-ahead log file and record format
//!
//! One append-only file, `silt-wal.log`, in the configured log directory.
//!
//! # Record Layout
//!
//! ```text
//! ┌──────────────────┬────────────────┬──────────────────────┬───────────┐
//! │ Length (4 bytes) │ Format Ver (1) │ Payload (variable)   │ CRC32 (4) │
//! └──────────────────┴────────────────┴──────────────────────┴───────────┘
//!
//! Payload:
//! ┌─────────┬───────────┬──────────────────────────────────────────────┐
//! │ Tid (8) │ Count (4) │ Count × { KeyLen (4) | Key | ValLen (4) | Val } │
//! └─────────┴───────────┴──────────────────────────────────────────────┘
//! ```
//!
//! All integers little-endian. The length field covers format version plus
//! payload; the CRC covers the same bytes. A torn tail therefore fails
//! either the length bound or the checksum, and recovery stops there.

use crc32fast::Hasher;
use silt_core::{Key, Result, SiltError, TidWord};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Log file name inside the log directory.
pub const WAL_FILE_NAME: &str = "silt-wal.log";

/// Current record format version.
pub const WAL_FORMAT_VERSION: u8 = 1;

/// Buffered appender over the write-ahead log.
///
/// Appends buffer in user space; [`sync`](WalWriter::sync) flushes and
/// fsyncs. The engine calls `sync` once per epoch advancement, which is
/// what makes commits group-durable per epoch.
pub struct WalWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    appended_since_sync: usize,
}

impl WalWriter {
    /// Open (creating if needed) the log file under `log_dir` for append.
    pub fn open(log_dir: impl AsRef<Path>) -> Result<Self> {
        let log_dir = log_dir.as_ref();
        std::fs::create_dir_all(log_dir)?;
        let path = log_dir.join(WAL_FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(WalWriter {
            writer: BufWriter::new(file),
            path,
            appended_since_sync: 0,
        })
    }

    /// Append one committed transaction: its identifier and its installed
    /// write-set. Buffered; not durable until the next [`sync`].
    ///
    /// [`sync`]: WalWriter::sync
    pub fn append<'a>(
        &mut self,
        tid: TidWord,
        writes: impl Iterator<Item = (&'a Key, &'a [u8])>,
    ) -> Result<()> {
        let record = encode_record(tid, writes);
        self.writer.write_all(&record)?;
        self.appended_since_sync += 1;
        Ok(())
    }

    /// Flush buffered records and fsync the file.
    pub fn sync(&mut self) -> Result<()> {
        if self.appended_since_sync == 0 {
            return Ok(());
        }
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        tracing::trace!(
            records = self.appended_since_sync,
            path = %self.path.display(),
            "log group synced"
        );
        self.appended_since_sync = 0;
        Ok(())
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WalWriter {
    fn drop(&mut self) {
        if let Err(e) = self.sync() {
            tracing::error!(error = %e, "final log sync failed");
        }
    }
}

fn encode_record<'a>(tid: TidWord, writes: impl Iterator<Item = (&'a Key, &'a [u8])>) -> Vec<u8> {
    let mut payload = Vec::with_capacity(64);
    payload.push(WAL_FORMAT_VERSION);
    payload.extend_from_slice(&tid.raw().to_le_bytes());
    // Count is patched in after the entries are serialized
    let count_at = payload.len();
    payload.extend_from_slice(&0u32.to_le_bytes());

    let mut count: u32 = 0;
    for (key, value) in writes {
        payload.extend_from_slice(&(key.len() as u32).to_le_bytes());
        payload.extend_from_slice(key.as_bytes());
        payload.extend_from_slice(&(value.len() as u32).to_le_bytes());
        payload.extend_from_slice(value);
        count += 1;
    }
    payload[count_at..count_at + 4].copy_from_slice(&count.to_le_bytes());

    let mut hasher = Hasher::new();
    hasher.update(&payload);
    let crc = hasher.finalize();

    let mut record = Vec::with_capacity(payload.len() + 8);
    record.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    record.extend_from_slice(&payload);
    record.extend_from_slice(&crc.to_le_bytes());
    record
}

/// One decoded log record.
pub struct DecodedRecord {
    /// Commit identifier of the logged transaction.
    pub tid: TidWord,
    /// Installed writes, in lock order.
    pub writes: Vec<(Key, Vec<u8>)>,
}

/// Decode the record starting at `bytes`. Returns the record and the
/// number of bytes consumed.
///
/// # Errors
///
/// `SiltError::Corruption` when the header is truncated, the length is
/// implausible, the checksum mismatches, or the payload does not parse.
/// Recovery treats any of these as the end of the usable log.
pub fn decode_record(bytes: &[u8]) -> Result<(DecodedRecord, usize)> {
    if bytes.len() < 4 {
        return Err(SiltError::Corruption("truncated record header".to_string()));
    }
    let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    // Version byte, identifier, and count are the minimum payload
    if len < 13 || bytes.len() < 4 + len + 4 {
        return Err(SiltError::Corruption("truncated record body".to_string()));
    }
    let payload = &bytes[4..4 + len];
    let crc_stored = u32::from_le_bytes([
        bytes[4 + len],
        bytes[4 + len + 1],
        bytes[4 + len + 2],
        bytes[4 + len + 3],
    ]);
    let mut hasher = Hasher::new();
    hasher.update(payload);
    if hasher.finalize() != crc_stored {
        return Err(SiltError::Corruption("record checksum mismatch".to_string()));
    }
    if payload[0] != WAL_FORMAT_VERSION {
        return Err(SiltError::Corruption(format!(
            "unsupported record format version {}",
            payload[0]
        )));
    }

    let tid = TidWord::from_raw(u64::from_le_bytes(
        payload[1..9].try_into().expect("fixed-width slice"),
    ));
    let count = u32::from_le_bytes(payload[9..13].try_into().expect("fixed-width slice"));

    let mut writes = Vec::with_capacity(count as usize);
    let mut at = 13;
    for _ in 0..count {
        let key = read_chunk(payload, &mut at)?;
        let value = read_chunk(payload, &mut at)?;
        writes.push((Key::from(key.to_vec()), value.to_vec()));
    }
    if at != payload.len() {
        return Err(SiltError::Corruption("trailing bytes in record".to_string()));
    }

    Ok((DecodedRecord { tid, writes }, 4 + len + 4))
}

fn read_chunk<'a>(payload: &'a [u8], at: &mut usize) -> Result<&'a [u8]> {
    if payload.len() < *at + 4 {
        return Err(SiltError::Corruption("truncated entry length".to_string()));
    }
    let len = u32::from_le_bytes(payload[*at..*at + 4].try_into().expect("fixed-width slice"))
        as usize;
    *at += 4;
    if payload.len() < *at + len {
        return Err(SiltError::Corruption("truncated entry bytes".to_string()));
    }
    let chunk = &payload[*at..*at + len];
    *at += len;
    Ok(chunk)
}
