//! Database configuration via `silt.toml`
//!
//! A simple config file in the data directory. On first open, a default
//! `silt.toml` is created. To change settings, edit the file and reopen the
//! database.

use crate::error::{Result, SiltError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name placed in the database data directory.
pub const CONFIG_FILE_NAME: &str = "silt.toml";

/// Concurrency control protocol variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyControlKind {
    /// Baseline optimistic concurrency control with epoch-based group commit.
    Silo,
    /// Silo with non-visible write reordering: blind writes may be
    /// resequenced at commit time to avoid spurious aborts.
    SiloNwr,
}

/// Database configuration loaded from `silt.toml`.
///
/// # Example
///
/// ```toml
/// # Protocol: "Silo" or "SiloNWR" (default). Unrecognized values fall
/// # back to "SiloNWR".
/// concurrency_control_protocol = "SiloNWR"
///
/// # Epoch cadence in milliseconds. Commits are grouped and the log is
/// # synced once per epoch.
/// epoch_duration_ms = 40
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Concurrency control protocol: `"Silo"` or `"SiloNWR"`.
    #[serde(default = "default_concurrency_control")]
    pub concurrency_control_protocol: String,

    /// Advisory epoch cadence in milliseconds.
    #[serde(default = "default_epoch_duration_ms")]
    pub epoch_duration_ms: u64,

    /// Number of worker threads executing transaction procedures.
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Maximum number of queued (not yet executing) transactions.
    #[serde(default = "default_max_queued_transactions")]
    pub max_queued_transactions: usize,

    /// Append committed write-sets to the write-ahead log.
    #[serde(default = "default_true")]
    pub enable_logging: bool,

    /// Replay the write-ahead log on open.
    #[serde(default = "default_true")]
    pub enable_recovery: bool,

    /// Directory holding the write-ahead log, relative to the data
    /// directory unless absolute.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_concurrency_control() -> String {
    "SiloNWR".to_string()
}

fn default_epoch_duration_ms() -> u64 {
    40
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_max_queued_transactions() -> usize {
    4096
}

fn default_true() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("silt_logs")
}

impl Default for Config {
    fn default() -> Self {
        Config {
            concurrency_control_protocol: default_concurrency_control(),
            epoch_duration_ms: default_epoch_duration_ms(),
            worker_threads: default_worker_threads(),
            max_queued_transactions: default_max_queued_transactions(),
            enable_logging: default_true(),
            enable_recovery: default_true(),
            log_dir: default_log_dir(),
        }
    }
}

impl Config {
    /// The selected protocol variant.
    ///
    /// `"Silo"` selects the baseline; `"SiloNWR"` and any unrecognized
    /// value select the reordering variant.
    pub fn protocol(&self) -> ConcurrencyControlKind {
        match self.concurrency_control_protocol.as_str() {
            "Silo" | "silo" => ConcurrencyControlKind::Silo,
            _ => ConcurrencyControlKind::SiloNwr,
        }
    }

    /// Load `silt.toml` from `dir`, writing the defaults first if the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns `SiltError::InvalidConfig` if the file exists but does not
    /// parse, and `SiltError::Io` on filesystem failures.
    pub fn load_or_create(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILE_NAME);
        if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            toml::from_str(&text)
                .map_err(|e| SiltError::InvalidConfig(format!("{}: {}", path.display(), e)))
        } else {
            let config = Config::default();
            config.save(dir)?;
            Ok(config)
        }
    }

    /// Write this configuration as `silt.toml` into `dir`.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| SiltError::InvalidConfig(e.to_string()))?;
        std::fs::write(dir.as_ref().join(CONFIG_FILE_NAME), text)?;
        Ok(())
    }

    /// Resolve the log directory against the data directory.
    pub fn log_dir_in(&self, data_dir: impl AsRef<Path>) -> PathBuf {
        if self.log_dir.is_absolute() {
            self.log_dir.clone()
        } else {
            data_dir.as_ref().join(&self.log_dir)
        }
    }
}
