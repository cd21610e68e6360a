//! The database handle
//!
//! Owns the shared point index, the epoch framework with its background
//! advancer, the worker pool, and the optional write-ahead log. Opening
//! with recovery enabled replays the log before the first transaction is
//! accepted; the epoch framework then resumes past every recovered epoch
//! so fresh commit identifiers stay above replayed ones.

use crate::logging;
use crate::pool::{SharedState, TransactionJob, WorkerPool};
use parking_lot::Mutex;
use silt_concurrency::Transaction;
use silt_core::{Config, Result, TxStatus};
use silt_durability::{recover, WalWriter};
use silt_epoch::{EpochAdvancer, EpochFramework, INITIAL_EPOCH};
use silt_index::PointIndex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// An embedded transactional key-value store.
///
/// Submit transaction procedures with [`execute_transaction`]; the worker
/// pool runs each one against a fresh [`Transaction`], drives the commit
/// protocol when it returns, and reports `Committed` or `Aborted` through
/// the callback. [`fence`] waits for everything in flight.
///
/// [`execute_transaction`]: Database::execute_transaction
/// [`fence`]: Database::fence
///
/// # Example
///
/// ```no_run
/// use silt_engine::{Database, TxStatus};
///
/// let db = Database::open("./my-data")?;
/// db.execute_transaction(
///     |tx| {
///         let stock = tx.read("stock").map(|v| v.to_vec());
///         tx.write("stock", b"42");
///         let _ = stock;
///     },
///     |status| assert_eq!(status, TxStatus::Committed),
/// )?;
/// db.fence();
/// # Ok::<(), silt_engine::SiltError>(())
/// ```
pub struct Database {
    config: Config,
    pool: WorkerPool,
    epochs: Arc<EpochFramework>,
    advancer: EpochAdvancer,
    wal: Option<Arc<Mutex<WalWriter>>>,
}

impl Database {
    /// Open the database in `path`, loading `silt.toml` from it (and
    /// writing the defaults on first open).
    pub fn open(path: impl AsRef<Path>) -> Result<Database> {
        let config = Config::load_or_create(path.as_ref())?;
        Self::open_with(path, config)
    }

    /// Open the database in `path` with an explicit configuration,
    /// ignoring any `silt.toml` on disk.
    pub fn open_with(path: impl AsRef<Path>, config: Config) -> Result<Database> {
        logging::init();
        let log_dir = config.log_dir_in(path.as_ref());

        let (index, initial_epoch) = if config.enable_recovery {
            let state = recover(&log_dir)?;
            if state.records_replayed > 0 {
                tracing::info!(
                    records = state.records_replayed,
                    keys = state.index.len(),
                    "recovered from write-ahead log"
                );
            }
            (state.index, (state.max_epoch + 1).max(INITIAL_EPOCH))
        } else {
            (PointIndex::new(), INITIAL_EPOCH)
        };
        let index = Arc::new(index);
        let epochs = Arc::new(EpochFramework::with_initial_epoch(initial_epoch));

        let wal = if config.enable_logging {
            Some(Arc::new(Mutex::new(WalWriter::open(&log_dir)?)))
        } else {
            None
        };

        // Group commit: the log is synced once per epoch step
        let advancer = {
            let wal = wal.clone();
            EpochAdvancer::spawn(
                Arc::clone(&epochs),
                Duration::from_millis(config.epoch_duration_ms.max(1)),
                move |_epoch| {
                    if let Some(wal) = &wal {
                        if let Err(e) = wal.lock().sync() {
                            tracing::error!(error = %e, "epoch group sync failed");
                        }
                    }
                },
            )
        };

        let pool = WorkerPool::new(
            config.worker_threads.max(1),
            config.max_queued_transactions,
            SharedState {
                index,
                epochs: Arc::clone(&epochs),
                protocol: config.protocol(),
                wal: wal.clone(),
            },
        );

        Ok(Database {
            config,
            pool,
            epochs,
            advancer,
            wal,
        })
    }

    /// Submit a transaction procedure.
    ///
    /// The procedure runs on a worker thread with a fresh [`Transaction`];
    /// when it returns, the worker drives precommit and delivers the
    /// terminal status through `callback`.
    ///
    /// # Errors
    ///
    /// `SiltError::QueueFull` under backpressure, `SiltError::ShuttingDown`
    /// once the database is closing. The procedure has not run in either
    /// case and may be resubmitted.
    pub fn execute_transaction(
        &self,
        procedure: impl FnOnce(&mut Transaction) + Send + 'static,
        callback: impl FnOnce(TxStatus) + Send + 'static,
    ) -> Result<()> {
        self.pool.submit(TransactionJob {
            procedure: Box::new(procedure),
            callback: Box::new(callback),
        })
    }

    /// Wait until every submitted transaction has terminated, the epoch
    /// has fully turned over, and (when logging is enabled) everything
    /// committed so far is synced to the log.
    pub fn fence(&self) {
        self.pool.drain();
        self.epochs.sync();
        if let Some(wal) = &self.wal {
            if let Err(e) = wal.lock().sync() {
                tracing::error!(error = %e, "fence log sync failed");
            }
        }
    }

    /// The configuration this database was opened with.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Order matters: stop accepting and finish transactions, stop the
        // advancer, then take the final log sync.
        self.pool.shutdown();
        self.advancer.shutdown();
        if let Some(wal) = &self.wal {
            if let Err(e) = wal.lock().sync() {
                tracing::error!(error = %e, "final log sync failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use silt_core::SiltError;
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn ephemeral_config() -> Config {
        let mut config = Config::default();
        config.enable_logging = false;
        config.enable_recovery = false;
        config.worker_threads = 2;
        config.epoch_duration_ms = 5;
        config
    }

    fn run_one(db: &Database, procedure: impl FnOnce(&mut Transaction) + Send + 'static) -> TxStatus {
        let (sender, receiver) = mpsc::channel();
        db.execute_transaction(procedure, move |status| {
            sender.send(status).unwrap();
        })
        .unwrap();
        receiver
            .recv_timeout(std::time::Duration::from_secs(10))
            .unwrap()
    }

    #[test]
    fn test_open_writes_config_file() {
        let dir = TempDir::new().unwrap();
        {
            let mut config = ephemeral_config();
            config.enable_logging = false;
            let db = Database::open_with(dir.path(), config).unwrap();
            db.fence();
        }
        // open() creates silt.toml on first use
        let db = Database::open(dir.path()).unwrap();
        assert!(dir.path().join(silt_core::CONFIG_FILE_NAME).exists());
        drop(db);
    }

    #[test]
    fn test_commit_then_read_back() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_with(dir.path(), ephemeral_config()).unwrap();

        assert_eq!(
            run_one(&db, |tx| tx.write("alice", b"first")),
            TxStatus::Committed
        );

        let (sender, receiver) = mpsc::channel();
        run_one(&db, move |tx| {
            sender.send(tx.read("alice").map(|v| v.to_vec())).unwrap();
        });
        assert_eq!(receiver.recv().unwrap().as_deref(), Some(&b"first"[..]));
    }

    #[test]
    fn test_fence_drains_everything() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_with(dir.path(), ephemeral_config()).unwrap();
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        for i in 0..32u32 {
            let count = Arc::clone(&count);
            db.execute_transaction(
                move |tx| tx.write(format!("k{}", i), i.to_le_bytes()),
                move |_| {
                    count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                },
            )
            .unwrap();
        }
        db.fence();
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 32);
    }

    #[test]
    fn test_submit_after_drop_path_errors() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_with(dir.path(), ephemeral_config()).unwrap();
        db.pool.shutdown();
        let result = db.execute_transaction(|_| {}, |_| {});
        assert!(matches!(result, Err(SiltError::ShuttingDown)));
    }
}
