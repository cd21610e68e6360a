//! Transaction worker pool
//!
//! A fixed pool of worker threads draining a FIFO of submitted transaction
//! procedures. Each worker registers one epoch participant at startup and
//! keeps it for its lifetime; every transaction it runs is pinned through
//! that slot.
//!
//! Per job, the worker constructs a fresh transaction, runs the user
//! procedure, drives precommit, appends the committed write-set to the log
//! when logging is on, and finally delivers the terminal status through the
//! job's callback. A panicking procedure aborts its transaction instead of
//! killing the worker.

use parking_lot::{Condvar, Mutex};
use silt_concurrency::Transaction;
use silt_core::{ConcurrencyControlKind, Result, SiltError, TxStatus};
use silt_durability::WalWriter;
use silt_epoch::{EpochFramework, EpochParticipant};
use silt_index::PointIndex;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Everything a worker needs to run transactions.
pub(crate) struct SharedState {
    pub index: Arc<PointIndex>,
    pub epochs: Arc<EpochFramework>,
    pub protocol: ConcurrencyControlKind,
    pub wal: Option<Arc<Mutex<WalWriter>>>,
}

/// One submitted transaction: the user procedure plus the status callback.
pub(crate) struct TransactionJob {
    pub procedure: Box<dyn FnOnce(&mut Transaction) + Send>,
    pub callback: Box<dyn FnOnce(TxStatus) + Send>,
}

struct PoolInner {
    queue: Mutex<VecDeque<TransactionJob>>,
    work_ready: Condvar,
    drain_cond: Condvar,
    shutdown: AtomicBool,
    queued: AtomicUsize,
    active: AtomicUsize,
    max_queued: usize,
    shared: SharedState,
}

/// Fixed-size transaction dispatcher.
pub(crate) struct WorkerPool {
    inner: Arc<PoolInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `num_threads` workers named `silt-worker-N`.
    pub fn new(num_threads: usize, max_queued: usize, shared: SharedState) -> Self {
        let inner = Arc::new(PoolInner {
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            drain_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            queued: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_queued,
            shared,
        });

        let mut workers = Vec::with_capacity(num_threads);
        for i in 0..num_threads {
            let inner = Arc::clone(&inner);
            let handle = std::thread::Builder::new()
                .name(format!("silt-worker-{}", i))
                .spawn(move || worker_loop(&inner))
                .expect("failed to spawn transaction worker thread");
            workers.push(handle);
        }

        WorkerPool {
            inner,
            workers: Mutex::new(workers),
        }
    }

    /// Enqueue a transaction.
    ///
    /// # Errors
    ///
    /// `SiltError::ShuttingDown` after shutdown, `SiltError::QueueFull`
    /// when the queue is at capacity.
    pub fn submit(&self, job: TransactionJob) -> Result<()> {
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(SiltError::ShuttingDown);
        }
        if self.inner.queued.load(Ordering::Acquire) >= self.inner.max_queued {
            return Err(SiltError::QueueFull);
        }

        {
            let mut queue = self.inner.queue.lock();
            queue.push_back(job);
            self.inner.queued.fetch_add(1, Ordering::Release);
        }
        self.inner.work_ready.notify_one();
        Ok(())
    }

    /// Block until every queued and in-flight transaction has terminated.
    /// Workers stay alive; this is not shutdown.
    pub fn drain(&self) {
        let mut queue = self.inner.queue.lock();
        while self.inner.queued.load(Ordering::Acquire) > 0
            || self.inner.active.load(Ordering::Acquire) > 0
        {
            self.inner.drain_cond.wait(&mut queue);
        }
    }

    /// Signal workers to exit once the queue is empty and join them.
    /// Idempotent.
    pub fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);
        // Take the queue lock before notifying so a worker between its
        // shutdown check and its wait cannot miss the wakeup.
        {
            let _queue = self.inner.queue.lock();
            self.inner.work_ready.notify_all();
        }
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decrements `active` and notifies drain waiters on drop, so the
/// bookkeeping survives a panicking job.
struct ActiveGuard<'a> {
    inner: &'a PoolInner,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        let prev_active = self.inner.active.fetch_sub(1, Ordering::Release);
        if prev_active == 1 && self.inner.queued.load(Ordering::Acquire) == 0 {
            let _queue = self.inner.queue.lock();
            self.inner.drain_cond.notify_all();
        }
    }
}

fn worker_loop(inner: &PoolInner) {
    // One epoch slot per worker, for the lifetime of the thread
    let participant = EpochParticipant::register(&inner.shared.epochs);

    loop {
        let job = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(job) = queue.pop_front() {
                    inner.queued.fetch_sub(1, Ordering::Release);
                    inner.active.fetch_add(1, Ordering::Release);
                    break job;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        let guard = ActiveGuard { inner };
        run_transaction(&inner.shared, &participant, job);
        drop(guard);
    }
}

fn run_transaction(shared: &SharedState, participant: &EpochParticipant, job: TransactionJob) {
    let mut tx = Transaction::begin(Arc::clone(&shared.index), participant, shared.protocol);

    let procedure = job.procedure;
    if std::panic::catch_unwind(AssertUnwindSafe(|| procedure(&mut tx))).is_err() {
        tracing::error!("transaction procedure panicked; aborting the transaction");
        tx.abort();
    }

    let committed = tx.precommit();
    if committed {
        if let Some(wal) = &shared.wal {
            let tid = tx
                .commit_tid()
                .expect("committed transaction carries an identifier");
            if let Err(e) = wal.lock().append(tid, tx.committed_writes()) {
                // The in-memory commit stands; only durability of this
                // record is lost if we crash before the next sync.
                tracing::error!(error = %e, "log append failed for committed transaction");
            }
        }
    }

    let status = tx.status();
    // Release the epoch pin before running user code again
    drop(tx);

    let callback = job.callback;
    if std::panic::catch_unwind(AssertUnwindSafe(|| callback(status))).is_err() {
        tracing::error!("status callback panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn test_pool(threads: usize, max_queued: usize) -> WorkerPool {
        let epochs = Arc::new(EpochFramework::new());
        WorkerPool::new(
            threads,
            max_queued,
            SharedState {
                index: Arc::new(PointIndex::new()),
                epochs,
                protocol: ConcurrencyControlKind::SiloNwr,
                wal: None,
            },
        )
    }

    fn job(
        procedure: impl FnOnce(&mut Transaction) + Send + 'static,
        callback: impl FnOnce(TxStatus) + Send + 'static,
    ) -> TransactionJob {
        TransactionJob {
            procedure: Box::new(procedure),
            callback: Box::new(callback),
        }
    }

    #[test]
    fn test_jobs_run_and_report_status() {
        let pool = test_pool(2, 64);
        let (sender, receiver) = mpsc::channel();

        for i in 0..10u64 {
            let sender = sender.clone();
            pool.submit(job(
                move |tx| tx.write(format!("k{}", i), i.to_le_bytes()),
                move |status| sender.send(status).unwrap(),
            ))
            .unwrap();
        }

        for _ in 0..10 {
            let status = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(status, TxStatus::Committed);
        }
        pool.drain();
    }

    #[test]
    fn test_user_abort_reported() {
        let pool = test_pool(1, 64);
        let (sender, receiver) = mpsc::channel();
        pool.submit(job(
            |tx| {
                tx.write("k", "v");
                tx.abort();
            },
            move |status| sender.send(status).unwrap(),
        ))
        .unwrap();
        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(5)).unwrap(),
            TxStatus::Aborted
        );
    }

    #[test]
    fn test_panicking_procedure_aborts_without_killing_worker() {
        let pool = test_pool(1, 64);
        let (sender, receiver) = mpsc::channel();

        let s = sender.clone();
        pool.submit(job(
            |_tx| panic!("intentional test panic"),
            move |status| s.send(status).unwrap(),
        ))
        .unwrap();
        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(5)).unwrap(),
            TxStatus::Aborted
        );

        // The single worker is still alive and runs the next job
        pool.submit(job(
            |tx| tx.write("after", "ok"),
            move |status| sender.send(status).unwrap(),
        ))
        .unwrap();
        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(5)).unwrap(),
            TxStatus::Committed
        );
    }

    #[test]
    fn test_drain_waits_for_inflight() {
        let pool = test_pool(2, 64);
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let done = Arc::clone(&done);
            pool.submit(job(
                |_tx| std::thread::sleep(Duration::from_millis(1)),
                move |_| {
                    done.fetch_add(1, Ordering::SeqCst);
                },
            ))
            .unwrap();
        }
        pool.drain();
        assert_eq!(done.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_submit_after_shutdown_rejected() {
        let pool = test_pool(1, 64);
        pool.shutdown();
        let result = pool.submit(job(|_| {}, |_| {}));
        assert!(matches!(result, Err(SiltError::ShuttingDown)));
    }

    #[test]
    fn test_queue_capacity_backpressure() {
        let pool = test_pool(1, 1);
        let (release_tx, release_rx) = mpsc::channel::<()>();

        // Occupy the single worker
        pool.submit(job(
            move |_tx| {
                release_rx.recv().ok();
            },
            |_| {},
        ))
        .unwrap();
        std::thread::sleep(Duration::from_millis(50));

        // One job fits in the queue, the next is rejected
        pool.submit(job(|_| {}, |_| {})).unwrap();
        let overflow = pool.submit(job(|_| {}, |_| {}));
        assert!(matches!(overflow, Err(SiltError::QueueFull)));

        release_tx.send(()).unwrap();
        pool.drain();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let pool = test_pool(2, 64);
        pool.submit(job(|_| {}, |_| {})).unwrap();
        pool.drain();
        pool.shutdown();
        pool.shutdown();
    }
}
