//! Background epoch advancement
//!
//! A single background thread steps the global epoch at a configured
//! cadence, runs buffer reclamation after each successful step, and invokes
//! an observer hook with the new epoch (the engine uses the hook to
//! group-sync the write-ahead log once per epoch).

use crate::framework::EpochFramework;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

struct Shutdown {
    requested: Mutex<bool>,
    signal: Condvar,
}

/// Owns the `silt-epoch-advancer` thread.
///
/// The thread is joined on [`shutdown`] or drop.
///
/// [`shutdown`]: EpochAdvancer::shutdown
pub struct EpochAdvancer {
    shutdown: Arc<Shutdown>,
    handle: Option<JoinHandle<()>>,
}

impl EpochAdvancer {
    /// Spawn the advancer over `framework`, stepping every `interval`.
    ///
    /// `on_advance` runs on the advancer thread after each step that
    /// actually moved the counter, with the new global epoch.
    pub fn spawn(
        framework: Arc<EpochFramework>,
        interval: Duration,
        mut on_advance: impl FnMut(u64) + Send + 'static,
    ) -> Self {
        let shutdown = Arc::new(Shutdown {
            requested: Mutex::new(false),
            signal: Condvar::new(),
        });
        let shutdown_flag = Arc::clone(&shutdown);

        let handle = std::thread::Builder::new()
            .name("silt-epoch-advancer".to_string())
            .spawn(move || {
                loop {
                    {
                        let mut requested = shutdown_flag.requested.lock();
                        if *requested {
                            break;
                        }
                        shutdown_flag.signal.wait_for(&mut requested, interval);
                        if *requested {
                            break;
                        }
                    }
                    let before = framework.global();
                    let after = framework.advance();
                    if after > before {
                        let released = framework.collect();
                        if released > 0 {
                            tracing::trace!(epoch = after, released, "reclaimed retired buffers");
                        }
                        on_advance(after);
                    }
                }
            })
            .expect("failed to spawn epoch advancer thread");

        EpochAdvancer {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signal the advancer thread to exit and join it. Idempotent.
    pub fn shutdown(&mut self) {
        {
            let mut requested = self.shutdown.requested.lock();
            *requested = true;
            self.shutdown.signal.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EpochAdvancer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
