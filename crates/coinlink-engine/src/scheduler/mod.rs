//! Background workers.
//!
//! Each scheduler runs on its own named OS thread and blocks only on its own
//! sleep or on the coin line. All of them watch one shared shutdown flag.

pub mod coin;
pub mod monitor;
pub mod time;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info};

pub use coin::CoinListener;
pub use monitor::ConnectivityMonitor;
pub use time::{TickReport, TimeManager};

const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Sleep for `duration`, waking early if `shutdown` is set.
///
/// Returns `false` if shutdown was requested.
pub fn sleep_unless_stopped(shutdown: &AtomicBool, duration: Duration) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if shutdown.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(SLEEP_SLICE.min(deadline - now));
    }
}

/// Handles of the running worker threads.
pub struct Workers {
    shutdown: Arc<AtomicBool>,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl Workers {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }

    /// Flag shared with every worker.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Start `body` on a named thread. It receives the shutdown flag.
    ///
    /// # Errors
    /// Returns the error from the OS if the thread cannot be created.
    pub fn spawn<F>(&mut self, name: &str, body: F) -> io::Result<()>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || body(shutdown))?;
        info!(worker = name, "worker started");
        self.handles.push((name.to_string(), handle));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signal shutdown and wait for every worker.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for (name, handle) in self.handles {
            match handle.join() {
                Ok(()) => info!(worker = %name, "worker stopped"),
                Err(_) => error!(worker = %name, "worker panicked"),
            }
        }
    }
}

impl Default for Workers {
    fn default() -> Self {
        Self::new()
    }
}
