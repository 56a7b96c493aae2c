//! Host-level actions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use coinlink_core::{CommandOutcome, CommandRunner, Error, Result};
use tracing::{error, warn};

/// Restart the whole kiosk.
pub trait SystemControl: Send + Sync {
    fn restart(&self) -> Result<()>;
}

/// Reboots the host with `reboot`.
pub struct RebootCommand {
    runner: Arc<dyn CommandRunner>,
}

impl RebootCommand {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl SystemControl for RebootCommand {
    fn restart(&self) -> Result<()> {
        warn!("rebooting host");
        match self.runner.run("reboot", &[]) {
            CommandOutcome::Success { .. } => Ok(()),
            CommandOutcome::Failed { code, stderr } => {
                error!(?code, stderr = %stderr.trim(), "reboot refused");
                Err(Error::Config(format!("reboot failed: {}", stderr.trim())))
            }
            CommandOutcome::Absent => Err(Error::Config("reboot command not found".to_string())),
        }
    }
}

/// Counts restart requests instead of acting on them.
#[derive(Debug, Default)]
pub struct RecordingSystem {
    restarts: AtomicUsize,
}

impl RecordingSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl SystemControl for RecordingSystem {
    fn restart(&self) -> Result<()> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
