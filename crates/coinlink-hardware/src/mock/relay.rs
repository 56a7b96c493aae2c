//! Mock relay gate.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{HardwareError, Result};
use crate::traits::Relay;

/// Relay that records every switch instead of driving a pin.
///
/// Tests keep the [`RelayLog`] handle to inspect the recorded states after
/// the relay has been moved into the component under test.
#[derive(Debug)]
pub struct RecordingRelay {
    log: RelayLog,
}

/// Shared view of a [`RecordingRelay`]'s history.
#[derive(Debug, Clone, Default)]
pub struct RelayLog {
    states: Arc<Mutex<Vec<bool>>>,
    failing: Arc<Mutex<bool>>,
}

impl RecordingRelay {
    pub fn new() -> (Self, RelayLog) {
        let log = RelayLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl Relay for RecordingRelay {
    fn set(&mut self, energized: bool) -> Result<()> {
        if *self.log.failing.lock() {
            return Err(HardwareError::command_failed("mock", "simulated relay fault"));
        }
        self.log.states.lock().push(energized);
        Ok(())
    }
}

impl RelayLog {
    /// Every state written so far, oldest first.
    pub fn states(&self) -> Vec<bool> {
        self.states.lock().clone()
    }

    /// Last written state; a relay never written is released.
    pub fn is_energized(&self) -> bool {
        self.states.lock().last().copied().unwrap_or(false)
    }

    /// Make subsequent writes fail.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }
}
