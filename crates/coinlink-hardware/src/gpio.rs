//! Lines and relays driven through the `gpio` command-line utility.

use std::sync::Arc;

use coinlink_core::process::args;
use coinlink_core::{CommandOutcome, CommandRunner};
use tracing::{debug, info, warn};

use crate::error::{HardwareError, Result};
use crate::traits::{DigitalLine, Relay};
use crate::types::Level;

const GPIO: &str = "gpio";

fn gpio(runner: &dyn CommandRunner, pin: &str, parts: &[&str]) -> Result<String> {
    match runner.run(GPIO, &args(parts.iter().copied())) {
        CommandOutcome::Success { stdout } => Ok(stdout),
        CommandOutcome::Failed { code, stderr } => Err(HardwareError::command_failed(
            pin,
            format!("exit {code:?}: {}", stderr.trim()),
        )),
        CommandOutcome::Absent => Err(HardwareError::tool_unavailable(GPIO)),
    }
}

/// Coin acceptor input configured as pulled-up input.
pub struct GpioLine {
    runner: Arc<dyn CommandRunner>,
    pin: String,
}

impl GpioLine {
    pub fn new(runner: Arc<dyn CommandRunner>, pin: impl Into<String>) -> Self {
        Self {
            runner,
            pin: pin.into(),
        }
    }

    /// Put the pin into input mode with the pull-up enabled.
    pub fn setup(&self) -> Result<()> {
        gpio(self.runner.as_ref(), &self.pin, &["mode", &self.pin, "in"])?;
        gpio(self.runner.as_ref(), &self.pin, &["mode", &self.pin, "up"])?;
        info!(pin = %self.pin, "coin line ready");
        Ok(())
    }
}

impl DigitalLine for GpioLine {
    fn read(&mut self) -> Result<Level> {
        let stdout = gpio(self.runner.as_ref(), &self.pin, &["read", &self.pin])?;
        Level::from_reading(&stdout)
    }

    fn name(&self) -> &str {
        &self.pin
    }
}

/// Every relay of the slot gate, switched together.
pub struct GpioRelayBank {
    runner: Arc<dyn CommandRunner>,
    pins: Vec<String>,
}

impl GpioRelayBank {
    pub fn new(runner: Arc<dyn CommandRunner>, pins: Vec<String>) -> Self {
        Self { runner, pins }
    }

    /// Configure every pin as output and release the gate.
    pub fn setup(&mut self) -> Result<()> {
        for pin in &self.pins {
            gpio(self.runner.as_ref(), pin, &["mode", pin, "out"])?;
        }
        self.set(false)?;
        info!(pins = ?self.pins, "relay bank ready");
        Ok(())
    }
}

impl Relay for GpioRelayBank {
    /// Write every pin; one failing pin does not stop the others.
    fn set(&mut self, energized: bool) -> Result<()> {
        let value = if energized { "1" } else { "0" };
        let mut first_error = None;

        for pin in &self.pins {
            if let Err(e) = gpio(self.runner.as_ref(), pin, &["write", pin, value]) {
                warn!(pin = %pin, error = %e, "relay write failed");
                first_error.get_or_insert(e);
            }
        }

        debug!(energized, "relay bank switched");
        first_error.map_or(Ok(()), Err)
    }
}
