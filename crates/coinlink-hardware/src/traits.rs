//! Line, relay and observer interfaces.
//!
//! The pulse decoder and the slot gate are driven from dedicated OS threads,
//! so these traits are synchronous and blocking.

use crate::error::Result;
use crate::types::Level;

/// A digital input that can be sampled.
pub trait DigitalLine: Send {
    /// Sample the current level.
    fn read(&mut self) -> Result<Level>;

    /// Human-readable identifier for logs.
    fn name(&self) -> &str;
}

/// The relay gate in front of the coin acceptor.
pub trait Relay: Send {
    /// Energize (`true`) or release (`false`) every relay of the gate.
    fn set(&mut self, energized: bool) -> Result<()>;
}

/// Receives the "coin present" signal at the first falling edge of a train.
pub trait PulseObserver: Send + Sync {
    fn on_pulse_detected(&self);
}

impl<L: DigitalLine + ?Sized> DigitalLine for Box<L> {
    fn read(&mut self) -> Result<Level> {
        (**self).read()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<R: Relay + ?Sized> Relay for Box<R> {
    fn set(&mut self, energized: bool) -> Result<()> {
        (**self).set(energized)
    }
}
