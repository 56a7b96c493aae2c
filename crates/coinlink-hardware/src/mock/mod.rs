//! Simulated lines and relays for tests and bench setups without GPIO.

pub mod line;
pub mod relay;

pub use line::{FailingLine, ScriptedLine, StaticLine};
pub use relay::{RecordingRelay, RelayLog};
