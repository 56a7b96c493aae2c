//! GPIO abstraction for the coin acceptor and its slot gate.
//!
//! The kiosk wires two things to the board: the coin acceptor's signal line
//! (an input idling high, pulled low once per currency unit) and one or more
//! relays that open the hatch in front of the acceptor.
//!
//! # Components
//!
//! - [`DigitalLine`] / [`Relay`]: blocking, thread-safe device interfaces.
//! - [`gpio`]: implementations driving the `gpio` command-line utility
//!   through a [`CommandRunner`](coinlink_core::CommandRunner).
//! - [`PulseDecoder`]: turns the coin line into pulse counts.
//! - [`mock`]: scripted lines and a recording relay for tests.
//!
//! # Example
//!
//! ```
//! use coinlink_hardware::PulseDecoder;
//! use coinlink_hardware::mock::ScriptedLine;
//! use std::time::Duration;
//!
//! let line = ScriptedLine::pulse_train(&[0, 10], 3, 2);
//! let mut decoder = PulseDecoder::new(line)
//!     .with_sample_interval(Duration::from_millis(1))
//!     .with_silence_window(Duration::from_millis(100));
//! assert_eq!(decoder.await_pulse_train(None), 2);
//! ```

pub mod error;
pub mod gpio;
pub mod mock;
pub mod pulse;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use gpio::{GpioLine, GpioRelayBank};
pub use pulse::PulseDecoder;
pub use traits::{DigitalLine, PulseObserver, Relay};
pub use types::Level;
