//! Network enforcement for paid sessions.
//!
//! Translates "this device may / may not use the uplink" into packet-filter
//! directives keyed by hardware address, per-address traffic shaping on the
//! LAN interface, and connection-tracking flushes so a blocked device loses
//! its open flows immediately.
//!
//! All external programs are invoked through a
//! [`CommandRunner`](coinlink_core::CommandRunner); [`mock::SimulatedNetfilter`]
//! stands in for the kernel in tests.

pub mod arp;
pub mod config;
pub mod directive;
pub mod enforcer;
pub mod error;
pub mod mock;
pub mod shaping;

pub use config::{EnforcerConfig, ShapingPolicy};
pub use enforcer::Enforcer;
pub use error::{NetworkError, Result};
pub use shaping::ClassId;
