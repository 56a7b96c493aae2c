//! Session engine for the coin-operated access controller.
//!
//! Ties the session table, the coin slot, network enforcement and the
//! background schedulers together.
//!
//! # Components
//!
//! - [`SessionStore`]: per-device records, one lock each, written through to
//!   [`Persistence`](coinlink_core::Persistence).
//! - [`SlotArbiter`]: single-holder coin slot with its relay gate.
//! - [`AccessController`]: every device and admin operation.
//! - [`notify`]: non-blocking notifications from worker threads to the
//!   async runtime.
//! - [`scheduler`]: coin listener, time manager and connectivity monitor.

pub mod controller;
pub mod notify;
pub mod scheduler;
pub mod slot;
pub mod store;
pub mod system;

pub use controller::{
    AccessController, Collaborators, CreditOutcome, Outcome, PeriodStarts, ResultTag, SalesReport,
    period_starts,
};
pub use notify::{
    ChannelNotifier, Notification, NotificationHub, Notifier, RecordingNotifier, Subscriptions,
};
pub use scheduler::{CoinListener, ConnectivityMonitor, TickReport, TimeManager, Workers};
pub use slot::{SlotArbiter, SlotBusy};
pub use store::{SessionStore, Update};
pub use system::{RebootCommand, RecordingSystem, SystemControl};
