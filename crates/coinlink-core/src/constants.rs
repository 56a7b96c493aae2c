//! Core constants for the coin-operated access controller.
//!
//! Defaults in this module seed [`Settings`](crate::Settings) and the
//! scheduler cadences. Values persisted by an operator always win over these;
//! the constants only apply when a key is missing or malformed.
//!
//! # Usage
//!
//! ```
//! use coinlink_core::constants::*;
//! use std::time::Duration;
//!
//! let silence = Duration::from_millis(PULSE_SILENCE_WINDOW_MS);
//! assert_eq!(silence.as_millis(), 600);
//! assert_eq!(DEFAULT_COIN_RATES, "1:10,5:60,10:180,20:300");
//! ```

// ============================================================================
// Coin Slot
// ============================================================================

/// Seconds a device keeps the coin slot before it auto-closes.
///
/// Every credited coin pushes the expiry forward by this amount again.
pub const DEFAULT_SLOT_TIMEOUT_SECS: u64 = 30;

/// Currency units represented by a single pulse of the coin acceptor.
pub const DEFAULT_PULSE_VALUE: u64 = 1;

// ============================================================================
// Pulse Decoding
// ============================================================================

/// Sampling interval of the coin line in milliseconds.
pub const PULSE_SAMPLE_INTERVAL_MS: u64 = 10;

/// Silence after the last falling edge that terminates a pulse train.
///
/// Coin acceptors emit pulses 20-100 ms apart; 600 ms of quiet reliably
/// separates two coins inserted back to back.
pub const PULSE_SILENCE_WINDOW_MS: u64 = 600;

// ============================================================================
// Rates
// ============================================================================

/// Default coin rate table (`denomination:minutes`, comma separated).
pub const DEFAULT_COIN_RATES: &str = "1:10,5:60,10:180,20:300";

/// Minutes granted per currency unit left over after greedy conversion.
pub const FALLBACK_MINUTES_PER_UNIT: u64 = 5;

/// Single tier used when the configured rate table cannot be parsed.
pub const DEFAULT_RATE_TIER: (u64, u64) = (1, 5);

// ============================================================================
// Idle Detection
// ============================================================================

/// Seconds without measurable traffic before a connected device is paused.
pub const DEFAULT_INACTIVE_TIMEOUT_SECS: u64 = 60;

/// Packet delta per poll above which a device counts as active.
pub const DEFAULT_INACTIVE_PACKET_THRESHOLD: u64 = 100;

/// Byte delta per poll above which a device counts as active.
pub const DEFAULT_INACTIVE_BYTES_THRESHOLD: u64 = 500;

/// Seconds between two connectivity polls.
pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 5;

// ============================================================================
// Traffic Shaping
// ============================================================================

/// Default per-device bandwidth cap in megabits per second.
pub const DEFAULT_SPEED_LIMIT_MBIT: u32 = 5;

// ============================================================================
// Time Manager
// ============================================================================

/// Length of one scheduler tick in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 1000;

/// Ticks between two full resyncs of connected sessions to persistence.
pub const PERSIST_EVERY_TICKS: u64 = 30;

/// Ticks between two status broadcasts to devices.
pub const BROADCAST_EVERY_TICKS: u64 = 5;

/// Default wall-clock time (`HH:MM`) of the scheduled restart.
pub const DEFAULT_RESTART_TIME: &str = "03:00";

/// Seconds between the restart notice and the restart itself.
pub const RESTART_GRACE_SECS: u64 = 3;

// ============================================================================
// Free Time
// ============================================================================

/// Minutes granted by the one-time free-time entitlement.
pub const DEFAULT_FREE_TIME_MINUTES: u64 = 5;
