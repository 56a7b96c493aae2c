//! Per-device session record and its state transitions.
//!
//! [`SessionRecord`] holds the accounting fields of one device; every status
//! change goes through [`SessionRecord::transition_to`], which enforces the
//! [`SessionStatus`] transition table. Locking and persistence are the
//! caller's concern (see the engine's session store).

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversion::{PointMap, RateTable, points_from_balance, time_from_balance};
use crate::types::{MacAddress, SessionStatus, TrafficCounters};
use crate::{Result, error::Error};

/// Session state of one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Last observed address. Advisory, may be stale.
    pub ip: Option<Ipv4Addr>,
    /// Seconds of granted access.
    pub time_remaining: u64,
    pub status: SessionStatus,
    /// Credited currency not yet converted.
    pub balance: u64,
    pub free_claimed: bool,
    pub points: f64,
    pub last_active: DateTime<Utc>,
    /// Traffic baseline for idle detection; `None` until first observed.
    #[serde(skip)]
    pub last_traffic: Option<TrafficCounters>,
}

/// What a balance settlement produced.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Settlement {
    pub minutes: u64,
    pub points: f64,
}

impl SessionRecord {
    /// Fresh record for a device seen for the first time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            ip: None,
            time_remaining: 0,
            status: SessionStatus::New,
            balance: 0,
            free_claimed: false,
            points: 0.0,
            last_active: now,
            last_traffic: None,
        }
    }

    /// Move to `target`, returning the previous status.
    ///
    /// # Errors
    /// Returns `Error::InvalidStateTransition` if the edge is not allowed.
    pub fn transition_to(&mut self, target: SessionStatus) -> Result<SessionStatus> {
        if !self.status.can_transition_to(target) {
            return Err(Error::InvalidStateTransition {
                from: self.status,
                to: target,
            });
        }
        let previous = self.status;
        self.status = target;
        if target == SessionStatus::Connected {
            self.last_traffic = None;
        }
        Ok(previous)
    }

    /// Enter `connected`, marking the device active at `now`.
    ///
    /// # Errors
    /// Fails when there is no time left or the current status cannot connect.
    pub fn connect(&mut self, now: DateTime<Utc>) -> Result<SessionStatus> {
        if self.time_remaining == 0 {
            return Err(Error::InvalidStateTransition {
                from: self.status,
                to: SessionStatus::Connected,
            });
        }
        let previous = self.transition_to(SessionStatus::Connected)?;
        self.last_active = now;
        Ok(previous)
    }

    /// Convert the pending balance into time and points, zeroing it.
    pub fn settle_balance(
        &mut self,
        rates: &RateTable,
        point_map: &PointMap,
        points_enabled: bool,
    ) -> Settlement {
        if self.balance == 0 {
            return Settlement::default();
        }
        let minutes = time_from_balance(self.balance, rates);
        let points = points_from_balance(self.balance, point_map, points_enabled);

        self.add_minutes(minutes);
        self.points += points;
        self.balance = 0;

        Settlement { minutes, points }
    }

    pub fn add_minutes(&mut self, minutes: u64) {
        self.time_remaining = self
            .time_remaining
            .saturating_add(minutes.saturating_mul(60));
    }

    /// Add or remove seconds, saturating at zero. Returns the new value.
    pub fn adjust_time(&mut self, delta_seconds: i64) -> u64 {
        self.time_remaining = if delta_seconds >= 0 {
            self.time_remaining.saturating_add(delta_seconds.unsigned_abs())
        } else {
            self.time_remaining
                .saturating_sub(delta_seconds.unsigned_abs())
        };
        self.time_remaining
    }

    /// Consume one second of a connected session.
    ///
    /// Returns `true` when this tick exhausted the remaining time and the
    /// record moved to `expired`.
    pub fn tick(&mut self) -> bool {
        if !self.status.is_connected() || self.time_remaining == 0 {
            return false;
        }
        self.time_remaining -= 1;
        if self.time_remaining == 0 {
            self.status = SessionStatus::Expired;
            return true;
        }
        false
    }

    /// Read-only view for callers outside the store.
    pub fn snapshot(&self, mac: MacAddress, is_busy: bool, slot_seconds: u64) -> SessionSnapshot {
        SessionSnapshot {
            mac,
            ip: self.ip,
            time_remaining: self.time_remaining,
            status: self.status,
            balance: self.balance,
            points: self.points,
            free_claimed: self.free_claimed,
            is_busy,
            slot_seconds,
        }
    }
}

/// Read-only session view returned by controller operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub mac: MacAddress,
    pub ip: Option<Ipv4Addr>,
    pub time_remaining: u64,
    pub status: SessionStatus,
    pub balance: u64,
    pub points: f64,
    pub free_claimed: bool,
    /// Another device currently holds the coin slot.
    pub is_busy: bool,
    /// Seconds left on this device's slot hold.
    pub slot_seconds: u64,
}
