//! Single-holder arbitration of the coin slot.
//!
//! Holder and expiry live behind one mutex together with the relay gate, so
//! "free or mine, then claim" is a single compare-and-set and the gate can
//! never disagree with the holder.

use chrono::{DateTime, Duration, Utc};
use coinlink_core::MacAddress;
use coinlink_hardware::Relay;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

struct SlotState {
    holder: Option<MacAddress>,
    expires_at: DateTime<Utc>,
    gate: Box<dyn Relay>,
}

impl SlotState {
    fn set_gate(&mut self, energized: bool) {
        if let Err(e) = self.gate.set(energized) {
            warn!(energized, error = %e, "slot gate did not switch");
        }
    }

    fn release(&mut self) -> Option<MacAddress> {
        let previous = self.holder.take();
        if previous.is_some() {
            self.set_gate(false);
        }
        previous
    }
}

/// Why an acquisition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotBusy {
    pub holder: MacAddress,
}

pub struct SlotArbiter {
    state: Mutex<SlotState>,
}

impl SlotArbiter {
    pub fn new(gate: Box<dyn Relay>) -> Self {
        Self {
            state: Mutex::new(SlotState {
                holder: None,
                expires_at: DateTime::<Utc>::MIN_UTC,
                gate,
            }),
        }
    }

    /// Claim the slot for `mac` if it is free or already held by `mac`.
    ///
    /// On success the expiry is (re)set to `now + timeout` and the gate is
    /// energized.
    pub fn try_acquire(
        &self,
        mac: &MacAddress,
        now: DateTime<Utc>,
        timeout_secs: u64,
    ) -> Result<DateTime<Utc>, SlotBusy> {
        let mut state = self.state.lock();
        match state.holder {
            Some(holder) if holder != *mac => Err(SlotBusy { holder }),
            _ => {
                state.holder = Some(*mac);
                state.expires_at = expiry(now, timeout_secs);
                state.set_gate(true);
                info!(mac = %mac, timeout_secs, "slot opened");
                Ok(state.expires_at)
            }
        }
    }

    /// Push the expiry forward if `mac` still holds the slot.
    pub fn refresh(&self, mac: &MacAddress, now: DateTime<Utc>, timeout_secs: u64) -> bool {
        let mut state = self.state.lock();
        if state.holder != Some(*mac) {
            return false;
        }
        state.expires_at = expiry(now, timeout_secs);
        true
    }

    /// Release the slot if `mac` holds it.
    pub fn release_if_held(&self, mac: &MacAddress) -> bool {
        let mut state = self.state.lock();
        if state.holder != Some(*mac) {
            return false;
        }
        state.release();
        debug!(mac = %mac, "slot released");
        true
    }

    /// Release unconditionally, returning the previous holder.
    pub fn release(&self) -> Option<MacAddress> {
        self.state.lock().release()
    }

    /// Release the slot if its hold ran out at `now`.
    pub fn release_expired(&self, now: DateTime<Utc>) -> Option<MacAddress> {
        let mut state = self.state.lock();
        if state.holder.is_none() || now < state.expires_at {
            return None;
        }
        let previous = state.release();
        if let Some(mac) = previous {
            info!(mac = %mac, "slot hold expired");
        }
        previous
    }

    pub fn holder(&self) -> Option<MacAddress> {
        self.state.lock().holder
    }

    /// Another device holds the slot.
    pub fn is_busy_for(&self, mac: &MacAddress) -> bool {
        matches!(self.state.lock().holder, Some(holder) if holder != *mac)
    }

    /// Seconds left on `mac`'s hold; 0 if it does not hold the slot.
    pub fn seconds_left(&self, mac: &MacAddress, now: DateTime<Utc>) -> u64 {
        let state = self.state.lock();
        if state.holder != Some(*mac) {
            return 0;
        }
        u64::try_from((state.expires_at - now).num_seconds()).unwrap_or(0)
    }
}

/// `now + timeout`, saturating at the latest representable instant.
fn expiry(now: DateTime<Utc>, timeout_secs: u64) -> DateTime<Utc> {
    i64::try_from(timeout_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|timeout| now.checked_add_signed(timeout))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinlink_hardware::mock::RecordingRelay;
    use rstest::rstest;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn mac(last: u8) -> MacAddress {
        MacAddress::from_octets([2, 0, 0, 0, 0, last])
    }

    fn arbiter() -> (SlotArbiter, coinlink_hardware::mock::RelayLog) {
        let (relay, log) = RecordingRelay::new();
        (SlotArbiter::new(Box::new(relay)), log)
    }

    #[test]
    fn test_acquire_is_exclusive() {
        let (slot, log) = arbiter();
        let now = Utc::now();

        assert!(slot.try_acquire(&mac(1), now, 30).is_ok());
        assert_eq!(slot.try_acquire(&mac(2), now, 30), Err(SlotBusy { holder: mac(1) }));
        assert!(slot.try_acquire(&mac(1), now, 30).is_ok());
        assert!(slot.is_busy_for(&mac(2)));
        assert!(!slot.is_busy_for(&mac(1)));
        assert!(log.is_energized());
    }

    #[test]
    fn test_release_only_by_holder() {
        let (slot, log) = arbiter();
        slot.try_acquire(&mac(1), Utc::now(), 30).unwrap();

        assert!(!slot.release_if_held(&mac(2)));
        assert!(slot.release_if_held(&mac(1)));
        assert_eq!(slot.holder(), None);
        assert!(!log.is_energized());
    }

    #[test]
    fn test_expiry_and_refresh() {
        let (slot, _log) = arbiter();
        let now = Utc::now();
        slot.try_acquire(&mac(1), now, 30).unwrap();
        assert_eq!(slot.seconds_left(&mac(1), now), 30);

        assert_eq!(slot.release_expired(now + Duration::seconds(29)), None);
        assert!(slot.refresh(&mac(1), now + Duration::seconds(29), 30));
        assert_eq!(slot.release_expired(now + Duration::seconds(31)), None);
        assert_eq!(slot.release_expired(now + Duration::seconds(59)), Some(mac(1)));
        assert_eq!(slot.seconds_left(&mac(1), now), 0);
    }

    #[test]
    fn test_concurrent_claims_have_one_winner() {
        let (slot, _log) = arbiter();
        let slot = Arc::new(slot);
        let barrier = Arc::new(Barrier::new(8));
        let now = Utc::now();

        let handles: Vec<_> = (0..8u8)
            .map(|i| {
                let slot = slot.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    slot.try_acquire(&mac(i), now, 30).is_ok()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }

    #[rstest]
    #[case(u64::MAX)]
    #[case(i64::MAX as u64)]
    #[case(i64::MAX as u64 / 1000)]
    fn test_huge_timeout_saturates(#[case] timeout: u64) {
        let (slot, _log) = arbiter();
        let now = Utc::now();

        assert_eq!(slot.try_acquire(&mac(1), now, timeout), Ok(DateTime::<Utc>::MAX_UTC));
        assert!(slot.refresh(&mac(1), now, timeout));
        assert!(slot.seconds_left(&mac(1), now) > 0);
        assert_eq!(slot.release_expired(now + Duration::days(365)), None);
    }

    #[test]
    fn test_gate_failure_does_not_block_arbitration() {
        let (slot, log) = arbiter();
        log.set_failing(true);
        assert!(slot.try_acquire(&mac(1), Utc::now(), 30).is_ok());
        assert_eq!(slot.holder(), Some(mac(1)));
    }
}
