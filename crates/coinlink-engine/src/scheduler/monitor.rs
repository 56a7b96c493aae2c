//! Idle detection and auto-pause.
//!
//! Counters are read from the packet filter outside any record lock; only
//! the comparison and the resulting transition run under it. A record with no
//! baseline (just connected, or restarted) only records one and is judged on
//! the next poll.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::{DateTime, Utc};
use coinlink_core::{MacAddress, SessionRecord, SessionStatus, Settings, TrafficCounters};
use tracing::{debug, info};

use crate::controller::AccessController;
use crate::scheduler::sleep_unless_stopped;
use crate::store::Update;

/// How one observation was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Baseline,
    Active,
    Idle,
    /// Idle past the timeout; the session was paused.
    Paused,
    /// No longer connected when the lock was taken.
    Skipped,
}

pub struct ConnectivityMonitor {
    controller: Arc<AccessController>,
}

impl ConnectivityMonitor {
    pub fn new(controller: Arc<AccessController>) -> Self {
        Self { controller }
    }

    /// Judge every connected device once. Returns the devices paused.
    pub fn poll(&self, now: DateTime<Utc>) -> Vec<MacAddress> {
        let settings = self.controller.settings();
        if !settings.auto_pause_enabled {
            return Vec::new();
        }

        let mut paused = Vec::new();
        for (mac, _) in self.controller.store().connected() {
            let counters = self.controller.enforcer().query_traffic(&mac);
            if self.observe(&mac, counters, now, &settings) == Activity::Paused {
                paused.push(mac);
            }
        }
        paused
    }

    /// Apply one counter reading to a device.
    pub fn observe(
        &self,
        mac: &MacAddress,
        counters: TrafficCounters,
        now: DateTime<Utc>,
        settings: &Settings,
    ) -> Activity {
        let controller = &self.controller;
        let verdict = controller.store().update(mac, |record| {
            let activity = judge(record, counters, now, settings);
            if activity != Activity::Idle || !idle_too_long(record, now, settings) {
                return Update::Transient((activity, None));
            }
            if record.transition_to(SessionStatus::Paused).is_err() {
                return Update::Transient((Activity::Skipped, None));
            }
            controller.cut_off(mac, record);
            info!(mac = %mac, idle_secs = (now - record.last_active).num_seconds(), "auto-paused idle session");
            Update::Persist((Activity::Paused, Some(controller.snapshot_of(mac, record))))
        });

        match verdict {
            Some((activity, snapshot)) => {
                if let Some(snapshot) = snapshot {
                    controller.notify_sync(mac, &snapshot);
                }
                activity
            }
            None => Activity::Skipped,
        }
    }

    /// Poll every `monitor_interval` seconds until `shutdown` is set.
    pub fn run(self, shutdown: Arc<AtomicBool>) {
        info!("connectivity monitor running");
        loop {
            let interval = Duration::from_secs(self.controller.settings().monitor_interval.max(1));
            if !sleep_unless_stopped(&shutdown, interval) {
                break;
            }
            let paused = self.poll(Utc::now());
            if !paused.is_empty() {
                debug!(count = paused.len(), "idle sessions paused");
            }
        }
        info!("connectivity monitor stopped");
    }
}

/// Compare against the baseline and move it forward.
fn judge(
    record: &mut SessionRecord,
    counters: TrafficCounters,
    now: DateTime<Utc>,
    settings: &Settings,
) -> Activity {
    if !record.status.is_connected() {
        return Activity::Skipped;
    }
    let Some(previous) = record.last_traffic.replace(counters) else {
        return Activity::Baseline;
    };
    let delta = counters.delta_since(&previous);
    if delta.bytes > settings.inactive_bytes_threshold
        || delta.packets > settings.inactive_packet_threshold
    {
        record.last_active = now;
        Activity::Active
    } else {
        Activity::Idle
    }
}

fn idle_too_long(record: &SessionRecord, now: DateTime<Utc>, settings: &Settings) -> bool {
    let idle = (now - record.last_active).num_seconds();
    idle > i64::try_from(settings.inactive_timeout).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn connected(now: DateTime<Utc>) -> SessionRecord {
        let mut record = SessionRecord::new(now);
        record.time_remaining = 600;
        record.connect(now).unwrap();
        record
    }

    #[test]
    fn test_first_reading_is_baseline() {
        let now = Utc::now();
        let mut record = connected(now);
        let activity = judge(&mut record, TrafficCounters::new(1_000_000, 5000), now, &Settings::default());
        assert_eq!(activity, Activity::Baseline);
        assert_eq!(record.last_traffic, Some(TrafficCounters::new(1_000_000, 5000)));
    }

    #[test]
    fn test_thresholds_are_exclusive() {
        let now = Utc::now();
        let settings = Settings::default();
        let mut record = connected(now - ChronoDuration::seconds(30));
        record.last_traffic = Some(TrafficCounters::new(0, 0));

        let at_threshold = TrafficCounters::new(
            settings.inactive_bytes_threshold,
            settings.inactive_packet_threshold,
        );
        assert_eq!(judge(&mut record, at_threshold, now, &settings), Activity::Idle);

        let above = TrafficCounters::new(at_threshold.bytes * 2 + 1, at_threshold.packets);
        assert_eq!(judge(&mut record, above, now, &settings), Activity::Active);
        assert_eq!(record.last_active, now);
    }

    #[test]
    fn test_counter_reset_reads_as_idle() {
        let now = Utc::now();
        let mut record = connected(now);
        record.last_traffic = Some(TrafficCounters::new(50_000, 400));
        assert_eq!(
            judge(&mut record, TrafficCounters::new(10, 1), now, &Settings::default()),
            Activity::Idle
        );
    }

    #[test]
    fn test_idle_timeout_is_strict() {
        let now = Utc::now();
        let settings = Settings::default();
        let timeout = ChronoDuration::seconds(settings.inactive_timeout as i64);

        let record = connected(now - timeout);
        assert!(!idle_too_long(&record, now, &settings));
        assert!(idle_too_long(&record, now + ChronoDuration::seconds(1), &settings));
    }
}
