//! Once-a-second housekeeping.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, Utc};
use coinlink_core::MacAddress;
use coinlink_core::constants::{BROADCAST_EVERY_TICKS, PERSIST_EVERY_TICKS, TICK_INTERVAL_MS};
use tracing::{error, info};

use crate::controller::AccessController;
use crate::notify::Notification;
use crate::scheduler::sleep_unless_stopped;
use crate::store::Update;

const RESTART_NOTICE: &str = "System is restarting for maintenance...";

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub expired: Vec<MacAddress>,
    pub persisted: usize,
    pub broadcast: bool,
    pub restarted: bool,
    pub slot_closed: Option<MacAddress>,
}

pub struct TimeManager {
    controller: Arc<AccessController>,
    ticks: u64,
    restart_latched: bool,
}

impl TimeManager {
    pub fn new(controller: Arc<AccessController>) -> Self {
        Self {
            controller,
            ticks: 0,
            restart_latched: false,
        }
    }

    /// Advance every connected session by one second.
    ///
    /// `wall` is the local wall-clock time used for the restart schedule.
    pub fn tick(&mut self, now: DateTime<Utc>, wall: NaiveTime) -> TickReport {
        self.ticks += 1;
        let mut report = TickReport {
            expired: self.count_down(),
            ..TickReport::default()
        };

        if self.ticks % PERSIST_EVERY_TICKS == 0 {
            report.persisted = self.controller.store().persist_connected();
        }
        if self.ticks % BROADCAST_EVERY_TICKS == 0 {
            self.controller.broadcast_sync();
            report.broadcast = true;
        }

        report.restarted = self.check_restart(wall);

        if let Some(mac) = self.controller.slot().release_expired(now) {
            self.controller
                .notifier()
                .send(&mac, Notification::SlotClosed);
            report.slot_closed = Some(mac);
        }
        report
    }

    fn count_down(&self) -> Vec<MacAddress> {
        let controller = &self.controller;
        let mut expired = Vec::new();

        for mac in controller.store().macs() {
            let snapshot = controller.store().update(&mac, |record| {
                if !record.tick() {
                    return Update::Transient(None);
                }
                controller.cut_off(&mac, record);
                Update::Persist(Some(controller.snapshot_of(&mac, record)))
            });
            if let Some(Some(snapshot)) = snapshot {
                info!(mac = %mac, "session expired");
                controller.notify_sync(&mac, &snapshot);
                expired.push(mac);
            }
        }
        expired
    }

    /// Fire the scheduled restart once per matching minute.
    fn check_restart(&mut self, wall: NaiveTime) -> bool {
        let schedule = self.controller.settings().restart_schedule;
        if !schedule.matches(wall) {
            self.restart_latched = false;
            return false;
        }
        if self.restart_latched {
            return false;
        }
        self.restart_latched = true;
        info!(time = %schedule.time, "scheduled restart");
        if let Err(e) = self.controller.restart(RESTART_NOTICE) {
            error!(error = %e, "scheduled restart failed");
        }
        true
    }

    /// Tick once per second until `shutdown` is set.
    pub fn run(mut self, shutdown: Arc<AtomicBool>) {
        info!("time manager running");
        let interval = Duration::from_millis(TICK_INTERVAL_MS);
        while sleep_unless_stopped(&shutdown, interval) {
            self.tick(Utc::now(), Local::now().time());
        }
        info!("time manager stopped");
    }
}
