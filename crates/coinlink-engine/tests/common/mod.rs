//! Controller wired to in-memory collaborators and a simulated kernel.

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use coinlink_core::{MacAddress, SessionRecord, SessionStatus, Settings};
use coinlink_engine::{AccessController, Collaborators, Notification, RecordingNotifier, RecordingSystem};
use coinlink_hardware::mock::{RecordingRelay, RelayLog};
use coinlink_network::mock::SimulatedNetfilter;
use coinlink_network::{Enforcer, EnforcerConfig};
use coinlink_storage::{MemoryPersistence, MemorySettingsStore};

pub struct Harness {
    pub controller: Arc<AccessController>,
    pub netfilter: Arc<SimulatedNetfilter>,
    pub persistence: Arc<MemoryPersistence>,
    pub settings_store: Arc<MemorySettingsStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub system: Arc<RecordingSystem>,
    pub gate: RelayLog,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(Settings::default(), Vec::new())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self::build(settings, Vec::new())
    }

    pub fn with_sessions(sessions: Vec<(MacAddress, SessionRecord)>) -> Self {
        Self::build(Settings::default(), sessions)
    }

    pub fn build(settings: Settings, sessions: Vec<(MacAddress, SessionRecord)>) -> Self {
        let netfilter = Arc::new(SimulatedNetfilter::new());
        let config = EnforcerConfig::default().with_arp_table("/nonexistent/arp");
        let enforcer = Arc::new(Enforcer::new(netfilter.clone(), config));
        enforcer.initialize().unwrap();

        let persistence = Arc::new(MemoryPersistence::with_sessions(sessions));
        let settings_store = Arc::new(MemorySettingsStore::with_settings(settings));
        let notifier = Arc::new(RecordingNotifier::new());
        let system = Arc::new(RecordingSystem::new());
        let (relay, gate) = RecordingRelay::new();

        let controller = AccessController::start(Collaborators {
            persistence: persistence.clone(),
            settings_store: settings_store.clone(),
            enforcer,
            notifier: notifier.clone(),
            gate: Box::new(relay),
            system: system.clone(),
        })
        .unwrap()
        .with_restart_grace(Duration::ZERO);

        Self {
            controller: Arc::new(controller),
            netfilter,
            persistence,
            settings_store,
            notifier,
            system,
            gate,
        }
    }

    pub fn status(&self, mac: &MacAddress) -> SessionStatus {
        self.controller.status(mac).snapshot.unwrap().status
    }

    pub fn record(&self, mac: &MacAddress) -> SessionRecord {
        self.controller.store().get(mac).unwrap()
    }

    /// `true` when the device has exactly the block directive pair.
    pub fn is_cut_off(&self, mac: &MacAddress) -> bool {
        self.netfilter.count_rules(mac, "ACCEPT") == 0
            && self.netfilter.count_rules(mac, "DROP") == 1
            && self.netfilter.count_rules(mac, "REJECT") == 1
    }

    /// `true` when the device has exactly one accept in each table.
    pub fn is_allowed(&self, mac: &MacAddress) -> bool {
        self.netfilter.count_rules(mac, "ACCEPT") == 2
            && self.netfilter.count_rules(mac, "DROP") == 0
            && self.netfilter.count_rules(mac, "REJECT") == 0
    }

    pub fn syncs_to(&self, mac: &MacAddress) -> Vec<SessionStatus> {
        self.notifier
            .sent_to(mac)
            .into_iter()
            .filter_map(|n| match n {
                Notification::Sync { status, .. } => Some(status),
                _ => None,
            })
            .collect()
    }
}

pub fn mac(last: u8) -> MacAddress {
    MacAddress::from_octets([0x02, 0x42, 0xac, 0x11, 0x00, last])
}

pub fn addr(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, last)
}

/// Stored record as left by an earlier run.
pub fn stored(status: SessionStatus, time_remaining: u64) -> SessionRecord {
    let mut record = SessionRecord::new(Utc::now());
    record.status = status;
    record.time_remaining = time_remaining;
    record
}
