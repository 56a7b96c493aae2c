//! Session operations.
//!
//! [`AccessController`] owns the session table, the coin slot, the current
//! settings and handles to every collaborator. Each operation runs its state
//! change, enforcement call and write-through inside the device's record lock,
//! then queues a notification. Lock order is record, then slot.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use coinlink_core::constants::RESTART_GRACE_SECS;
use coinlink_core::{
    MacAddress, Persistence, Result, SessionRecord, SessionSnapshot, SessionStatus, Settings,
    SettingsStore,
};
use coinlink_hardware::Relay;
use coinlink_network::{Enforcer, ShapingPolicy};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::notify::{Notification, Notifier};
use crate::slot::SlotArbiter;
use crate::store::{SessionStore, Update};
use crate::system::SystemControl;

/// Result tag of a device or admin operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultTag {
    Success,
    Fail,
    Blocked,
    Busy,
    Disabled,
    AlreadyClaimed,
    Error,
}

/// What an operation returns to the request layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub result: ResultTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SessionSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Outcome {
    pub fn tag(result: ResultTag) -> Self {
        Self {
            result,
            snapshot: None,
            message: None,
        }
    }

    pub fn success(snapshot: SessionSnapshot) -> Self {
        Self {
            result: ResultTag::Success,
            snapshot: Some(snapshot),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.result == ResultTag::Success
    }
}

/// Result of crediting a pulse train.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditOutcome {
    Credited { mac: MacAddress, amount: u64 },
    /// Nobody held the slot; the coins are kept by the machine.
    NoHolder,
    /// The holder is blocked and cannot accrue balance.
    Blocked,
}

/// Sales totals by calendar period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SalesReport {
    pub total: u64,
    pub daily: u64,
    pub weekly: u64,
    pub monthly: u64,
    pub yearly: u64,
}

/// Start of the current day, week (Monday), month and year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodStarts {
    pub day: DateTime<Utc>,
    pub week: DateTime<Utc>,
    pub month: DateTime<Utc>,
    pub year: DateTime<Utc>,
}

/// Period boundaries as midnight in `now`'s time zone.
pub fn period_starts<Tz: TimeZone>(now: &DateTime<Tz>) -> PeriodStarts {
    let tz = now.timezone();
    let today = now.date_naive();
    let midnight = |date: NaiveDate| {
        let local = date.and_time(NaiveTime::default());
        tz.from_local_datetime(&local)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&local))
    };

    let monday = today
        .checked_sub_days(Days::new(u64::from(today.weekday().num_days_from_monday())))
        .unwrap_or(today);
    let first_of_month = NaiveDate::from_ymd_opt(today.year(), today.month(), 1).unwrap_or(today);
    let first_of_year = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);

    PeriodStarts {
        day: midnight(today),
        week: midnight(monday),
        month: midnight(first_of_month),
        year: midnight(first_of_year),
    }
}

/// Everything the controller talks to.
pub struct Collaborators {
    pub persistence: Arc<dyn Persistence>,
    pub settings_store: Arc<dyn SettingsStore>,
    pub enforcer: Arc<Enforcer>,
    pub notifier: Arc<dyn Notifier>,
    pub gate: Box<dyn Relay>,
    pub system: Arc<dyn SystemControl>,
}

pub struct AccessController {
    store: SessionStore,
    slot: SlotArbiter,
    enforcer: Arc<Enforcer>,
    notifier: Arc<dyn Notifier>,
    settings_store: Arc<dyn SettingsStore>,
    settings: RwLock<Settings>,
    system: Arc<dyn SystemControl>,
    restart_grace: Duration,
}

impl AccessController {
    /// Load sessions and settings and apply the shaping policy.
    ///
    /// # Errors
    /// Fails if stored sessions or settings cannot be read.
    pub fn start(parts: Collaborators) -> Result<Self> {
        let settings = parts.settings_store.load()?.sanitized();
        let store = SessionStore::load(parts.persistence)?;
        parts
            .enforcer
            .set_policy(ShapingPolicy::from_settings(&settings));

        Ok(Self {
            store,
            slot: SlotArbiter::new(parts.gate),
            enforcer: parts.enforcer,
            notifier: parts.notifier,
            settings_store: parts.settings_store,
            settings: RwLock::new(settings),
            system: parts.system,
            restart_grace: Duration::from_secs(RESTART_GRACE_SECS),
        })
    }

    /// Delay between the restart notice and the restart itself.
    pub fn with_restart_grace(mut self, grace: Duration) -> Self {
        self.restart_grace = grace;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn slot(&self) -> &SlotArbiter {
        &self.slot
    }

    pub fn enforcer(&self) -> &Enforcer {
        &self.enforcer
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    /// Copy of the current settings.
    pub fn settings(&self) -> Settings {
        self.settings.read().clone()
    }

    pub(crate) fn snapshot_of(&self, mac: &MacAddress, record: &SessionRecord) -> SessionSnapshot {
        record.snapshot(
            *mac,
            self.slot.is_busy_for(mac),
            self.slot.seconds_left(mac, Utc::now()),
        )
    }

    pub(crate) fn notify_sync(&self, mac: &MacAddress, snapshot: &SessionSnapshot) {
        self.notifier.send(
            mac,
            Notification::Sync {
                status: snapshot.status,
                time_remaining: snapshot.time_remaining,
                balance: snapshot.balance,
                points: snapshot.points,
            },
        );
    }

    fn address_of(&self, mac: &MacAddress, record: &mut SessionRecord) -> Option<Ipv4Addr> {
        if record.ip.is_none() {
            record.ip = self.enforcer.resolve_ip(mac);
        }
        record.ip
    }

    /// Put a record into `connected` and open the uplink.
    ///
    /// Re-applies the allow for a record that is already connected.
    fn enter_connected(
        &self,
        mac: &MacAddress,
        record: &mut SessionRecord,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if record.status.is_connected() {
            record.last_active = now;
        } else {
            record.connect(now)?;
        }
        let addr = self.address_of(mac, record);
        self.enforcer.apply_allow(mac, addr);
        self.slot.release_if_held(mac);
        Ok(())
    }

    /// Close the uplink for a record that just left `connected`.
    pub(crate) fn cut_off(&self, mac: &MacAddress, record: &SessionRecord) {
        self.enforcer.apply_block(mac, record.ip);
    }

    /// First contact from a device; records its current address.
    pub fn touch(&self, mac: &MacAddress, ip: Option<Ipv4Addr>) -> Outcome {
        let snapshot = self.store.upsert_with(mac, Utc::now(), |record| {
            let changed = ip.is_some() && record.ip != ip;
            if changed {
                record.ip = ip;
            }
            let snapshot = self.snapshot_of(mac, record);
            if changed {
                Update::Persist(snapshot)
            } else {
                Update::Transient(snapshot)
            }
        });
        Outcome::success(snapshot)
    }

    /// Current view of a device. Unknown devices read as a fresh record.
    pub fn status(&self, mac: &MacAddress) -> Outcome {
        let record = self
            .store
            .get(mac)
            .unwrap_or_else(|| SessionRecord::new(Utc::now()));
        Outcome::success(self.snapshot_of(mac, &record))
    }

    /// Convert pending balance and start browsing.
    pub fn connect(&self, mac: &MacAddress) -> Outcome {
        let settings = self.settings();
        let rates = settings.rate_table();
        let points = settings.point_map();
        let now = Utc::now();

        let outcome = self.store.update(mac, |record| {
            if record.status.is_blocked() {
                return Update::Transient(Outcome::tag(ResultTag::Blocked));
            }
            let settled = record.settle_balance(&rates, &points, settings.points_enabled);
            if settled.minutes > 0 {
                info!(mac = %mac, minutes = settled.minutes, points = settled.points, "balance settled");
            }

            if record.time_remaining == 0 {
                let outcome = Outcome::tag(ResultTag::Fail).with_message("no time remaining");
                return if settled.minutes > 0 {
                    Update::Persist(outcome)
                } else {
                    Update::Transient(outcome)
                };
            }
            if let Err(e) = self.enter_connected(mac, record, now) {
                warn!(mac = %mac, error = %e, "connect rejected");
                return Update::Persist(Outcome::tag(ResultTag::Fail).with_message(e.to_string()));
            }
            Update::Persist(Outcome::success(self.snapshot_of(mac, record)))
        });

        self.finish(mac, outcome)
    }

    /// Suspend a connected session, keeping its remaining time.
    pub fn pause(&self, mac: &MacAddress) -> Outcome {
        let outcome = self.store.update(mac, |record| {
            if record.status != SessionStatus::Connected {
                return Update::Transient(Outcome::tag(ResultTag::Fail));
            }
            if let Err(e) = record.transition_to(SessionStatus::Paused) {
                return Update::Transient(Outcome::tag(ResultTag::Fail).with_message(e.to_string()));
            }
            self.cut_off(mac, record);
            info!(mac = %mac, remaining = record.time_remaining, "session paused");
            Update::Persist(Outcome::success(self.snapshot_of(mac, record)))
        });

        self.finish(mac, outcome)
    }

    /// Claim the coin slot and open the gate.
    pub fn enable_slot(&self, mac: &MacAddress) -> Outcome {
        let settings = self.settings();
        let now = Utc::now();

        self.store.upsert_with(mac, now, |record| {
            if record.status.is_blocked() {
                return Update::Transient(Outcome::tag(ResultTag::Blocked));
            }
            if let Err(busy) = self.slot.try_acquire(mac, now, settings.slot_timeout) {
                info!(mac = %mac, holder = %busy.holder, "slot busy");
                return Update::Transient(Outcome::tag(ResultTag::Busy));
            }
            self.notifier.send(
                mac,
                Notification::SlotOpened {
                    slot_seconds: settings.slot_timeout,
                    balance: record.balance,
                    points: record.points,
                    coin_rates: settings.coin_rates.clone(),
                    time_remaining: record.time_remaining,
                },
            );
            Update::Transient(Outcome::success(self.snapshot_of(mac, record)))
        })
    }

    /// Give up the slot if `mac` holds it.
    pub fn cancel_slot(&self, mac: &MacAddress) -> Outcome {
        if !self.slot.release_if_held(mac) {
            return Outcome::tag(ResultTag::Fail);
        }
        match self.store.get(mac) {
            Some(record) => Outcome::success(self.snapshot_of(mac, &record)),
            None => Outcome::tag(ResultTag::Success),
        }
    }

    /// One-off free session.
    ///
    /// A zero-minute grant counts as disabled so the claim is not spent.
    pub fn claim_free_time(&self, mac: &MacAddress) -> Outcome {
        let settings = self.settings();
        if !settings.free_time_enabled || settings.free_time_duration == 0 {
            return Outcome::tag(ResultTag::Disabled);
        }
        let now = Utc::now();

        let outcome = self.store.update(mac, |record| {
            if record.status.is_blocked() {
                return Update::Transient(Outcome::tag(ResultTag::Blocked));
            }
            if record.free_claimed {
                return Update::Transient(Outcome::tag(ResultTag::AlreadyClaimed));
            }
            record.add_minutes(settings.free_time_duration);
            record.free_claimed = true;
            if let Err(e) = self.enter_connected(mac, record, now) {
                warn!(mac = %mac, error = %e, "free time granted but connect rejected");
            }
            info!(mac = %mac, minutes = settings.free_time_duration, "free time claimed");
            Update::Persist(Outcome::success(self.snapshot_of(mac, record)))
        });

        self.finish_or_error(mac, outcome)
    }

    /// Spend points on a promo and start browsing.
    pub fn redeem_promo(&self, mac: &MacAddress, promo_id: u32) -> Outcome {
        let settings = self.settings();
        if !self.store.contains(mac) {
            return Outcome::tag(ResultTag::Error).with_message("device not found");
        }
        if !settings.points_enabled {
            return Outcome::tag(ResultTag::Disabled);
        }
        let Some(promo) = settings.promo(promo_id).cloned() else {
            return Outcome::tag(ResultTag::Fail).with_message("invalid promo");
        };
        let now = Utc::now();

        let outcome = self.store.update(mac, |record| {
            if record.status.is_blocked() {
                return Update::Transient(Outcome::tag(ResultTag::Blocked));
            }
            if record.points < promo.cost {
                return Update::Transient(
                    Outcome::tag(ResultTag::Fail).with_message("not enough points"),
                );
            }
            record.points -= promo.cost;
            record.add_minutes(promo.minutes);
            if let Err(e) = self.enter_connected(mac, record, now) {
                warn!(mac = %mac, error = %e, "promo redeemed but connect rejected");
            }
            info!(mac = %mac, promo = promo.id, cost = promo.cost, "promo redeemed");
            Update::Persist(
                Outcome::success(self.snapshot_of(mac, record))
                    .with_message(format!("redeemed: {}", promo.name)),
            )
        });

        self.finish_or_error(mac, outcome)
    }

    /// Add or remove time by hand.
    ///
    /// Draining a connected session expires it; topping up an expired one
    /// reconnects it.
    pub fn admin_adjust_time(&self, mac: &MacAddress, delta_seconds: i64) -> Outcome {
        let now = Utc::now();
        let outcome = self.store.update(mac, |record| {
            let remaining = record.adjust_time(delta_seconds);

            if remaining == 0 && record.status.is_connected() {
                if record.transition_to(SessionStatus::Expired).is_ok() {
                    self.cut_off(mac, record);
                }
            } else if delta_seconds > 0
                && remaining > 0
                && record.status == SessionStatus::Expired
                && let Err(e) = self.enter_connected(mac, record, now)
            {
                warn!(mac = %mac, error = %e, "top-up could not reconnect");
            }
            info!(mac = %mac, delta_seconds, remaining, "time adjusted");
            Update::Persist(Outcome::success(self.snapshot_of(mac, record)))
        });

        self.finish_or_error(mac, outcome)
    }

    /// Block a device. Blocking twice is harmless.
    pub fn admin_block(&self, mac: &MacAddress) -> Outcome {
        let outcome = self.store.update(mac, |record| {
            if !record.status.is_blocked()
                && let Err(e) = record.transition_to(SessionStatus::Blocked)
            {
                return Update::Transient(Outcome::tag(ResultTag::Fail).with_message(e.to_string()));
            }
            self.cut_off(mac, record);
            self.slot.release_if_held(mac);
            info!(mac = %mac, "device blocked");
            Update::Persist(Outcome::success(self.snapshot_of(mac, record)))
        });

        self.finish_or_error(mac, outcome)
    }

    /// Lift a block. The device starts over as `new` with its time, balance
    /// and points intact; it stays cut off until it connects again.
    pub fn admin_unblock(&self, mac: &MacAddress) -> Outcome {
        let outcome = self.store.update(mac, |record| {
            if !record.status.is_blocked() {
                return Update::Transient(Outcome::tag(ResultTag::Fail).with_message("not blocked"));
            }
            if let Err(e) = record.transition_to(SessionStatus::New) {
                return Update::Transient(Outcome::tag(ResultTag::Fail).with_message(e.to_string()));
            }
            info!(mac = %mac, "device unblocked");
            Update::Persist(Outcome::success(self.snapshot_of(mac, record)))
        });

        self.finish_or_error(mac, outcome)
    }

    /// Forget a device entirely, cutting it off first.
    pub fn admin_delete(&self, mac: &MacAddress) -> Outcome {
        let Some(record) = self.store.remove(mac) else {
            return Outcome::tag(ResultTag::Error).with_message("device not found");
        };
        self.cut_off(mac, &record);
        self.slot.release_if_held(mac);
        Outcome::tag(ResultTag::Success)
    }

    /// Restart the kiosk after telling every device.
    ///
    /// # Errors
    /// Returns the error from [`SystemControl::restart`].
    pub fn admin_restart(&self) -> Result<()> {
        self.restart("System is restarting...")
    }

    pub(crate) fn restart(&self, message: &str) -> Result<()> {
        warn!(grace = ?self.restart_grace, "restart requested");
        self.broadcast(&Notification::SystemMessage {
            message: message.to_string(),
        });
        thread::sleep(self.restart_grace);
        self.system.restart()
    }

    /// Credit a pulse train to whoever holds the slot.
    pub fn credit_pulses(&self, pulses: u32, now: DateTime<Utc>) -> CreditOutcome {
        let Some(holder) = self.slot.holder() else {
            info!(pulses, "coins inserted with no slot holder");
            return CreditOutcome::NoHolder;
        };
        let settings = self.settings();
        let amount = u64::from(pulses).saturating_mul(settings.pulse_value);

        let credited = self.store.update(&holder, |record| {
            if record.status.is_blocked() {
                return Update::Transient(None);
            }
            record.balance = record.balance.saturating_add(amount);
            record.last_active = now;
            self.slot.refresh(&holder, now, settings.slot_timeout);
            Update::Persist(Some((record.balance, record.points)))
        });

        let Some(credited) = credited else {
            return CreditOutcome::NoHolder;
        };
        let Some((balance, points)) = credited else {
            warn!(mac = %holder, pulses, "ignoring coins from blocked device");
            return CreditOutcome::Blocked;
        };

        if amount > 0
            && let Err(e) = self.store.persistence().record_sale(&holder, amount, now)
        {
            error!(mac = %holder, amount, error = %e, "failed to record sale");
        }
        info!(mac = %holder, pulses, amount, balance, "coins credited");
        self.notifier.send(
            &holder,
            Notification::CoinInserted {
                balance,
                points,
                slot_seconds: settings.slot_timeout,
                pulse_value: settings.pulse_value,
            },
        );
        CreditOutcome::Credited {
            mac: holder,
            amount,
        }
    }

    /// Replace and save the settings, then rebuild shaping.
    ///
    /// Turning free time on resets every device's claim.
    ///
    /// # Errors
    /// Fails if the settings cannot be saved; nothing is applied then.
    pub fn update_settings(&self, next: Settings) -> Result<()> {
        let next = next.sanitized();
        let free_time_reopened = !self.settings.read().free_time_enabled && next.free_time_enabled;

        self.settings_store.save(&next)?;
        let policy = ShapingPolicy::from_settings(&next);
        *self.settings.write() = next;

        if free_time_reopened {
            self.reset_free_claims();
        }
        self.enforcer.set_policy(policy);
        self.refresh_limits();
        info!("settings updated");
        Ok(())
    }

    fn reset_free_claims(&self) {
        if let Err(e) = self.store.persistence().reset_free_claims() {
            error!(error = %e, "failed to reset stored free-time claims");
        }
        for mac in self.store.macs() {
            self.store.update(&mac, |record| {
                record.free_claimed = false;
                Update::Transient(())
            });
        }
        info!("free-time claims reset");
    }

    /// Rebuild bandwidth caps for every connected device.
    pub fn refresh_limits(&self) {
        let addrs: Vec<Ipv4Addr> = self
            .store
            .connected()
            .into_iter()
            .filter_map(|(_, ip)| ip)
            .collect();
        self.enforcer.refresh_all(&addrs);
    }

    /// Sales totals with period boundaries in `now`'s time zone.
    ///
    /// # Errors
    /// Returns the persistence error if a sum cannot be read.
    pub fn sales_report<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<SalesReport> {
        let starts = period_starts(now);
        let persistence = self.store.persistence();
        Ok(SalesReport {
            total: persistence.sum_sales_since(DateTime::<Utc>::UNIX_EPOCH)?,
            daily: persistence.sum_sales_since(starts.day)?,
            weekly: persistence.sum_sales_since(starts.week)?,
            monthly: persistence.sum_sales_since(starts.month)?,
            yearly: persistence.sum_sales_since(starts.year)?,
        })
    }

    /// Pause every session left connected by a power loss.
    ///
    /// Each paused device is cut off as well, since a packet filter that was
    /// not rebuilt still carries its accepts. Returns how many were paused.
    pub fn suspend_connected_on_startup(&self) -> usize {
        let mut suspended = 0;
        for (mac, _) in self.store.connected() {
            let paused = self.store.update(&mac, |record| {
                match record.transition_to(SessionStatus::Paused) {
                    Ok(_) => {
                        self.cut_off(&mac, record);
                        Update::Persist(true)
                    }
                    Err(_) => Update::Transient(false),
                }
            });
            if paused == Some(true) {
                suspended += 1;
            }
        }
        if suspended > 0 {
            info!(suspended, "sessions paused after restart");
        }
        suspended
    }

    /// Send `notification` to every known device.
    pub fn broadcast(&self, notification: &Notification) {
        for mac in self.store.macs() {
            self.notifier.send(&mac, notification.clone());
        }
    }

    /// Send every device its current state.
    pub fn broadcast_sync(&self) {
        for mac in self.store.macs() {
            if let Some(record) = self.store.get(&mac) {
                self.notify_sync(&mac, &self.snapshot_of(&mac, &record));
            }
        }
    }

    fn finish(&self, mac: &MacAddress, outcome: Option<Outcome>) -> Outcome {
        let Some(outcome) = outcome else {
            return Outcome::tag(ResultTag::Fail);
        };
        if let Some(snapshot) = &outcome.snapshot
            && outcome.is_success()
        {
            self.notify_sync(mac, snapshot);
        }
        outcome
    }

    fn finish_or_error(&self, mac: &MacAddress, outcome: Option<Outcome>) -> Outcome {
        match outcome {
            Some(outcome) => self.finish(mac, Some(outcome)),
            None => Outcome::tag(ResultTag::Error).with_message("device not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use rstest::rstest;

    #[rstest]
    // Wednesday
    #[case("2026-10-14T15:30:00Z", "2026-10-14T00:00:00Z", "2026-10-12T00:00:00Z")]
    // Monday just after midnight
    #[case("2026-10-12T00:00:01Z", "2026-10-12T00:00:00Z", "2026-10-12T00:00:00Z")]
    // Sunday, week began six days earlier
    #[case("2026-10-18T23:59:59Z", "2026-10-18T00:00:00Z", "2026-10-12T00:00:00Z")]
    fn test_period_starts_utc(#[case] now: &str, #[case] day: &str, #[case] week: &str) {
        let now: DateTime<Utc> = now.parse().unwrap();
        let starts = period_starts(&now);
        assert_eq!(starts.day, day.parse::<DateTime<Utc>>().unwrap());
        assert_eq!(starts.week, week.parse::<DateTime<Utc>>().unwrap());
        assert_eq!(starts.month, "2026-10-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
        assert_eq!(starts.year, "2026-01-01T00:00:00Z".parse::<DateTime<Utc>>().unwrap());
    }

    #[test]
    fn test_period_starts_follow_local_midnight() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        // 01:00 local on Jan 1st is still Dec 31st in UTC.
        let now = offset.with_ymd_and_hms(2027, 1, 1, 1, 0, 0).unwrap();
        let starts = period_starts(&now);

        let local_midnight = "2026-12-31T16:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(starts.day, local_midnight);
        assert_eq!(starts.year, local_midnight);
        assert_eq!(starts.month, local_midnight);
    }

    #[test]
    fn test_outcome_wire_format() {
        let json = serde_json::to_string(&Outcome::tag(ResultTag::AlreadyClaimed)).unwrap();
        assert_eq!(json, r#"{"result":"already_claimed"}"#);
    }
}
