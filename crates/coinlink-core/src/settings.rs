//! Process-wide runtime settings.
//!
//! Every field has a default, so a partial or empty JSON document still
//! yields a complete [`Settings`]. Keys this build does not know are kept in
//! [`Settings::extra`] and written back unchanged on save.

use std::collections::BTreeMap;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::constants::*;
use crate::conversion::{PointMap, RateTable};
use crate::{Result, error::Error};

/// Daily restart schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartSchedule {
    pub enabled: bool,
    /// Wall-clock time, `HH:MM`.
    pub time: String,
}

impl Default for RestartSchedule {
    fn default() -> Self {
        Self {
            enabled: false,
            time: DEFAULT_RESTART_TIME.to_string(),
        }
    }
}

impl RestartSchedule {
    /// Parsed target time.
    ///
    /// # Errors
    /// Returns `Error::InvalidScheduleTime` if `time` is not `HH:MM`.
    pub fn target(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.time.trim(), "%H:%M")
            .map_err(|_| Error::InvalidScheduleTime(self.time.clone()))
    }

    /// `true` when enabled and `now` falls in the target minute.
    pub fn matches(&self, now: NaiveTime) -> bool {
        if !self.enabled {
            return false;
        }
        match self.target() {
            Ok(target) => target.hour() == now.hour() && target.minute() == now.minute(),
            Err(_) => false,
        }
    }
}

/// Entry of the point redemption catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promo {
    pub id: u32,
    pub name: String,
    pub cost: f64,
    pub minutes: u64,
}

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds a slot hold lasts.
    pub slot_timeout: u64,
    /// Idle seconds before auto-pause.
    pub inactive_timeout: u64,
    pub auto_pause_enabled: bool,
    pub speed_limit_enabled: bool,
    /// Per-device cap, megabits per second.
    pub global_speed_limit: u32,
    /// Priority band for small UDP datagrams and ICMP.
    pub gaming_mode_enabled: bool,
    pub inactive_packet_threshold: u64,
    pub inactive_bytes_threshold: u64,
    /// Seconds between connectivity polls.
    pub monitor_interval: u64,
    pub coin_rates: String,
    pub pulse_value: u64,
    pub restart_schedule: RestartSchedule,
    pub points_enabled: bool,
    pub coin_point_map: BTreeMap<String, f64>,
    pub point_promos: Vec<Promo>,
    pub free_time_enabled: bool,
    /// Minutes granted by the free-time entitlement.
    pub free_time_duration: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            slot_timeout: DEFAULT_SLOT_TIMEOUT_SECS,
            inactive_timeout: DEFAULT_INACTIVE_TIMEOUT_SECS,
            auto_pause_enabled: true,
            speed_limit_enabled: false,
            global_speed_limit: DEFAULT_SPEED_LIMIT_MBIT,
            gaming_mode_enabled: false,
            inactive_packet_threshold: DEFAULT_INACTIVE_PACKET_THRESHOLD,
            inactive_bytes_threshold: DEFAULT_INACTIVE_BYTES_THRESHOLD,
            monitor_interval: DEFAULT_MONITOR_INTERVAL_SECS,
            coin_rates: DEFAULT_COIN_RATES.to_string(),
            pulse_value: DEFAULT_PULSE_VALUE,
            restart_schedule: RestartSchedule::default(),
            points_enabled: true,
            coin_point_map: BTreeMap::from([
                ("1".to_string(), 0.5),
                ("5".to_string(), 1.0),
                ("10".to_string(), 3.0),
                ("20".to_string(), 5.0),
            ]),
            point_promos: vec![Promo {
                id: 1,
                name: "3 Hours Free".to_string(),
                cost: 20.0,
                minutes: 180,
            }],
            free_time_enabled: false,
            free_time_duration: DEFAULT_FREE_TIME_MINUTES,
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Overlay persisted values key by key.
    ///
    /// A key whose value does not fit its field is dropped with a warning and
    /// the current value is kept; the rest of the document still applies.
    pub fn overlay(self, persisted: &Value) -> Settings {
        let Value::Object(entries) = persisted else {
            warn!("persisted settings are not a JSON object, keeping defaults");
            return self;
        };

        let mut current = self;
        for (key, value) in entries {
            let mut candidate = match serde_json::to_value(&current) {
                Ok(Value::Object(map)) => map,
                _ => return current,
            };
            candidate.insert(key.clone(), value.clone());

            match serde_json::from_value::<Settings>(Value::Object(candidate)) {
                Ok(next) => current = next,
                Err(e) => warn!(key = %key, error = %e, "ignoring malformed setting"),
            }
        }
        current.sanitized()
    }

    /// Drop promos whose cost is negative or not a number.
    pub fn sanitized(mut self) -> Settings {
        self.point_promos.retain(|promo| {
            let valid = promo.cost.is_finite() && promo.cost >= 0.0;
            if !valid {
                warn!(promo = promo.id, cost = promo.cost, "ignoring promo with invalid cost");
            }
            valid
        });
        self
    }

    /// Parsed coin rate table, default tier on malformed input.
    pub fn rate_table(&self) -> RateTable {
        RateTable::parse_or_default(&self.coin_rates)
    }

    pub fn point_map(&self) -> PointMap {
        PointMap::from_map(&self.coin_point_map)
    }

    /// Look up a promo by id.
    pub fn promo(&self, id: u32) -> Option<&Promo> {
        self.point_promos.iter().find(|p| p.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.slot_timeout, 30);
        assert_eq!(s.inactive_timeout, 60);
        assert!(s.auto_pause_enabled);
        assert!(!s.speed_limit_enabled);
        assert_eq!(s.global_speed_limit, 5);
        assert_eq!(s.monitor_interval, 5);
        assert_eq!(s.coin_rates, "1:10,5:60,10:180,20:300");
        assert_eq!(s.restart_schedule.time, "03:00");
        assert_eq!(s.promo(1).map(|p| p.minutes), Some(180));
        assert!(s.promo(2).is_none());
    }

    #[test]
    fn test_empty_document_deserializes_to_defaults() {
        let s: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_overlay_keeps_good_keys_and_drops_bad_ones() {
        let persisted = json!({
            "slot_timeout": 45,
            "inactive_timeout": "soon",
            "speed_limit_enabled": true,
            "banner_text": "Welcome",
        });
        let s = Settings::default().overlay(&persisted);

        assert_eq!(s.slot_timeout, 45);
        assert_eq!(s.inactive_timeout, 60);
        assert!(s.speed_limit_enabled);
        assert_eq!(s.extra.get("banner_text"), Some(&json!("Welcome")));
    }

    #[test]
    fn test_overlay_non_object_keeps_defaults() {
        let s = Settings::default().overlay(&json!([1, 2, 3]));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_unknown_keys_round_trip() {
        let s = Settings::default().overlay(&json!({"sound_coin": "ding.mp3"}));
        let out = serde_json::to_value(&s).unwrap();
        assert_eq!(out["sound_coin"], json!("ding.mp3"));
        assert_eq!(out["slot_timeout"], json!(30));
    }

    #[test]
    fn test_overlay_drops_promos_with_invalid_cost() {
        let persisted = json!({
            "point_promos": [
                {"id": 1, "name": "3 Hours Free", "cost": 20.0, "minutes": 180},
                {"id": 2, "name": "Free money", "cost": -5.0, "minutes": 600},
                {"id": 3, "name": "Taster", "cost": 0.0, "minutes": 10},
            ]
        });
        let s = Settings::default().overlay(&persisted);

        assert!(s.promo(1).is_some());
        assert!(s.promo(2).is_none());
        assert_eq!(s.promo(3).map(|p| p.minutes), Some(10));
    }

    #[test]
    fn test_sanitized_rejects_non_finite_cost() {
        let mut s = Settings::default();
        s.point_promos.push(Promo {
            id: 7,
            name: "Broken".to_string(),
            cost: f64::NAN,
            minutes: 60,
        });
        let s = s.sanitized();
        assert!(s.promo(7).is_none());
        assert_eq!(s.point_promos.len(), 1);
    }

    #[test]
    fn test_restart_schedule_matching() {
        let schedule = RestartSchedule {
            enabled: true,
            time: "03:00".to_string(),
        };
        assert!(schedule.matches(NaiveTime::from_hms_opt(3, 0, 0).unwrap()));
        assert!(schedule.matches(NaiveTime::from_hms_opt(3, 0, 59).unwrap()));
        assert!(!schedule.matches(NaiveTime::from_hms_opt(3, 1, 0).unwrap()));

        let disabled = RestartSchedule::default();
        assert!(!disabled.matches(NaiveTime::from_hms_opt(3, 0, 0).unwrap()));
    }

    #[test]
    fn test_restart_schedule_invalid_time() {
        let schedule = RestartSchedule {
            enabled: true,
            time: "25:99".to_string(),
        };
        assert!(matches!(
            schedule.target(),
            Err(Error::InvalidScheduleTime(_))
        ));
        assert!(!schedule.matches(NaiveTime::from_hms_opt(3, 0, 0).unwrap()));
    }

    #[test]
    fn test_malformed_rates_fall_back() {
        let s = Settings {
            coin_rates: "garbage".to_string(),
            ..Settings::default()
        };
        assert_eq!(s.rate_table(), RateTable::default());
    }
}
