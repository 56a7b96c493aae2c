use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use coinlink_core::{MacAddress, SessionRecord, SessionStatus};
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Row of the `sessions` table.
///
/// SQLite has no unsigned integers, so counters are stored as `i64`;
/// the schema's `CHECK` constraints keep them non-negative. The traffic
/// baseline is not stored: it is meaningless across a restart.
///
/// # Examples
///
/// ```
/// use coinlink_storage::models::SessionRow;
/// use coinlink_core::{MacAddress, SessionRecord, SessionStatus};
/// use chrono::Utc;
///
/// let mac: MacAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
/// let mut record = SessionRecord::new(Utc::now());
/// record.time_remaining = 600;
///
/// let row = SessionRow::from_record(&mac, &record);
/// assert_eq!(row.mac, "aa:bb:cc:dd:ee:ff");
/// assert_eq!(row.status, "new");
///
/// let (back_mac, back) = row.into_record().unwrap();
/// assert_eq!(back_mac, mac);
/// assert_eq!(back.status, SessionStatus::New);
/// assert_eq!(back.time_remaining, 600);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionRow {
    pub mac: String,
    pub ip: Option<String>,
    pub time_remaining: i64,
    pub status: String,
    pub balance: i64,
    pub free_claimed: bool,
    pub points: f64,
    pub last_active: DateTime<Utc>,
}

impl SessionRow {
    pub fn from_record(mac: &MacAddress, record: &SessionRecord) -> Self {
        Self {
            mac: mac.to_string(),
            ip: record.ip.map(|ip| ip.to_string()),
            time_remaining: to_sql_int(record.time_remaining),
            status: record.status.as_str().to_string(),
            balance: to_sql_int(record.balance),
            free_claimed: record.free_claimed,
            points: record.points.max(0.0),
            last_active: record.last_active,
        }
    }

    /// Map back to the domain pair.
    ///
    /// An unparsable address is dropped (it is advisory); an unparsable key
    /// or status makes the whole row corrupt.
    pub fn into_record(self) -> StorageResult<(MacAddress, SessionRecord)> {
        let mac: MacAddress = self
            .mac
            .parse()
            .map_err(|_| StorageError::CorruptRow(format!("session key {:?}", self.mac)))?;
        let status: SessionStatus = self
            .status
            .parse()
            .map_err(|_| StorageError::CorruptRow(format!("status {:?} for {}", self.status, mac)))?;

        let record = SessionRecord {
            ip: self.ip.as_deref().and_then(|ip| ip.parse::<Ipv4Addr>().ok()),
            time_remaining: from_sql_int(self.time_remaining),
            status,
            balance: from_sql_int(self.balance),
            free_claimed: self.free_claimed,
            points: self.points.max(0.0),
            last_active: self.last_active,
            last_traffic: None,
        };
        Ok((mac, record))
    }
}

pub(crate) fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub(crate) fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
