use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One credited coin train.
///
/// `amount` is in minor currency units (pulses × pulse value). Sales are
/// append-only and are kept after the session row is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sale {
    pub id: i64,
    pub mac: String,
    pub amount: i64,
    pub sold_at: DateTime<Utc>,
}
