//! Collaborator contracts for durable state.
//!
//! The schedulers run on plain OS threads, so these traits are synchronous.
//! Implementations backed by an async driver bridge internally.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::Result;
use crate::session::SessionRecord;
use crate::settings::Settings;
use crate::types::MacAddress;

/// Durable store for session rows and sale records.
///
/// `upsert` overwrites the whole row; there is no partial update and no
/// transaction spanning several calls.
pub trait Persistence: Send + Sync {
    fn load_all_sessions(&self) -> Result<HashMap<MacAddress, SessionRecord>>;

    fn upsert(&self, mac: &MacAddress, record: &SessionRecord) -> Result<()>;

    fn delete(&self, mac: &MacAddress) -> Result<()>;

    fn record_sale(&self, mac: &MacAddress, amount: u64, at: DateTime<Utc>) -> Result<()>;

    /// Sum of sale amounts at or after `since`.
    fn sum_sales_since(&self, since: DateTime<Utc>) -> Result<u64>;

    /// Clear the free-time flag on every stored session.
    fn reset_free_claims(&self) -> Result<()>;
}

/// Load and save runtime [`Settings`].
pub trait SettingsStore: Send + Sync {
    /// Current settings; defaults when nothing is stored yet.
    fn load(&self) -> Result<Settings>;

    fn save(&self, settings: &Settings) -> Result<()>;
}
