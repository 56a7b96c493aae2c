//! In-memory collaborators for tests and dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use coinlink_core::{Error, MacAddress, Persistence, SessionRecord, Settings, SettingsStore};
use parking_lot::Mutex;

/// A recorded sale: device, amount, time.
pub type SaleEntry = (MacAddress, u64, DateTime<Utc>);

#[derive(Debug, Default)]
struct Tables {
    sessions: HashMap<MacAddress, SessionRecord>,
    sales: Vec<SaleEntry>,
}

/// [`Persistence`] kept in a map. Can be switched to fail every call.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    tables: Mutex<Tables>,
    failing: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed stored sessions, as if left by a previous run.
    pub fn with_sessions(sessions: impl IntoIterator<Item = (MacAddress, SessionRecord)>) -> Self {
        let store = Self::default();
        store.tables.lock().sessions.extend(sessions);
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn session(&self, mac: &MacAddress) -> Option<SessionRecord> {
        self.tables.lock().sessions.get(mac).cloned()
    }

    pub fn sessions(&self) -> HashMap<MacAddress, SessionRecord> {
        self.tables.lock().sessions.clone()
    }

    pub fn sales(&self) -> Vec<SaleEntry> {
        self.tables.lock().sales.clone()
    }

    /// Successful upserts since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> coinlink_core::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Persistence("store unavailable".to_string()));
        }
        Ok(())
    }
}

impl Persistence for MemoryPersistence {
    fn load_all_sessions(&self) -> coinlink_core::Result<HashMap<MacAddress, SessionRecord>> {
        self.check()?;
        Ok(self.sessions())
    }

    fn upsert(&self, mac: &MacAddress, record: &SessionRecord) -> coinlink_core::Result<()> {
        self.check()?;
        let mut stored = record.clone();
        stored.last_traffic = None;
        self.tables.lock().sessions.insert(*mac, stored);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, mac: &MacAddress) -> coinlink_core::Result<()> {
        self.check()?;
        self.tables.lock().sessions.remove(mac);
        Ok(())
    }

    fn record_sale(&self, mac: &MacAddress, amount: u64, at: DateTime<Utc>) -> coinlink_core::Result<()> {
        self.check()?;
        self.tables.lock().sales.push((*mac, amount, at));
        Ok(())
    }

    fn sum_sales_since(&self, since: DateTime<Utc>) -> coinlink_core::Result<u64> {
        self.check()?;
        Ok(self
            .tables
            .lock()
            .sales
            .iter()
            .filter(|(_, _, at)| *at >= since)
            .map(|(_, amount, _)| *amount)
            .sum())
    }

    fn reset_free_claims(&self) -> coinlink_core::Result<()> {
        self.check()?;
        for record in self.tables.lock().sessions.values_mut() {
            record.free_claimed = false;
        }
        Ok(())
    }
}

/// [`SettingsStore`] holding the last saved document.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    saved: Mutex<Option<Settings>>,
    saves: AtomicUsize,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            saved: Mutex::new(Some(settings)),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> coinlink_core::Result<Settings> {
        Ok(self.saved.lock().clone().unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> coinlink_core::Result<()> {
        *self.saved.lock() = Some(settings.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn mac() -> MacAddress {
        "aa:bb:cc:dd:ee:ff".parse().unwrap()
    }

    #[test]
    fn test_failing_store_rejects_writes() {
        let store = MemoryPersistence::new();
        store.set_failing(true);
        assert!(store.upsert(&mac(), &SessionRecord::new(Utc::now())).is_err());
        store.set_failing(false);
        assert!(store.upsert(&mac(), &SessionRecord::new(Utc::now())).is_ok());
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn test_sales_sum() {
        let store = MemoryPersistence::new();
        let now = Utc::now();
        store.record_sale(&mac(), 5, now - Duration::days(2)).unwrap();
        store.record_sale(&mac(), 10, now).unwrap();
        assert_eq!(store.sum_sales_since(now - Duration::days(1)).unwrap(), 10);
    }

    #[test]
    fn test_settings_store_defaults_until_saved() {
        let store = MemorySettingsStore::new();
        assert_eq!(store.load().unwrap(), Settings::default());

        let settings = Settings {
            slot_timeout: 45,
            ..Settings::default()
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap().slot_timeout, 45);
        assert_eq!(store.save_count(), 1);
    }
}
