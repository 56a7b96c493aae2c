//! In-memory session table with one lock per device.
//!
//! The map itself is only locked long enough to find or insert an entry.
//! Every read-modify-write of a record, including its persistence call, runs
//! under that record's own mutex. Removed records are tombstoned before they
//! leave the map so a caller still holding the entry cannot write them back.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use coinlink_core::{MacAddress, Persistence, SessionRecord};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

/// Result of a record mutation, telling the store whether to write through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Update<R> {
    /// Mirror the record to persistence before releasing the lock.
    Persist(R),
    /// In-memory only (counters, baselines, rejected requests).
    Transient(R),
}

impl<R> Update<R> {
    fn split(self) -> (R, bool) {
        match self {
            Update::Persist(value) => (value, true),
            Update::Transient(value) => (value, false),
        }
    }
}

#[derive(Debug)]
struct Entry {
    record: SessionRecord,
    deleted: bool,
}

type Slot = Arc<Mutex<Entry>>;

pub struct SessionStore {
    entries: RwLock<HashMap<MacAddress, Slot>>,
    persistence: Arc<dyn Persistence>,
}

impl SessionStore {
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            persistence,
        }
    }

    /// Populate from persistence.
    ///
    /// # Errors
    /// Returns the persistence error if the rows cannot be read.
    pub fn load(persistence: Arc<dyn Persistence>) -> coinlink_core::Result<Self> {
        let rows = persistence.load_all_sessions()?;
        info!(sessions = rows.len(), "session table loaded");
        let entries = rows
            .into_iter()
            .map(|(mac, record)| {
                let entry = Entry {
                    record,
                    deleted: false,
                };
                (mac, Arc::new(Mutex::new(entry)))
            })
            .collect();
        Ok(Self {
            entries: RwLock::new(entries),
            persistence,
        })
    }

    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.persistence
    }

    fn entry(&self, mac: &MacAddress) -> Option<Slot> {
        self.entries.read().get(mac).cloned()
    }

    fn entry_or_insert(&self, mac: &MacAddress, now: DateTime<Utc>) -> (Slot, bool) {
        if let Some(entry) = self.entry(mac) {
            return (entry, false);
        }
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(mac) {
            return (entry.clone(), false);
        }
        let entry = Arc::new(Mutex::new(Entry {
            record: SessionRecord::new(now),
            deleted: false,
        }));
        entries.insert(*mac, entry.clone());
        debug!(mac = %mac, "session created");
        (entry, true)
    }

    fn write_through(&self, mac: &MacAddress, record: &SessionRecord) {
        if let Err(e) = self.persistence.upsert(mac, record) {
            error!(mac = %mac, error = %e, "failed to persist session");
        }
    }

    /// Mutate an existing record under its lock.
    ///
    /// Returns `None` if the device is unknown or was removed.
    pub fn update<R>(
        &self,
        mac: &MacAddress,
        f: impl FnOnce(&mut SessionRecord) -> Update<R>,
    ) -> Option<R> {
        let entry = self.entry(mac)?;
        let mut guard = entry.lock();
        if guard.deleted {
            return None;
        }
        let (value, persist) = f(&mut guard.record).split();
        if persist {
            self.write_through(mac, &guard.record);
        }
        Some(value)
    }

    /// Mutate a record, creating it first if the device is new.
    ///
    /// A newly created record is always written through.
    pub fn upsert_with<R>(
        &self,
        mac: &MacAddress,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut SessionRecord) -> Update<R>,
    ) -> R {
        loop {
            let (entry, created) = self.entry_or_insert(mac, now);
            let mut guard = entry.lock();
            if guard.deleted {
                // Lost a race with remove(); the map no longer holds this entry.
                continue;
            }
            let (value, persist) = f(&mut guard.record).split();
            if persist || created {
                self.write_through(mac, &guard.record);
            }
            return value;
        }
    }

    /// Copy of a record.
    pub fn get(&self, mac: &MacAddress) -> Option<SessionRecord> {
        let entry = self.entry(mac)?;
        let guard = entry.lock();
        (!guard.deleted).then(|| guard.record.clone())
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.entries.read().contains_key(mac)
    }

    /// Every known device.
    pub fn macs(&self) -> Vec<MacAddress> {
        self.entries.read().keys().copied().collect()
    }

    /// Devices currently connected, with their last known address.
    pub fn connected(&self) -> Vec<(MacAddress, Option<Ipv4Addr>)> {
        let entries: Vec<(MacAddress, Slot)> = self
            .entries
            .read()
            .iter()
            .map(|(mac, entry)| (*mac, entry.clone()))
            .collect();

        entries
            .into_iter()
            .filter_map(|(mac, entry)| {
                let guard = entry.lock();
                (!guard.deleted && guard.record.status.is_connected())
                    .then_some((mac, guard.record.ip))
            })
            .collect()
    }

    /// Remove a record from memory and persistence.
    ///
    /// Waits for any in-flight mutation of the record to finish, then
    /// tombstones it. Returns the final record.
    pub fn remove(&self, mac: &MacAddress) -> Option<SessionRecord> {
        let entry = self.entries.write().remove(mac)?;
        let record = {
            let mut guard = entry.lock();
            guard.deleted = true;
            guard.record.clone()
        };
        if let Err(e) = self.persistence.delete(mac) {
            error!(mac = %mac, error = %e, "failed to delete session");
        }
        info!(mac = %mac, "session removed");
        Some(record)
    }

    /// Write every connected record through. Returns how many were written.
    pub fn persist_connected(&self) -> usize {
        let mut written = 0;
        for mac in self.macs() {
            let persisted = self.update(&mac, |record| {
                if record.status.is_connected() {
                    Update::Persist(true)
                } else {
                    Update::Transient(false)
                }
            });
            if persisted == Some(true) {
                written += 1;
            }
        }
        debug!(written, "connected sessions resynced");
        written
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinlink_core::SessionStatus;
    use coinlink_storage::MemoryPersistence;
    use std::thread;

    fn mac(last: u8) -> MacAddress {
        MacAddress::from_octets([2, 0, 0, 0, 0, last])
    }

    fn store() -> (SessionStore, Arc<MemoryPersistence>) {
        let persistence = Arc::new(MemoryPersistence::new());
        (SessionStore::new(persistence.clone()), persistence)
    }

    #[test]
    fn test_transient_updates_skip_persistence() {
        let (store, persistence) = store();
        store.upsert_with(&mac(1), Utc::now(), |_| Update::Transient(()));
        assert_eq!(persistence.write_count(), 1);

        store.update(&mac(1), |r| {
            r.balance = 5;
            Update::Transient(())
        });
        assert_eq!(persistence.write_count(), 1);
        assert_eq!(persistence.session(&mac(1)).unwrap().balance, 0);

        store.update(&mac(1), |r| {
            r.balance = 7;
            Update::Persist(())
        });
        assert_eq!(persistence.session(&mac(1)).unwrap().balance, 7);
    }

    #[test]
    fn test_update_unknown_device() {
        let (store, _) = store();
        assert_eq!(store.update(&mac(9), |_| Update::Persist(1)), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_load_and_remove() {
        let mut record = SessionRecord::new(Utc::now());
        record.status = SessionStatus::Connected;
        record.time_remaining = 60;
        let persistence = Arc::new(MemoryPersistence::with_sessions([(mac(1), record)]));
        let store = SessionStore::load(persistence.clone()).unwrap();

        assert_eq!(store.connected(), vec![(mac(1), None)]);
        assert_eq!(store.remove(&mac(1)).unwrap().time_remaining, 60);
        assert!(store.get(&mac(1)).is_none());
        assert!(persistence.session(&mac(1)).is_none());
        assert!(store.remove(&mac(1)).is_none());
    }

    #[test]
    fn test_removed_record_is_not_resurrected() {
        let (store, persistence) = store();
        store.upsert_with(&mac(1), Utc::now(), |_| Update::Transient(()));
        let entry = store.entry(&mac(1)).unwrap();

        store.remove(&mac(1));
        // A writer that fetched the entry before removal sees the tombstone.
        assert!(entry.lock().deleted);
        assert_eq!(store.update(&mac(1), |_| Update::Persist(())), None);
        assert!(persistence.session(&mac(1)).is_none());
    }

    #[test]
    fn test_concurrent_updates_are_serialized() {
        let (store, _) = store();
        let store = Arc::new(store);
        store.upsert_with(&mac(1), Utc::now(), |_| Update::Transient(()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..250 {
                        store.update(&mac(1), |r| {
                            r.balance += 1;
                            Update::Transient(())
                        });
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get(&mac(1)).unwrap().balance, 1000);
    }

    #[test]
    fn test_persist_connected_only_writes_connected() {
        let (store, persistence) = store();
        let now = Utc::now();
        store.upsert_with(&mac(1), now, |r| {
            r.time_remaining = 10;
            r.status = SessionStatus::Connected;
            Update::Transient(())
        });
        store.upsert_with(&mac(2), now, |_| Update::Transient(()));
        let before = persistence.write_count();

        assert_eq!(store.persist_connected(), 1);
        assert_eq!(persistence.write_count(), before + 1);
    }

    #[test]
    fn test_persistence_failure_keeps_memory_state() {
        let (store, persistence) = store();
        persistence.set_failing(true);
        store.upsert_with(&mac(1), Utc::now(), |r| {
            r.balance = 3;
            Update::Persist(())
        });
        assert_eq!(store.get(&mac(1)).unwrap().balance, 3);
    }
}
