//! [`Persistence`] over SQLite for the synchronous schedulers.
//!
//! Callers are plain OS threads (or, in the request layer, tasks on a
//! multi-threaded runtime). Each call blocks on the repositories through a
//! captured runtime [`Handle`].

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use coinlink_core::{MacAddress, Persistence, SessionRecord};
use tokio::runtime::Handle;
use tokio::task::block_in_place;
use tracing::{debug, warn};

use crate::connection::Database;
use crate::error::{StorageError, StorageResult};
use crate::models::SessionRow;
use crate::models::session::{from_sql_int, to_sql_int};
use crate::repositories::{
    SaleRepository, SessionRepository, SqliteSaleRepository, SqliteSessionRepository,
};

pub struct SqlitePersistence {
    sessions: SqliteSessionRepository,
    sales: SqliteSaleRepository,
    handle: Handle,
}

impl SqlitePersistence {
    /// Bind to `db` and the runtime this is called from.
    ///
    /// # Errors
    /// Fails outside a tokio runtime.
    pub fn new(db: &Database) -> StorageResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| StorageError::Configuration(format!("no async runtime: {e}")))?;
        Ok(Self::with_handle(db, handle))
    }

    pub fn with_handle(db: &Database, handle: Handle) -> Self {
        Self {
            sessions: SqliteSessionRepository::new(db.pool().clone()),
            sales: SqliteSaleRepository::new(db.pool().clone()),
            handle,
        }
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        if Handle::try_current().is_ok() {
            block_in_place(|| self.handle.block_on(future))
        } else {
            self.handle.block_on(future)
        }
    }
}

impl Persistence for SqlitePersistence {
    fn load_all_sessions(&self) -> coinlink_core::Result<HashMap<MacAddress, SessionRecord>> {
        let rows = self.block_on(self.sessions.find_all())?;
        let total = rows.len();

        let sessions: HashMap<_, _> = rows
            .into_iter()
            .filter_map(|row| match row.into_record() {
                Ok(pair) => Some(pair),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable session row");
                    None
                }
            })
            .collect();

        debug!(loaded = sessions.len(), total, "sessions loaded");
        Ok(sessions)
    }

    fn upsert(&self, mac: &MacAddress, record: &SessionRecord) -> coinlink_core::Result<()> {
        let row = SessionRow::from_record(mac, record);
        self.block_on(self.sessions.upsert(&row))?;
        Ok(())
    }

    fn delete(&self, mac: &MacAddress) -> coinlink_core::Result<()> {
        let key = mac.to_string();
        if !self.block_on(self.sessions.delete(&key))? {
            debug!(mac = %mac, "delete of absent session row");
        }
        Ok(())
    }

    fn record_sale(&self, mac: &MacAddress, amount: u64, at: DateTime<Utc>) -> coinlink_core::Result<()> {
        let key = mac.to_string();
        self.block_on(self.sales.record(&key, to_sql_int(amount), at))?;
        Ok(())
    }

    fn sum_sales_since(&self, since: DateTime<Utc>) -> coinlink_core::Result<u64> {
        Ok(from_sql_int(self.block_on(self.sales.sum_since(since))?))
    }

    fn reset_free_claims(&self) -> coinlink_core::Result<()> {
        let changed = self.block_on(self.sessions.reset_free_claims())?;
        debug!(changed, "free claims reset");
        Ok(())
    }
}
