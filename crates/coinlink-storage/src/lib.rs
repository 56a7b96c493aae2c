//! Storage layer for the coin-operated access controller.
//!
//! SQLite-backed persistence for session rows and the sales ledger, plus the
//! JSON settings file.
//!
//! # Architecture
//!
//! - [`Database`] - the kiosk's SQLite file, migrated on open
//! - [`SessionRepository`], [`SaleRepository`] - async data access traits
//! - [`SqlitePersistence`] - the synchronous [`Persistence`](coinlink_core::Persistence)
//!   contract over the repositories, for the scheduler threads
//! - [`FileSettingsStore`] - runtime settings document
//! - [`memory`] - in-memory doubles of both contracts
//!
//! # Example
//!
//! ```no_run
//! use coinlink_core::{Persistence, SessionRecord};
//! use coinlink_storage::{Database, SqlitePersistence};
//! use chrono::Utc;
//!
//! # #[tokio::main(flavor = "multi_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::open("/var/lib/coinlink/sessions.db").await?;
//! let persistence = SqlitePersistence::new(&db)?;
//!
//! let mac = "aa:bb:cc:dd:ee:ff".parse()?;
//! persistence.upsert(&mac, &SessionRecord::new(Utc::now()))?;
//! assert_eq!(persistence.load_all_sessions()?.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! All queries are parameterized; nothing is interpolated into SQL.

pub mod connection;
pub mod error;
pub mod memory;
pub mod models;
pub mod persistence;
pub mod repositories;
pub mod settings_store;

pub use connection::Database;
pub use error::{StorageError, StorageResult};
pub use memory::{MemoryPersistence, MemorySettingsStore};
pub use models::{Sale, SessionRow};
pub use persistence::SqlitePersistence;
pub use repositories::{
    SaleRepository, SessionRepository, SqliteSaleRepository, SqliteSessionRepository,
};
pub use settings_store::FileSettingsStore;
