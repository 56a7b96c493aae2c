//! The kiosk's SQLite file.
//!
//! One database holds session rows and the sales ledger. It is opened once at
//! startup, migrated in place and shared by the request layer and the
//! scheduler threads through a small pool.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::ConnectOptions;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::info;

use crate::error::StorageResult;

/// Request layer plus the three schedulers.
pub const POOL_SIZE: u32 = 4;

/// How long a writer waits on SQLite's file lock.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open `path`, creating the file and its directory on first boot, and
    /// bring the schema up to date.
    ///
    /// The file runs in WAL mode with full fsync: power can drop at any time.
    ///
    /// # Errors
    /// Fails if the directory cannot be created, the file cannot be opened
    /// or a migration fails.
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(BUSY_TIMEOUT)
            .disable_statement_logging();

        let db = Self::connect(options, POOL_SIZE).await?;
        info!(path = %path.display(), "database ready");
        Ok(db)
    }

    /// Fresh migrated database that lives as long as the pool.
    pub async fn in_memory() -> StorageResult<Self> {
        // Every connection to :memory: is its own database.
        Self::connect(SqliteConnectOptions::from_str("sqlite::memory:")?, 1).await
    }

    async fn connect(options: SqliteConnectOptions, size: u32) -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(size)
            .connect_with(options)
            .await?;
        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Apply pending migrations from the workspace `migrations/` directory.
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
