#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::SessionRow;
use sqlx::SqlitePool;

/// Repository trait for session rows.
///
/// Rows are written whole; there are no partial updates.
pub trait SessionRepository: Send + Sync {
    async fn find_all(&self) -> StorageResult<Vec<SessionRow>>;

    async fn find_by_mac(&self, mac: &str) -> StorageResult<Option<SessionRow>>;

    /// Insert or overwrite the row keyed by `row.mac`.
    async fn upsert(&self, row: &SessionRow) -> StorageResult<()>;

    /// Delete a row. Returns `false` if there was none.
    async fn delete(&self, mac: &str) -> StorageResult<bool>;

    /// Clear `free_claimed` everywhere. Returns the number of rows changed.
    async fn reset_free_claims(&self) -> StorageResult<u64>;
}

/// SQLite implementation of SessionRepository
pub struct SqliteSessionRepository {
    pool: SqlitePool,
}

impl SqliteSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SessionRepository for SqliteSessionRepository {
    async fn find_all(&self) -> StorageResult<Vec<SessionRow>> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT mac, ip, time_remaining, status, balance,
                   free_claimed, points, last_active
            FROM sessions
            ORDER BY mac
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn find_by_mac(&self, mac: &str) -> StorageResult<Option<SessionRow>> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT mac, ip, time_remaining, status, balance,
                   free_claimed, points, last_active
            FROM sessions
            WHERE mac = ?
            "#,
        )
        .bind(mac)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn upsert(&self, row: &SessionRow) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (
                mac, ip, time_remaining, status, balance,
                free_claimed, points, last_active
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(mac) DO UPDATE SET
                ip = excluded.ip,
                time_remaining = excluded.time_remaining,
                status = excluded.status,
                balance = excluded.balance,
                free_claimed = excluded.free_claimed,
                points = excluded.points,
                last_active = excluded.last_active,
                updated_at = datetime('now')
            "#,
        )
        .bind(&row.mac)
        .bind(&row.ip)
        .bind(row.time_remaining)
        .bind(&row.status)
        .bind(row.balance)
        .bind(row.free_claimed)
        .bind(row.points)
        .bind(row.last_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, mac: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE mac = ?")
            .bind(mac)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn reset_free_claims(&self) -> StorageResult<u64> {
        let result = sqlx::query(
            "UPDATE sessions SET free_claimed = 0, updated_at = datetime('now') WHERE free_claimed = 1",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use chrono::Utc;

    fn row(mac: &str, status: &str, free_claimed: bool) -> SessionRow {
        SessionRow {
            mac: mac.to_string(),
            ip: Some("10.0.0.9".to_string()),
            time_remaining: 300,
            status: status.to_string(),
            balance: 0,
            free_claimed,
            points: 2.5,
            last_active: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_whole_row() {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteSessionRepository::new(db.pool().clone());

        repo.upsert(&row("aa:bb:cc:dd:ee:01", "connected", false))
            .await
            .unwrap();
        let mut updated = row("aa:bb:cc:dd:ee:01", "paused", true);
        updated.ip = None;
        updated.time_remaining = 12;
        repo.upsert(&updated).await.unwrap();

        let stored = repo.find_by_mac("aa:bb:cc:dd:ee:01").await.unwrap().unwrap();
        assert_eq!(stored.status, "paused");
        assert_eq!(stored.ip, None);
        assert_eq!(stored.time_remaining, 12);
        assert!(stored.free_claimed);
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteSessionRepository::new(db.pool().clone());

        repo.upsert(&row("aa:bb:cc:dd:ee:02", "new", false)).await.unwrap();
        assert!(repo.delete("aa:bb:cc:dd:ee:02").await.unwrap());
        assert!(!repo.delete("aa:bb:cc:dd:ee:02").await.unwrap());
        assert!(repo.find_by_mac("aa:bb:cc:dd:ee:02").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_free_claims() {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteSessionRepository::new(db.pool().clone());

        repo.upsert(&row("aa:bb:cc:dd:ee:03", "connected", true)).await.unwrap();
        repo.upsert(&row("aa:bb:cc:dd:ee:04", "expired", true)).await.unwrap();
        repo.upsert(&row("aa:bb:cc:dd:ee:05", "new", false)).await.unwrap();

        assert_eq!(repo.reset_free_claims().await.unwrap(), 2);
        assert!(repo.find_all().await.unwrap().iter().all(|r| !r.free_claimed));
    }

    #[tokio::test]
    async fn test_schema_rejects_unknown_status() {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteSessionRepository::new(db.pool().clone());

        assert!(repo.upsert(&row("aa:bb:cc:dd:ee:06", "suspended", false)).await.is_err());
    }
}
