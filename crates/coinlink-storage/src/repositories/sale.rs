#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::Sale;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Append-only sales ledger.
pub trait SaleRepository: Send + Sync {
    /// Record a sale. Returns the new row id.
    async fn record(&self, mac: &str, amount: i64, sold_at: DateTime<Utc>) -> StorageResult<i64>;

    /// Sum of amounts sold at or after `since`; 0 when there are none.
    async fn sum_since(&self, since: DateTime<Utc>) -> StorageResult<i64>;

    /// Sales of one device, newest first.
    async fn find_by_mac(&self, mac: &str) -> StorageResult<Vec<Sale>>;
}

pub struct SqliteSaleRepository {
    pool: SqlitePool,
}

impl SqliteSaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SaleRepository for SqliteSaleRepository {
    async fn record(&self, mac: &str, amount: i64, sold_at: DateTime<Utc>) -> StorageResult<i64> {
        let result = sqlx::query("INSERT INTO sales (mac, amount, sold_at) VALUES (?, ?, ?)")
            .bind(mac)
            .bind(amount)
            .bind(sold_at)
            .execute(&self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    async fn sum_since(&self, since: DateTime<Utc>) -> StorageResult<i64> {
        // Timestamps share one encoding, so text order is time order.
        let total: (i64,) =
            sqlx::query_as("SELECT COALESCE(SUM(amount), 0) FROM sales WHERE sold_at >= ?")
                .bind(since)
                .fetch_one(&self.pool)
                .await?;

        Ok(total.0)
    }

    async fn find_by_mac(&self, mac: &str) -> StorageResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT id, mac, amount, sold_at
            FROM sales
            WHERE mac = ?
            ORDER BY sold_at DESC, id DESC
            "#,
        )
        .bind(mac)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }
}
