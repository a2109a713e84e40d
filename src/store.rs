use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::utils::error::{AppError, Result};

/// One persisted price observation. `compare_price` is the un-discounted
/// compare-at price captured while the item was on sale, when the shop
/// exposes one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRecord {
    pub item: String,
    pub date: NaiveDate,
    pub price: Decimal,
    pub compare_price: Option<Decimal>,
}

/// Durable (item, date, price) history, one row per item per calendar day.
///
/// Prices are stored as decimal strings so values round-trip exactly.
/// A single run is the only writer, so the pool is capped at one connection.
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::connect(options).await
    }

    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(options).await
    }

    async fn connect(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = HistoryStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS price_history (
                item          TEXT NOT NULL,
                date          TEXT NOT NULL,
                price         TEXT NOT NULL,
                compare_price TEXT,
                PRIMARY KEY (item, date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace the record for (item, date). Re-recording the same
    /// item on the same day keeps only the newest observation: last write
    /// wins, including clearing the compare-at price when a sale ends.
    pub async fn record(
        &self,
        item: &str,
        date: NaiveDate,
        price: Decimal,
        compare_price: Option<Decimal>,
    ) -> Result<()> {
        debug!(item, %date, %price, on_sale = compare_price.is_some(), "recording price");
        sqlx::query(
            r#"
            INSERT INTO price_history (item, date, price, compare_price)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (item, date) DO UPDATE
            SET price = excluded.price, compare_price = excluded.compare_price
            "#,
        )
        .bind(item)
        .bind(date)
        .bind(price.to_string())
        .bind(compare_price.map(|p| p.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All records for an item, ordered by date ascending.
    pub async fn history(&self, item: &str) -> Result<Vec<PriceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT item, date, price, compare_price
            FROM price_history
            WHERE item = ?
            ORDER BY date ASC
            "#,
        )
        .bind(item)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let item: String = row.try_get("item")?;
                let date: NaiveDate = row.try_get("date")?;
                let raw_price: String = row.try_get("price")?;
                let price = Decimal::from_str(&raw_price).map_err(|e| {
                    AppError::Store(format!(
                        "corrupt price '{}' for {} on {}: {}",
                        raw_price, item, date, e
                    ))
                })?;
                let raw_compare: Option<String> = row.try_get("compare_price")?;
                let compare_price = raw_compare
                    .map(|raw| {
                        Decimal::from_str(&raw).map_err(|e| {
                            AppError::Store(format!(
                                "corrupt compare price '{}' for {} on {}: {}",
                                raw, item, date, e
                            ))
                        })
                    })
                    .transpose()?;
                Ok(PriceRecord {
                    item,
                    date,
                    price,
                    compare_price,
                })
            })
            .collect()
    }
}
