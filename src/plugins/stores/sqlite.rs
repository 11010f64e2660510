use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::core::price_parser::parse_price;
use crate::models::{Listing, ListingId, Snapshot, StockStatus};
use crate::plugins::traits::SnapshotStore;
use crate::utils::error::StoreError;

const CREATE_LISTINGS: &str = r#"
CREATE TABLE IF NOT EXISTS listings (
    source_group TEXT NOT NULL,
    id TEXT NOT NULL,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    price_raw TEXT NOT NULL,
    in_stock BOOLEAN NULL,
    priority BOOLEAN NOT NULL DEFAULT 0,
    last_seen_at TEXT NOT NULL,
    PRIMARY KEY (source_group, id)
)
"#;

#[derive(Debug, FromRow)]
struct ListingRow {
    id: String,
    title: String,
    url: String,
    price_raw: String,
    in_stock: Option<bool>,
    priority: bool,
    source_group: String,
    last_seen_at: DateTime<Utc>,
}

impl ListingRow {
    fn into_listing(self) -> Option<Listing> {
        let id = match ListingId::from_url(&self.id) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(source_group = %self.source_group, error = %e, "Dropping stored listing with invalid id");
                return None;
            }
        };

        Some(Listing {
            id,
            price_numeric: parse_price(&self.price_raw),
            title: self.title,
            url: self.url,
            price_raw: self.price_raw,
            in_stock: StockStatus::from(self.in_stock),
            source_group: self.source_group,
            priority: self.priority,
            last_seen_at: self.last_seen_at,
        })
    }
}

/// Snapshots as rows of a single `listings` table, replaced per group in one transaction.
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_LISTINGS).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn load(&self, source_group: &str) -> Result<Snapshot, StoreError> {
        let rows: Vec<ListingRow> = sqlx::query_as(
            "SELECT id, title, url, price_raw, in_stock, priority, source_group, last_seen_at \
             FROM listings WHERE source_group = ?",
        )
        .bind(source_group)
        .fetch_all(&self.pool)
        .await?;

        let listings = rows.into_iter().filter_map(ListingRow::into_listing).collect();
        Ok(Snapshot::new(source_group, listings))
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM listings WHERE source_group = ?")
            .bind(snapshot.source_group())
            .execute(&mut *tx)
            .await?;

        for listing in snapshot.listings() {
            sqlx::query(
                "INSERT INTO listings \
                 (source_group, id, title, url, price_raw, in_stock, priority, last_seen_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(snapshot.source_group())
            .bind(listing.id.as_str())
            .bind(&listing.title)
            .bind(&listing.url)
            .bind(&listing.price_raw)
            .bind(Option::<bool>::from(listing.in_stock))
            .bind(listing.priority)
            .bind(listing.last_seen_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            source_group = snapshot.source_group(),
            listings = snapshot.len(),
            "Snapshot saved"
        );
        Ok(())
    }
}
