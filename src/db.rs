//! SQLite persistence gateway.
//!
//! One table, one row per listing URL. The upsert is a single conditional
//! statement so that two concurrent cycles can never clobber `created_at`
//! or `notified_at`, and the notification claim is a conditional update
//! that only one caller can win.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::models::{Listing, ScrapedListing};

const CREATE_TABLE_SQL: &str = "
CREATE TABLE IF NOT EXISTS listings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id TEXT NOT NULL,
    url TEXT UNIQUE NOT NULL,
    address TEXT,
    rooms INTEGER,
    floor INTEGER,
    price REAL,
    area TEXT,
    description TEXT,
    scraped_at TEXT NOT NULL,
    notified_at TEXT,
    is_active BOOLEAN NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

const UPSERT_SQL: &str = "
INSERT INTO listings
    (site_id, url, address, rooms, floor, price, area, description,
     scraped_at, is_active, created_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(url) DO UPDATE SET
    site_id     = excluded.site_id,
    address     = excluded.address,
    rooms       = excluded.rooms,
    floor       = excluded.floor,
    price       = excluded.price,
    area        = excluded.area,
    description = excluded.description,
    scraped_at  = excluded.scraped_at,
    is_active   = excluded.is_active,
    updated_at  = excluded.updated_at
RETURNING id";

/// Handle to the listings store. Cheap to clone; all clones share one pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if necessary) the database file and ensure the schema
    /// exists. Parent directories are created as needed.
    pub async fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database at {path}"))?;
        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// In-memory database, one shared connection so the schema survives.
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE_SQL)
            .execute(&self.pool)
            .await
            .context("Failed to create listings table")?;
        Ok(())
    }

    /// Insert a listing, or refresh the existing row with the same URL.
    ///
    /// On conflict every descriptive field is overwritten, but `created_at`
    /// and `notified_at` keep their original values. Returns the row id.
    pub async fn upsert(&self, listing: &ScrapedListing) -> Result<i64> {
        let now = Utc::now();
        let id = sqlx::query_scalar::<_, i64>(UPSERT_SQL)
            .bind(&listing.site_id)
            .bind(&listing.url)
            .bind(&listing.address)
            .bind(listing.rooms)
            .bind(listing.floor)
            .bind(listing.price)
            .bind(&listing.area)
            .bind(&listing.description)
            .bind(listing.scraped_at)
            .bind(true)
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to upsert listing {}", listing.url))?;
        Ok(id)
    }

    /// Whether a listing URL is already stored.
    pub async fn is_duplicate(&self, url: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM listings WHERE url = ?")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists > 0)
    }

    /// Listings scraped within the last `hours` that have not been notified.
    pub async fn find_unnotified_since(&self, hours: i64) -> Result<Vec<Listing>> {
        let cutoff = Utc::now() - Duration::hours(hours);
        let rows = sqlx::query_as::<_, Listing>(
            "SELECT * FROM listings WHERE scraped_at > ? AND notified_at IS NULL",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Claim a listing for notification by setting `notified_at`.
    ///
    /// The update only applies when `notified_at` is still null, so of any
    /// number of concurrent callers exactly one sees `true`.
    pub async fn mark_notified(&self, id: i64) -> Result<bool> {
        let result =
            sqlx::query("UPDATE listings SET notified_at = ? WHERE id = ? AND notified_at IS NULL")
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Release a notification claim after a failed send so the listing is
    /// retried on its next eligible cycle.
    pub async fn clear_notified(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE listings SET notified_at = NULL WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn find_by_url(&self, url: &str) -> Result<Option<Listing>> {
        let row = sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Most recently scraped listings, newest first.
    pub async fn find_recent(&self, limit: i64) -> Result<Vec<Listing>> {
        let rows =
            sqlx::query_as::<_, Listing>("SELECT * FROM listings ORDER BY scraped_at DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(url: &str) -> ScrapedListing {
        ScrapedListing {
            site_id: "test_12345678".to_string(),
            url: url.to_string(),
            address: Some("Hauptstraße 5, Mitte".to_string()),
            rooms: Some(3),
            floor: Some(2),
            price: Some(1200.0),
            area: Some("Mitte".to_string()),
            description: None,
            scraped_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_twice_keeps_one_row_and_created_at() {
        let db = Database::open_in_memory().await.unwrap();
        let listing = sample("https://example.com/expose/1");

        let id1 = db.upsert(&listing).await.unwrap();
        let first = db.find_by_url(&listing.url).await.unwrap().unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let mut updated = listing.clone();
        updated.price = Some(1250.0);
        let id2 = db.upsert(&updated).await.unwrap();
        let second = db.find_by_url(&listing.url).await.unwrap().unwrap();

        assert_eq!(id1, id2);
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at > first.updated_at);
        assert_eq!(second.price, Some(1250.0));
    }

    #[tokio::test]
    async fn upsert_never_resets_notified_at() {
        let db = Database::open_in_memory().await.unwrap();
        let listing = sample("https://example.com/expose/2");

        let id = db.upsert(&listing).await.unwrap();
        assert!(db.mark_notified(id).await.unwrap());

        db.upsert(&listing).await.unwrap();
        let row = db.find_by_url(&listing.url).await.unwrap().unwrap();
        assert!(row.notified_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_check() {
        let db = Database::open_in_memory().await.unwrap();
        let listing = sample("https://example.com/expose/3");

        assert!(!db.is_duplicate(&listing.url).await.unwrap());
        db.upsert(&listing).await.unwrap();
        assert!(db.is_duplicate(&listing.url).await.unwrap());
    }

    #[tokio::test]
    async fn unnotified_sweep_excludes_old_and_notified_rows() {
        let db = Database::open_in_memory().await.unwrap();

        let fresh = sample("https://example.com/expose/4");
        let fresh_id = db.upsert(&fresh).await.unwrap();

        let mut stale = sample("https://example.com/expose/5");
        stale.scraped_at = Utc::now() - Duration::hours(25);
        db.upsert(&stale).await.unwrap();

        let mut notified = sample("https://example.com/expose/6");
        notified.scraped_at = Utc::now();
        let notified_id = db.upsert(&notified).await.unwrap();
        db.mark_notified(notified_id).await.unwrap();

        let rows = db.find_unnotified_since(24).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, fresh_id);
    }

    #[tokio::test]
    async fn notification_claim_has_one_winner() {
        let db = Database::open_in_memory().await.unwrap();
        let id = db.upsert(&sample("https://example.com/expose/7")).await.unwrap();

        assert!(db.mark_notified(id).await.unwrap());
        assert!(!db.mark_notified(id).await.unwrap());

        db.clear_notified(id).await.unwrap();
        assert!(db.mark_notified(id).await.unwrap());
    }

    #[tokio::test]
    async fn recent_listings_newest_first() {
        let db = Database::open_in_memory().await.unwrap();

        let mut older = sample("https://example.com/expose/8");
        older.scraped_at = Utc::now() - Duration::hours(2);
        db.upsert(&older).await.unwrap();

        let newer = sample("https://example.com/expose/9");
        db.upsert(&newer).await.unwrap();

        let rows = db.find_recent(5).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].url, newer.url);
        assert_eq!(rows[1].url, older.url);
    }
}
