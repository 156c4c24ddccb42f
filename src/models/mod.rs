use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A listing as produced by a site scraper, before it has been stored.
///
/// Optional fields stay `None` when a page fragment could not be parsed;
/// downstream filtering treats missing values as "no objection".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapedListing {
    /// Site-scoped identifier (provider object ID or URL hash). Not
    /// globally unique across sites.
    pub site_id: String,
    /// Canonical listing URL. Globally unique key in the store.
    pub url: String,
    pub address: Option<String>,
    pub rooms: Option<i64>,
    pub floor: Option<i64>,
    pub price: Option<f64>,
    pub area: Option<String>,
    pub description: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl ScrapedListing {
    /// Minimum bar for storage: both the URL and the site ID must be set.
    pub fn is_valid(&self) -> bool {
        !self.url.is_empty() && !self.site_id.is_empty()
    }
}

/// A stored listing row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Listing {
    pub id: i64,
    pub site_id: String,
    pub url: String,
    pub address: Option<String>,
    pub rooms: Option<i64>,
    pub floor: Option<i64>,
    pub price: Option<f64>,
    pub area: Option<String>,
    pub description: Option<String>,
    pub scraped_at: DateTime<Utc>,
    /// Set exactly once, when a notification for this row went out.
    pub notified_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
