use crate::models::ScrapedListing;
use anyhow::Result;
use async_trait::async_trait;

/// Common trait for all listing scrapers.
/// New sources plug in by implementing this and joining the startup list.
#[async_trait]
pub trait Scraper: Send + Sync {
    /// Fetch listings from the source, up to the per-cycle page cap.
    async fn scrape(&self) -> Result<Vec<ScrapedListing>>;

    /// Name of the source, for logging.
    fn name(&self) -> &'static str;
}
