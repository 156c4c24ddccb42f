//! Periodic scrape → dedupe → filter → notify orchestration.
//!
//! Adapters run sequentially within a cycle so the per-request politeness
//! delay stays meaningful. Overlapping cycles (timer + manual trigger) are
//! allowed; the conditional notification claim in the store guarantees at
//! most one of them announces any given listing.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::db::Database;
use crate::filters::SearchCriteria;
use crate::notifier::{should_notify, Notifier, RECENCY_HOURS};
use crate::scrapers::Scraper;

/// Counts emitted at the end of each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    /// Adapters that completed without an adapter-level error.
    pub scrapers_run: usize,
    pub new_listings: usize,
    pub notified: usize,
}

struct Inner {
    scrapers: Vec<Box<dyn Scraper>>,
    db: Database,
    criteria: SearchCriteria,
    notifier: Notifier,
    shutdown: watch::Sender<bool>,
}

/// Cycle orchestrator handle. Cheap to clone; all clones drive the same
/// underlying state.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        scrapers: Vec<Box<dyn Scraper>>,
        db: Database,
        criteria: SearchCriteria,
        notifier: Notifier,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                scrapers,
                db,
                criteria,
                notifier,
                shutdown,
            }),
        }
    }

    /// Execute one full scrape → filter → notify cycle.
    ///
    /// Adapter failures are logged and tolerated; persistence failures
    /// abort the cycle.
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        info!("=== Scrape cycle started at {} ===", Utc::now());
        let mut summary = CycleSummary {
            scrapers_run: 0,
            new_listings: 0,
            notified: 0,
        };

        for scraper in &self.inner.scrapers {
            match scraper.scrape().await {
                Ok(listings) => {
                    info!("{} returned {} listings", scraper.name(), listings.len());
                    for listing in &listings {
                        if !self.inner.db.is_duplicate(&listing.url).await? {
                            self.inner.db.upsert(listing).await?;
                            summary.new_listings += 1;
                        }
                    }
                    summary.scrapers_run += 1;
                }
                Err(err) => {
                    error!("Error running scraper {}: {}", scraper.name(), err);
                }
            }
        }

        let candidates = self.inner.db.find_unnotified_since(RECENCY_HOURS).await?;
        for listing in candidates {
            if !self.inner.criteria.matches(&listing) || !should_notify(&listing, RECENCY_HOURS) {
                continue;
            }
            // Claim before sending; the conditional update has exactly one
            // winner, so concurrent cycles cannot double-announce.
            if !self.inner.db.mark_notified(listing.id).await? {
                continue;
            }
            if self.inner.notifier.send(&listing).await {
                summary.notified += 1;
            } else {
                // Release the claim so the listing is retried while it
                // stays inside the recency window.
                self.inner.db.clear_notified(listing.id).await?;
            }
        }

        info!(
            "=== Cycle complete: {} scraped, {} new, {} notified ===",
            summary.scrapers_run, summary.new_listings, summary.notified
        );
        Ok(summary)
    }

    /// Start the periodic trigger. The first cycle runs one interval after
    /// startup; `stop` prevents new cycles without killing an in-flight one.
    pub fn start(&self, interval_minutes: u64) -> JoinHandle<()> {
        let scheduler = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        info!("Scheduler started — interval: {} minutes", interval_minutes);

        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(interval_minutes * 60));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately; consume it so the initial
            // cycle waits a full interval.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(err) = scheduler.run_cycle().await {
                            error!("Scrape cycle failed: {:#}", err);
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("Scheduler stopped.");
                        break;
                    }
                }
            }
        })
    }

    /// Run a cycle out-of-band without blocking the caller.
    pub fn trigger_now(&self) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            if let Err(err) = scheduler.run_cycle().await {
                error!("Manual scrape cycle failed: {:#}", err);
            }
        });
        info!("Manual scrape cycle triggered.");
    }

    /// Signal the periodic trigger to stop starting new cycles.
    pub fn stop(&self) {
        let _ = self.inner.shutdown.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScrapedListing;
    use crate::notifier::Transport;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StaticScraper {
        name: &'static str,
        listings: Vec<ScrapedListing>,
    }

    #[async_trait]
    impl Scraper for StaticScraper {
        async fn scrape(&self) -> Result<Vec<ScrapedListing>> {
            Ok(self.listings.clone())
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    struct FailingScraper;

    #[async_trait]
    impl Scraper for FailingScraper {
        async fn scrape(&self) -> Result<Vec<ScrapedListing>> {
            bail!("site unreachable")
        }

        fn name(&self) -> &'static str {
            "Failing"
        }
    }

    struct SharedTransport {
        sent: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    #[async_trait]
    impl Transport for SharedTransport {
        async fn send_text(&self, text: &str) -> Result<()> {
            if self.fail {
                bail!("transport down");
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn matching_listing(url: &str) -> ScrapedListing {
        ScrapedListing {
            site_id: format!("test_{url}"),
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
    async fn cycle_stores_new_and_notifies_once() {
        let db = Database::open_in_memory().await.unwrap();

        // Already-known listing, already announced.
        let known = matching_listing("https://example.com/expose/known");
        let known_id = db.upsert(&known).await.unwrap();
        db.mark_notified(known_id).await.unwrap();

        let fresh = matching_listing("https://example.com/expose/fresh");
        let sent = Arc::new(Mutex::new(Vec::new()));
        let notifier = Notifier::new(Box::new(SharedTransport {
            sent: Arc::clone(&sent),
            fail: false,
        }));

        let scheduler = Scheduler::new(
            vec![
                Box::new(StaticScraper {
                    name: "Fresh",
                    listings: vec![fresh.clone()],
                }),
                Box::new(StaticScraper {
                    name: "Duplicate",
                    listings: vec![known.clone()],
                }),
            ],
            db.clone(),
            SearchCriteria::default(),
            notifier,
        );

        let summary = scheduler.run_cycle().await.unwrap();
        assert_eq!(summary.scrapers_run, 2);
        assert_eq!(summary.new_listings, 1);
        assert_eq!(summary.notified, 1);
        assert_eq!(sent.lock().unwrap().len(), 1);

        let stored = db.find_by_url(&fresh.url).await.unwrap().unwrap();
        assert!(stored.notified_at.is_some());

        // Re-running changes nothing: no new rows, nothing to announce.
        let again = scheduler.run_cycle().await.unwrap();
        assert_eq!(again.new_listings, 0);
        assert_eq!(again.notified, 0);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn adapter_failure_does_not_abort_cycle() {
        let db = Database::open_in_memory().await.unwrap();
        let notifier = Notifier::new(Box::new(SharedTransport {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }));

        let scheduler = Scheduler::new(
            vec![
                Box::new(FailingScraper),
                Box::new(StaticScraper {
                    name: "Working",
                    listings: vec![matching_listing("https://example.com/expose/1")],
                }),
            ],
            db,
            SearchCriteria::default(),
            notifier,
        );

        let summary = scheduler.run_cycle().await.unwrap();
        assert_eq!(summary.scrapers_run, 1);
        assert_eq!(summary.new_listings, 1);
        assert_eq!(summary.notified, 1);
    }

    #[tokio::test]
    async fn failed_send_releases_claim_for_retry() {
        let db = Database::open_in_memory().await.unwrap();
        let listing = matching_listing("https://example.com/expose/retry");

        let broken = Notifier::new(Box::new(SharedTransport {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }));
        let scheduler = Scheduler::new(
            vec![Box::new(StaticScraper {
                name: "Only",
                listings: vec![listing.clone()],
            })],
            db.clone(),
            SearchCriteria::default(),
            broken,
        );

        let summary = scheduler.run_cycle().await.unwrap();
        assert_eq!(summary.notified, 0);
        let row = db.find_by_url(&listing.url).await.unwrap().unwrap();
        assert!(row.notified_at.is_none());

        // A later cycle with a healthy transport picks it up again.
        let sent = Arc::new(Mutex::new(Vec::new()));
        let healthy = Notifier::new(Box::new(SharedTransport {
            sent: Arc::clone(&sent),
            fail: false,
        }));
        let scheduler = Scheduler::new(Vec::new(), db.clone(), SearchCriteria::default(), healthy);
        let summary = scheduler.run_cycle().await.unwrap();
        assert_eq!(summary.notified, 1);
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn non_matching_listing_is_stored_but_not_announced() {
        let db = Database::open_in_memory().await.unwrap();
        let mut expensive = matching_listing("https://example.com/expose/expensive");
        expensive.price = Some(2500.0);

        let sent = Arc::new(Mutex::new(Vec::new()));
        let notifier = Notifier::new(Box::new(SharedTransport {
            sent: Arc::clone(&sent),
            fail: false,
        }));
        let scheduler = Scheduler::new(
            vec![Box::new(StaticScraper {
                name: "Only",
                listings: vec![expensive.clone()],
            })],
            db.clone(),
            SearchCriteria::default(),
            notifier,
        );

        let summary = scheduler.run_cycle().await.unwrap();
        assert_eq!(summary.new_listings, 1);
        assert_eq!(summary.notified, 0);
        assert!(sent.lock().unwrap().is_empty());
        assert!(db.is_duplicate(&expensive.url).await.unwrap());
    }
}
