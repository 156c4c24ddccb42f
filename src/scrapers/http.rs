use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use tracing::{debug, error};

/// Fixed pool of browser User-Agent strings, rotated per request.
const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Number of additional attempts after the first failed fetch.
const RETRIES: u32 = 2;

/// HTTP fetcher shared by all scrapers.
///
/// Every request rotates the User-Agent, waits a randomized 2–3 seconds
/// first (politeness towards the target sites), runs under a 10 second
/// timeout and is retried with exponential backoff (1 s, 2 s).
pub struct PoliteClient {
    client: Client,
}

impl PoliteClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }

    /// Fetch a page body. Returns `None` once all retries are exhausted;
    /// failures are logged, not propagated.
    pub async fn fetch(&self, url: &str) -> Option<String> {
        for attempt in 0..=RETRIES {
            let delay = rand::rng().random_range(2.0..3.0);
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;

            let agent = USER_AGENTS[rand::rng().random_range(0..USER_AGENTS.len())];
            debug!("Fetching {} (attempt {})", url, attempt + 1);

            let result = self
                .client
                .get(url)
                .header(USER_AGENT, agent)
                .send()
                .await
                .and_then(|response| response.error_for_status());

            match result {
                Ok(response) => match response.text().await {
                    Ok(body) => return Some(body),
                    Err(err) => error!("Error reading body of {}: {}", url, err),
                },
                Err(err) => error!("Error fetching {}: {}", url, err),
            }

            if attempt < RETRIES {
                let backoff = 1u64 << attempt;
                debug!("Retrying in {}s …", backoff);
                tokio::time::sleep(Duration::from_secs(backoff)).await;
            }
        }
        None
    }
}
