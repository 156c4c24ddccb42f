use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::json;
use tracing::{error, info};

use crate::extract::format_price;
use crate::models::Listing;

/// Recency window: listings scraped longer ago than this are never
/// announced, even if still unnotified.
pub const RECENCY_HOURS: i64 = 24;

/// Outgoing message channel. The Telegram transport is the production
/// implementation; tests substitute a recording fake.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;
}

/// Sends Markdown messages to a fixed chat via the Telegram Bot HTTP API.
pub struct TelegramTransport {
    http: Client,
    api_url: String,
    chat_id: String,
}

impl TelegramTransport {
    pub fn new(token: &str, chat_id: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create Telegram HTTP client")?;
        Ok(Self {
            http,
            api_url: format!("https://api.telegram.org/bot{token}/sendMessage"),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_text(&self, text: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.api_url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .context("Telegram request failed")?;

        if !response.status().is_success() {
            bail!("Telegram API returned {}", response.status());
        }
        Ok(())
    }
}

/// Whether a listing warrants a notification: not yet notified, and scraped
/// within the last `hours` hours.
pub fn should_notify(listing: &Listing, hours: i64) -> bool {
    if listing.notified_at.is_some() {
        return false;
    }
    listing.scraped_at >= Utc::now() - Duration::hours(hours)
}

/// Build the announcement text for one listing. Absent fields render as
/// "N/A".
pub fn format_message(listing: &Listing) -> String {
    let address = listing.address.as_deref().unwrap_or("N/A");
    let rooms = listing
        .rooms
        .map_or_else(|| "N/A".to_string(), |r| r.to_string());
    let floor = listing
        .floor
        .map_or_else(|| "N/A".to_string(), |f| f.to_string());
    let price = listing
        .price
        .map_or_else(|| "N/A".to_string(), format_price);
    let area = listing.area.as_deref().unwrap_or("N/A");

    format!(
        "🏠 *New Flat Found!*\n\n\
         📍 *Address:* {address}\n\
         🛏️ *Rooms:* {rooms}\n\
         🏢 *Floor:* {floor}\n\
         💰 *Price:* {price}/month\n\
         📐 *Area:* {area}\n\n\
         🔗 [View Listing]({url})",
        url = listing.url
    )
}

/// Dispatches listing announcements through a [`Transport`].
pub struct Notifier {
    transport: Box<dyn Transport>,
}

impl Notifier {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send the announcement for one listing. Transport failures are logged
    /// and reported as `false`, never propagated.
    pub async fn send(&self, listing: &Listing) -> bool {
        let message = format_message(listing);
        match self.transport.send_text(&message).await {
            Ok(()) => {
                info!("Notification sent for listing: {}", listing.url);
                true
            }
            Err(err) => {
                error!("Error sending notification for {}: {}", listing.url, err);
                false
            }
        }
    }

    /// Send a free-form message (startup summary and the like).
    pub async fn send_text(&self, text: &str) -> bool {
        match self.transport.send_text(text).await {
            Ok(()) => true,
            Err(err) => {
                error!("Error sending message: {}", err);
                false
            }
        }
    }
}
