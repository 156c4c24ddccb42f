//! Telegram chat interface: long-polling command loop.
//!
//! Commands only control the bot; scraping itself runs on the scheduler's
//! background task and is never awaited from a handler.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::db::Database;
use crate::extract::format_price;
use crate::filters::SearchCriteria;
use crate::scheduler::Scheduler;

const POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Telegram bot that exposes scraper controls via chat commands.
pub struct TelegramBot {
    http: Client,
    api_base: String,
    db: Database,
    criteria: SearchCriteria,
    scheduler: Scheduler,
}

impl TelegramBot {
    pub fn new(
        token: &str,
        db: Database,
        criteria: SearchCriteria,
        scheduler: Scheduler,
    ) -> Result<Self> {
        // Timeout must exceed the long-poll window.
        let http = Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 20))
            .build()
            .context("Failed to create Telegram HTTP client")?;
        Ok(Self {
            http,
            api_base: format!("https://api.telegram.org/bot{token}"),
            db,
            criteria,
            scheduler,
        })
    }

    /// Poll for updates until the task is cancelled.
    pub async fn run(&self) -> Result<()> {
        info!("Starting Telegram bot polling …");
        let mut offset = 0i64;
        loop {
            match self.get_updates(offset).await {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if let Some(message) = update.message {
                            self.handle_message(&message).await;
                        }
                    }
                }
                Err(err) => {
                    error!("Error polling Telegram updates: {}", err);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>> {
        let response: UpdatesResponse = self
            .http
            .get(format!("{}/getUpdates", self.api_base))
            .query(&[("timeout", POLL_TIMEOUT_SECS as i64), ("offset", offset)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if !response.ok {
            bail!("Telegram getUpdates returned ok=false");
        }
        Ok(response.result)
    }

    async fn handle_message(&self, message: &Message) {
        let Some(text) = message.text.as_deref() else {
            return;
        };
        let command = text
            .split_whitespace()
            .next()
            .unwrap_or("")
            .split('@')
            .next()
            .unwrap_or("");

        let reply = match command {
            "/start" => self.start_command(),
            "/filter" => self.filter_command(),
            "/list" => self.list_command().await,
            "/refresh" => self.refresh_command(),
            "/stop" => self.stop_command(),
            "/help" => self.help_command(),
            _ => return,
        };

        let reply = match reply {
            Ok(text) => text,
            Err(err) => {
                error!("Error in {} handler: {}", command, err);
                "⚠️ An error occurred. Please try again.".to_string()
            }
        };

        if let Err(err) = self.reply(message.chat.id, &reply).await {
            error!("Error replying to {}: {}", command, err);
        }
    }

    fn start_command(&self) -> Result<String> {
        Ok(format!(
            "👋 Welcome to *Flat Scout*!\n\n\
             I'll notify you when new flats matching your criteria are found.\n\n\
             📋 *Current criteria:*\n{}\n\n\
             Use /help to see all available commands.",
            self.criteria.summary()
        ))
    }

    fn filter_command(&self) -> Result<String> {
        Ok(format!(
            "📋 *Active search criteria:*\n\n{}",
            self.criteria.summary()
        ))
    }

    async fn list_command(&self) -> Result<String> {
        let listings = self.db.find_recent(5).await?;
        if listings.is_empty() {
            return Ok("📭 No listings found in the database yet.".to_string());
        }

        let mut lines = vec!["🏠 *Recent listings:*\n".to_string()];
        for (i, listing) in listings.iter().enumerate() {
            let price = listing
                .price
                .map_or_else(|| "N/A".to_string(), format_price);
            let address = escape_markdown(listing.address.as_deref().unwrap_or("N/A"));
            lines.push(format!("{}. [{} — {}]({})", i + 1, address, price, listing.url));
        }
        Ok(lines.join("\n"))
    }

    fn refresh_command(&self) -> Result<String> {
        self.scheduler.trigger_now();
        Ok("🔄 Manual scrape triggered!".to_string())
    }

    fn stop_command(&self) -> Result<String> {
        Ok("ℹ️ To stop receiving notifications, stop the bot process or \
            remove your credentials from the .env file.\n\
            Use /start to see the current monitoring criteria."
            .to_string())
    }

    fn help_command(&self) -> Result<String> {
        Ok("🤖 *Flat Scout — Commands*\n\n\
            /start — Welcome message & current criteria\n\
            /filter — Show active search criteria\n\
            /list — Show 5 most recent listings\n\
            /refresh — Trigger a manual scrape now\n\
            /stop — Show how to stop the bot\n\
            /help — Show this help message"
            .to_string())
    }

    async fn reply(&self, chat_id: i64, text: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/sendMessage", self.api_base))
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .context("Telegram sendMessage request failed")?;
        if !response.status().is_success() {
            bail!("Telegram API returned {}", response.status());
        }
        Ok(())
    }
}

/// Escape characters Telegram's legacy Markdown mode treats specially.
fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
