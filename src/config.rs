use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

use crate::filters::SearchCriteria;

const DEFAULT_SCOUT24_URL: &str =
    "https://www.immobilienscout24.de/Suche/de/berlin/berlin/wohnung-mieten";
const DEFAULT_IMMOWELT_URL: &str = "https://www.immowelt.de/liste/berlin/wohnungen/mieten";
const DEFAULT_IMMONET_URL: &str =
    "https://www.immonet.de/immobiliensuche/sel.do?city=Berlin&marketingtype=1&objecttype=1";

/// Application configuration loaded from environment variables.
///
/// Telegram credentials are mandatory; everything else has a default.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub database_path: String,
    pub scrape_interval_minutes: u64,
    pub criteria: SearchCriteria,
    pub scout24_base_url: String,
    pub immowelt_base_url: String,
    pub immonet_base_url: String,
}

impl Config {
    /// Load configuration from environment variables, reading a `.env`
    /// file first if one is present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let telegram_bot_token =
            env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
        let telegram_chat_id =
            env::var("TELEGRAM_CHAT_ID").context("TELEGRAM_CHAT_ID must be set")?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:///data/flats.db".to_string());
        let database_path = strip_sqlite_prefix(&database_url).to_string();

        let criteria = SearchCriteria {
            min_rooms: parse_env("MIN_ROOMS", 2)?,
            max_rooms: parse_env("MAX_ROOMS", 4)?,
            min_floor: parse_env("MIN_FLOOR", 2)?,
            max_price: parse_env("MAX_PRICE", 1500.0)?,
            areas: parse_list(&env::var("AREAS").unwrap_or_default()),
            exclude_keywords: parse_list(&env::var("EXCLUDE_KEYWORDS").unwrap_or_default()),
        };

        Ok(Self {
            telegram_bot_token,
            telegram_chat_id,
            database_path,
            scrape_interval_minutes: parse_env("SCRAPE_INTERVAL_MINUTES", 30)?,
            criteria,
            scout24_base_url: env::var("SCOUT24_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_SCOUT24_URL.to_string()),
            immowelt_base_url: env::var("IMMOWELT_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_IMMOWELT_URL.to_string()),
            immonet_base_url: env::var("IMMONET_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_IMMONET_URL.to_string()),
        })
    }
}

fn strip_sqlite_prefix(url: &str) -> &str {
    url.strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .unwrap_or(url)
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("Environment variable {name}={raw:?} is not a valid number")),
        Err(_) => Ok(default),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_url_prefixes_are_stripped() {
        assert_eq!(strip_sqlite_prefix("sqlite:///data/flats.db"), "data/flats.db");
        assert_eq!(strip_sqlite_prefix("sqlite://flats.db"), "flats.db");
        assert_eq!(strip_sqlite_prefix("data/flats.db"), "data/flats.db");
    }

    #[test]
    fn comma_lists_are_trimmed_and_empty_entries_dropped() {
        assert_eq!(
            parse_list(" Mitte , Kreuzberg ,,"),
            vec!["Mitte".to_string(), "Kreuzberg".to_string()]
        );
        assert!(parse_list("").is_empty());
    }
}
