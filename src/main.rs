mod config;
mod db;
mod extract;
mod filters;
mod models;
mod notifier;
mod scheduler;
mod scrapers;
mod telegram;

use config::Config;
use db::Database;
use notifier::{Notifier, TelegramTransport};
use scheduler::Scheduler;
use scrapers::{ImmonetScraper, ImmoweltScraper, Scout24Scraper, Scraper};
use telegram::TelegramBot;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Initialising flat-scout …");
    let config = Config::from_env()?;

    let db = Database::open(&config.database_path).await?;
    info!("Database initialised at {}", config.database_path);

    let scrapers: Vec<Box<dyn Scraper>> = vec![
        Box::new(Scout24Scraper::new(config.scout24_base_url.clone())?),
        Box::new(ImmoweltScraper::new(config.immowelt_base_url.clone())?),
        Box::new(ImmonetScraper::new(config.immonet_base_url.clone())?),
    ];

    let notifier = Notifier::new(Box::new(TelegramTransport::new(
        &config.telegram_bot_token,
        &config.telegram_chat_id,
    )?));

    let startup_message = format!(
        "🤖 Flat Scout started!\n\
         📋 Monitoring criteria:\n{}\n\
         ⏱️ Scraping every {} minutes",
        config.criteria.summary(),
        config.scrape_interval_minutes
    );
    info!("{}", startup_message);
    notifier.send_text(&startup_message).await;

    let scheduler = Scheduler::new(scrapers, db.clone(), config.criteria.clone(), notifier);
    let timer = scheduler.start(config.scrape_interval_minutes);

    let bot = TelegramBot::new(
        &config.telegram_bot_token,
        db,
        config.criteria.clone(),
        scheduler.clone(),
    )?;

    tokio::select! {
        result = bot.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received — stopping scheduler …");
        }
    }

    scheduler.stop();
    let _ = timer.await;
    info!("Flat-scout stopped.");
    Ok(())
}
