mod config;
mod dedup;
mod format;
mod handler;
mod quote;
mod server;
mod slack;
mod ticker;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::dedup::DedupGuard;
use crate::handler::EventHandler;
use crate::quote::YahooQuoteProvider;
use crate::server::AppState;
use crate::slack::SlackClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tickerbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Listen: {}", config.listen_addr());
    info!("  Quotes: {}", config.quotes.base_url);
    info!("  Username: {}", config.slack.username);

    let quotes = YahooQuoteProvider::new(&config.quotes)?;
    let poster = SlackClient::new(config.slack.clone())?;
    let handler = EventHandler::new(DedupGuard::new(), Arc::new(quotes), Arc::new(poster));

    let state = AppState {
        handler: Arc::new(handler),
        signing_secret: Arc::from(config.slack.signing_secret.as_str()),
    };

    info!("Bot is starting...");
    server::run(&config.listen_addr(), state).await?;

    Ok(())
}
