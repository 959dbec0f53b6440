mod bot;
mod config;
mod webapp;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mathboard_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // A placeholder token is a fatal precondition, not an error: print
    // operator guidance and exit normally without starting the dispatcher.
    if config.token_is_placeholder() {
        error!("Please set your BOT_TOKEN in the environment or in config.toml!");
        config::print_setup_guidance();
        return Ok(());
    }

    if config.url_is_placeholder() {
        warn!("WEB_APP_URL is not configured! Using default.");
        warn!("The keyboard button will point at the placeholder URL until you set it.");
    }

    info!("Configuration loaded successfully");
    info!("  Web App URL: {}", config.web_app_url);

    // Run the Telegram bot
    info!("Bot is starting...");
    bot::run(Arc::new(config)).await?;

    Ok(())
}
