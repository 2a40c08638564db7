mod bot;
mod config;
mod giphy;
mod platform;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::Dispatcher;
use crate::config::Config;
use crate::giphy::GiphyClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gifbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let env_file = config::resolve_env_file();
    let settings_path = config::resolve_settings_path(std::env::args().nth(1).map(PathBuf::from));

    info!("Loading credentials from: {}", env_file.display());
    match &settings_path {
        Some(path) => info!("Loading settings from: {}", path.display()),
        None => info!("No settings file, using defaults"),
    }

    let config = Config::load(&env_file, settings_path.as_deref())
        .context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("  Command: {}", config.bot.command);
    info!("  Status: {}", config.bot.status);
    info!("  Empty results: {}", config.bot.on_empty);
    info!("  Giphy endpoint: {}", config.giphy.base_url);
    info!("  Giphy timeout: {}s", config.giphy.timeout_secs);

    let giphy = GiphyClient::new(&config.giphy, config.credentials.giphy_token.clone())?;
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(giphy), config.bot.clone()));

    info!("Bot is starting...");
    platform::discord::run(&config, dispatcher, shutdown_signal()).await?;

    info!("Bot stopped");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => info!("Received SIGINT, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
