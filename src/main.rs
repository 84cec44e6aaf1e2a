mod bot;
mod config;
mod db;
mod error;
mod normalizer;
mod scheduler;

use crate::bot::notifier::{Notifier, TelegramChannel};
use crate::config::Config;
use anyhow::Result;
use concert_client::{Provider, SetlistFmClient, SpotifyClient, TicketmasterClient};
use sea_orm_migration::MigratorTrait;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load()?;

    let log_level = config.log_level();
    let log_dir = &config.logging.dir;

    std::fs::create_dir_all(log_dir)?;

    // File appender with daily rotation
    let file_appender = tracing_appender::rolling::daily(log_dir, "concertbot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Use local time for log timestamps
    let local_timer = ChronoLocal::rfc_3339();

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_timer(local_timer.clone());

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_timer(local_timer)
        .with_writer(non_blocking);

    let filter_layer = EnvFilter::from_default_env()
        .add_directive(log_level.into())
        .add_directive("sqlx=warn".parse().unwrap())
        .add_directive("sea_orm=warn".parse().unwrap());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!("Starting ConcertBot...");
    info!("Logs are written to: {}", log_dir);

    // Connect to database. Failure here is the one fatal condition.
    let db = db::establish_connection(&config.database.url).await?;
    info!("Database connection established");

    migration::Migrator::up(&db, None).await?;
    info!("✅ Database migrations completed");

    let repo = std::sync::Arc::new(db::repo::Repo::new(db.clone()));

    repo.ping().await?;
    info!("✅ Database ping successful");

    // Build the providers that have credentials configured
    let timeout = Duration::from_secs(config.scheduler.request_timeout_sec);
    let mut providers: Vec<Provider> = Vec::new();

    if let Some(tm) = &config.providers.ticketmaster {
        providers.push(Provider::Ticketmaster(TicketmasterClient::new(
            tm.api_key.clone(),
            timeout,
        )?));
        info!("✅ Ticketmaster provider configured");
    }
    if let Some(spotify) = &config.providers.spotify {
        providers.push(Provider::Spotify(SpotifyClient::new(
            spotify.client_id.clone(),
            spotify.client_secret.clone(),
            timeout,
        )?));
        info!("✅ Spotify provider configured");
    }
    if let Some(setlistfm) = &config.providers.setlistfm {
        providers.push(Provider::SetlistFm(SetlistFmClient::new(
            setlistfm.api_key.clone(),
            timeout,
        )?));
        info!("✅ Setlist.fm provider configured");
    }

    if providers.is_empty() {
        warn!("No provider credentials configured, scheduled searches will find nothing");
    }

    // Initialize Telegram Bot
    let bot = teloxide::Bot::new(config.telegram.bot_token.clone());

    // Initialize the search engine
    let (run_hour, run_minute) = config.scheduler.run_time_parts()?;
    let notifier = Notifier::new(TelegramChannel::new(bot.clone()));
    let engine = scheduler::SearchEngine::new(
        repo.clone(),
        providers,
        notifier,
        run_hour,
        run_minute,
        config.scheduler.worker_count,
        config.scheduler.search_attempts,
        config.scheduler.search_country.clone(),
    );

    info!("✅ Search engine initialized");

    // Spawn the engine in the background
    let engine_handle = tokio::spawn(async move {
        engine.run().await;
    });

    info!("🤖 Starting Telegram Bot...");

    // Setup Ctrl+C handler
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            error!("Failed to listen for Ctrl+C");
            return;
        }
        info!("Received Ctrl+C, shutting down...");
        let _ = shutdown_tx.send(()).await;
    });

    // Start the bot in a separate task (non-blocking)
    let bot_repo = repo.clone();
    let bot_handle = tokio::spawn(async move {
        if let Err(e) = bot::run(bot, bot_repo).await {
            error!("Bot error: {:?}", e);
        }
    });

    // Wait for shutdown signal. Aborting mid-cycle is safe: store inserts
    // are individually atomic and the next run resumes coverage.
    shutdown_rx.recv().await;
    info!("Shutting down gracefully...");

    bot_handle.abort();
    engine_handle.abort();

    info!("✅ Shutdown complete");
    Ok(())
}
