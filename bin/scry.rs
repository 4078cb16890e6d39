use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

use scry::chain::{ChainGateway, RetryPolicy};
use scry::engines::{CommentEngine, LaunchpadEngine, ReactionEngine, WatchlistEngine};
use scry::feed::FeedIngestor;
use scry::http::{self, AppContext};
use scry::http::rate_limit::RateLimiter;
use scry::scanner::{Classifier, TokenRepository, TokenScanner};
use scry::{ChannelHub, CronScheduler, Database, EventBus, KvClient, Settings};

#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()
        .context("Failed to initialize logging")?;

    let settings = Arc::new(Settings::new().context("Failed to load configuration")?);
    let cancellation_token = CancellationToken::new();

    // Storage layers. Unreachable stores abort startup with a non-zero
    // exit after their bounded connect retries.
    let db = Database::new(&settings).await?;
    let kv = Arc::new(KvClient::connect(&settings.kv).await?);
    let hub = ChannelHub::start(&settings.kv.url, cancellation_token.child_token()).await?;

    let bus = EventBus::new();

    // Engines and their background event handlers.
    let comments = CommentEngine::new(db.clone(), kv.clone(), bus.clone());
    comments.register()?;
    let reactions = ReactionEngine::new(kv.clone(), bus.clone());
    reactions.register()?;
    let watchlist = WatchlistEngine::new(db.clone(), kv.clone(), bus.clone());
    let launchpad = LaunchpadEngine::new(kv.clone(), bus.clone());
    launchpad.register()?;

    // Scanner pipeline.
    let retry = RetryPolicy::from_settings(&settings.retry);
    let gateway = Arc::new(ChainGateway::new(&settings.chain)?);
    let classifier = Arc::new(Classifier::from_settings(&settings.classifier)?);
    let repository = Arc::new(TokenRepository::new(
        kv.clone(),
        bus.clone(),
        settings.kv.cache_ttl_secs,
        settings.chain.chain_id,
    ));
    let scanner = Arc::new(TokenScanner::new(
        gateway,
        classifier,
        repository.clone(),
        settings.scanner.clone(),
        retry,
    ));

    // Scan scheduler.
    let cron = CronScheduler::new(scanner.clone(), settings.scanner.interval_seconds);
    let cron_token = cancellation_token.child_token();
    let cron_handle = tokio::spawn(async move {
        if let Err(e) = cron.run(cron_token).await {
            error!("Cron scheduler failed: {:#}", e);
        }
    });

    // Optional upstream launchpad feed.
    if let Some(feed_settings) = settings.feed.clone() {
        if feed_settings.enabled {
            let ingestor = FeedIngestor::new(feed_settings, bus.clone())?;
            let feed_token = cancellation_token.child_token();
            tokio::spawn(async move {
                ingestor.run(feed_token).await;
            });
        }
    }

    // HTTP surface.
    let ctx = Arc::new(AppContext {
        settings: settings.clone(),
        db,
        kv,
        hub,
        comments,
        reactions,
        watchlist,
        launchpad,
        repository,
        scanner,
        rate_limiter: settings.http.rate_limit.as_ref().map(RateLimiter::new),
    });
    let server_handle = tokio::spawn(http::serve(ctx, cancellation_token.child_token()));

    info!("scry backend started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    cancellation_token.cancel();

    if let Err(e) = server_handle.await.context("HTTP task panicked")? {
        error!("HTTP server exited with error: {:#}", e);
    }
    let _ = cron_handle.await;

    info!("Shutdown complete");
    Ok(())
}
