//! Cron scheduler for periodic background tasks.
//!
//! Drives the token scanner on its configured interval. Triggers landing
//! while a scan is still running are dropped by the scanner itself.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{error, info};
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

use crate::scanner::TokenScanner;

/// Cron scheduler that manages periodic background jobs.
pub struct CronScheduler {
    scanner: Arc<TokenScanner>,
    interval_seconds: u64,
}

impl CronScheduler {
    pub fn new(scanner: Arc<TokenScanner>, interval_seconds: u64) -> Self {
        Self {
            scanner,
            interval_seconds: interval_seconds.max(1),
        }
    }

    /// Starts the cron scheduler and runs until cancellation.
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        let mut scheduler = JobScheduler::new().await?;

        self.register_scan_job(&scheduler).await?;

        scheduler.start().await?;
        info!("Cron scheduler started");

        cancellation_token.cancelled().await;
        info!("Cron scheduler shutting down...");

        scheduler.shutdown().await?;
        Ok(())
    }

    async fn register_scan_job(&self, scheduler: &JobScheduler) -> Result<()> {
        let scanner = self.scanner.clone();
        let interval = self.interval_seconds;

        let job = Job::new_repeated_async(
            Duration::from_secs(interval),
            move |_uuid, _lock| {
                let scanner = scanner.clone();
                Box::pin(async move {
                    match scanner.scan().await {
                        Ok(Some(result)) => info!(
                            "Scan blocks {}-{}: {} pools, {} new tokens ({} ZORA / {} TBA) in {}ms",
                            result.from_block,
                            result.to_block,
                            result.pools_discovered,
                            result.tokens_added,
                            result.zora_tokens,
                            result.tba_tokens,
                            result.duration_ms
                        ),
                        Ok(None) => {}
                        Err(e) => error!("Scan cycle failed: {:#}", e),
                    }
                })
            },
        )?;

        scheduler.add(job).await?;
        info!("Registered token scan job (every {}s)", interval);
        Ok(())
    }
}
