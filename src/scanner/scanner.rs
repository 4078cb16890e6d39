//! Scheduled pool discovery scans.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;

use crate::chain::{with_retry, BlockTimestamps, ChainGateway, RetryPolicy};
use crate::config::{ScanWindow, ScannerSettings};
use crate::scanner::classifier::Classifier;
use crate::scanner::processor::PoolProcessor;
use crate::scanner::repository::TokenRepository;
use crate::scanner::types::PoolKey;

/// Summary of one completed scan cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub blocks_scanned: u64,
    pub from_block: u64,
    pub to_block: u64,
    pub pools_discovered: usize,
    pub tokens_added: usize,
    pub zora_tokens: usize,
    pub tba_tokens: usize,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Orchestrates one scan cycle: window -> logs -> keys -> timestamps ->
/// records -> repository.
///
/// Holds a non-reentrant flag; triggers arriving while a scan runs are
/// dropped, not queued.
pub struct TokenScanner {
    gateway: Arc<ChainGateway>,
    processor: PoolProcessor,
    repository: Arc<TokenRepository>,
    timestamps: BlockTimestamps,
    classifier: Arc<Classifier>,
    settings: ScannerSettings,
    retry: RetryPolicy,
    scanning: AtomicBool,
}

impl TokenScanner {
    pub fn new(
        gateway: Arc<ChainGateway>,
        classifier: Arc<Classifier>,
        repository: Arc<TokenRepository>,
        settings: ScannerSettings,
        retry: RetryPolicy,
    ) -> Self {
        let processor = PoolProcessor::new(gateway.clone(), classifier.clone(), retry.clone());
        let timestamps = BlockTimestamps::new(gateway.clone(), retry.clone());

        Self {
            gateway,
            processor,
            repository,
            timestamps,
            classifier,
            settings,
            retry,
            scanning: AtomicBool::new(false),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Run one scan cycle. Returns `Ok(None)` when another scan is
    /// already in flight.
    pub async fn scan(&self) -> Result<Option<ScanResult>> {
        if self.scanning.swap(true, Ordering::AcqRel) {
            debug!("Scan already in progress, dropping trigger");
            return Ok(None);
        }

        let outcome = self.run_cycle().await;
        self.scanning.store(false, Ordering::Release);
        outcome.map(Some)
    }

    async fn run_cycle(&self) -> Result<ScanResult> {
        let started = Instant::now();
        let (from_block, to_block) = self.window().await?;

        let logs = with_retry(&self.retry, || {
            self.gateway.initialize_events(from_block, to_block)
        })
        .await?;
        let pools_discovered = logs.len();

        let keys: Vec<PoolKey> = logs
            .into_iter()
            .map(PoolKey::from)
            .filter(|key| self.classifier.is_tracked_hook(&key.hooks))
            .collect();

        let blocks: Vec<u64> = keys.iter().map(|key| key.discovery_block).collect();
        let timestamps = self.timestamps.resolve(&blocks).await?;

        let records = self.processor.process(keys, &timestamps).await;
        let outcome = self.repository.store(records).await?;

        Ok(ScanResult {
            blocks_scanned: to_block.saturating_sub(from_block) + 1,
            from_block,
            to_block,
            pools_discovered,
            tokens_added: outcome.added,
            zora_tokens: outcome.zora_added,
            tba_tokens: outcome.tba_added,
            duration_ms: started.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        })
    }

    async fn window(&self) -> Result<(u64, u64)> {
        match self.settings.window {
            ScanWindow::Fixed => Ok((
                self.settings.start_block,
                self.settings.start_block + self.settings.block_range,
            )),
            ScanWindow::Sliding => {
                let latest =
                    with_retry(&self.retry, || self.gateway.latest_block_number()).await?;
                Ok((latest.saturating_sub(self.settings.block_range), latest))
            }
        }
    }
}
