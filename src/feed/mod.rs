//! Upstream launchpad feed ingestion.
//!
//! Subscribes to the provider's streaming endpoint (newline-delimited
//! JSON batches), filters items against the configured network/protocol
//! allow-lists and republishes each token on the event bus. The
//! connection recovers with exponential backoff; all durable state lives
//! downstream, so a reconnect simply resumes from the next batch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::StreamExt;
use log::{info, warn};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::bus::{BusEvent, EventBus};
use crate::config::FeedSettings;
use crate::engines::launchpad::LaunchpadToken;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// One upstream batch line.
#[derive(Debug, Deserialize)]
struct FeedBatch {
    events: Vec<FeedEvent>,
}

/// A single token event as the provider sends it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeedEvent {
    address: String,
    name: String,
    symbol: String,
    protocol: String,
    network_id: i64,
    #[serde(default)]
    network: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
    #[serde(default)]
    price_usd: Option<f64>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    volume24: Option<f64>,
    #[serde(default)]
    holders: Option<u64>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    graduation_percent: Option<f64>,
    #[serde(default)]
    launchpad_protocol: Option<String>,
}

/// Allow-list filter; empty lists admit everything.
fn allowed(settings: &FeedSettings, event: &FeedEvent) -> bool {
    let protocol_ok = settings.protocols.is_empty()
        || settings
            .protocols
            .iter()
            .any(|protocol| protocol.eq_ignore_ascii_case(&event.protocol));
    let network_ok =
        settings.network_ids.is_empty() || settings.network_ids.contains(&event.network_id);
    protocol_ok && network_ok
}

fn normalize(event: FeedEvent) -> LaunchpadToken {
    let now = Utc::now();
    LaunchpadToken {
        address: event.address.to_lowercase(),
        name: event.name,
        symbol: event.symbol,
        network: event.network.unwrap_or_else(|| "base".to_string()),
        protocol: event.protocol,
        network_id: event.network_id,
        created_at: event.created_at.unwrap_or_else(|| now.timestamp()),
        price_usd: event.price_usd,
        market_cap: event.market_cap,
        volume24: event.volume24,
        holders: event.holders,
        image_url: event.image_url,
        graduation_percent: event.graduation_percent,
        launchpad_protocol: event.launchpad_protocol,
        timestamp: now.timestamp_millis(),
    }
}

/// Long-running upstream subscription pump.
pub struct FeedIngestor {
    settings: FeedSettings,
    bus: Arc<EventBus>,
    http: reqwest::Client,
}

impl FeedIngestor {
    pub fn new(settings: FeedSettings, bus: Arc<EventBus>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("Failed to build feed HTTP client")?;

        Ok(Self {
            settings,
            bus,
            http,
        })
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.stream_once(&cancel).await {
                Ok(()) => {
                    backoff = INITIAL_BACKOFF;
                    if cancel.is_cancelled() {
                        break;
                    }
                    warn!("Launchpad feed stream ended, reconnecting");
                }
                Err(err) => warn!("Launchpad feed connection failed: {err:#}"),
            }

            info!("Reconnecting to launchpad feed in {backoff:?}");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(backoff) => {}
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        info!("Launchpad feed ingestor stopped");
    }

    async fn stream_once(&self, cancel: &CancellationToken) -> Result<()> {
        let response = self
            .http
            .get(&self.settings.url)
            .header("X-Api-Key", &self.settings.api_key)
            .send()
            .await
            .context("feed connect failed")?
            .error_for_status()
            .context("feed rejected subscription")?;

        info!("Subscribed to launchpad feed at {}", self.settings.url);

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                chunk = stream.next() => match chunk {
                    Some(chunk) => {
                        let chunk = chunk.context("feed stream error")?;
                        buffer.extend_from_slice(&chunk);
                        while let Some(newline) = buffer.iter().position(|byte| *byte == b'\n') {
                            let line: Vec<u8> = buffer.drain(..=newline).collect();
                            self.handle_line(&line).await;
                        }
                    }
                    None => return Ok(()),
                }
            }
        }
    }

    async fn handle_line(&self, line: &[u8]) {
        let text = String::from_utf8_lossy(line);
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let batch: FeedBatch = match serde_json::from_str(text) {
            Ok(batch) => batch,
            Err(err) => {
                warn!("Skipping undecodable feed batch: {err}");
                return;
            }
        };

        for event in batch.events {
            if !allowed(&self.settings, &event) {
                continue;
            }
            let token = normalize(event);
            let payload = match serde_json::to_value(&token) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!("Failed to serialize feed token {}: {err}", token.address);
                    continue;
                }
            };
            self.bus
                .emit(BusEvent::new("new-token-created", &token.address, payload))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(protocols: Vec<&str>, network_ids: Vec<i64>) -> FeedSettings {
        FeedSettings {
            enabled: true,
            url: "https://feed.example".to_string(),
            api_key: "key".to_string(),
            protocols: protocols.into_iter().map(String::from).collect(),
            network_ids,
        }
    }

    fn event(protocol: &str, network_id: i64) -> FeedEvent {
        FeedEvent {
            address: "0xABCDEF0000000000000000000000000000000001".to_string(),
            name: "Foo".to_string(),
            symbol: "FOO".to_string(),
            protocol: protocol.to_string(),
            network_id,
            network: None,
            created_at: None,
            price_usd: None,
            market_cap: None,
            volume24: None,
            holders: None,
            image_url: None,
            graduation_percent: None,
            launchpad_protocol: None,
        }
    }

    #[test]
    fn allow_list_filters_protocol_and_network() {
        let settings = settings(vec!["zora"], vec![8453]);
        assert!(allowed(&settings, &event("zora", 8453)));
        assert!(allowed(&settings, &event("ZORA", 8453)));
        assert!(!allowed(&settings, &event("pump", 8453)));
        assert!(!allowed(&settings, &event("zora", 1)));
    }

    #[test]
    fn empty_allow_lists_admit_everything() {
        let settings = settings(vec![], vec![]);
        assert!(allowed(&settings, &event("anything", 42)));
    }

    #[test]
    fn normalize_lowercases_and_defaults() {
        let token = normalize(event("zora", 8453));
        assert_eq!(
            token.address,
            "0xabcdef0000000000000000000000000000000001"
        );
        assert_eq!(token.network, "base");
        assert!(token.created_at > 0);
        assert!(token.timestamp > 0);
    }

    #[test]
    fn batch_lines_decode() {
        let line = r#"{"events":[{"address":"0xA","name":"Foo","symbol":"FOO","protocol":"zora","networkId":8453}]}"#;
        let batch: FeedBatch = serde_json::from_str(line).expect("decodes");
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].network_id, 8453);
    }
}
