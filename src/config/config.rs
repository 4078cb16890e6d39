use std::collections::HashMap;

use config::{Config, ConfigError, File};
use serde::Deserialize;

/// Pool scanner configuration.
///
/// The scan window mode is deliberately mandatory: deployments must state
/// whether scans cover the fixed `[start_block, start_block + block_range]`
/// range or slide with the chain tip.
#[derive(Debug, Deserialize, Clone)]
pub struct ScannerSettings {
    pub start_block: u64,
    #[serde(default = "default_block_range")]
    pub block_range: u64,
    #[serde(default = "default_scan_interval_secs")]
    pub interval_seconds: u64,
    pub window: ScanWindow,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanWindow {
    Fixed,
    Sliding,
}

fn default_block_range() -> u64 {
    1000
}

fn default_scan_interval_secs() -> u64 {
    2
}

/// Blockchain RPC endpoint and the contracts the scanner reads.
#[derive(Debug, Deserialize, Clone)]
pub struct ChainSettings {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    pub rpc_url: String,
    pub pool_manager_address: String,
    pub state_view_address: String,
}

fn default_chain_id() -> u64 {
    8453 // Base mainnet
}

/// Token classification: hook contract -> coin type, plus the set of
/// "quote" currencies that decide which side of a pair is the token.
#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierSettings {
    pub hooks: HashMap<String, String>,
    #[serde(default)]
    pub base_pairings: Vec<String>,
}

/// Retry budget for rate-limited upstream calls.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

/// PostgreSQL database connection configuration.
///
/// System of record for users, comments and watchlist entries.
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    16
}

/// In-memory key/value store (Redis semantics).
///
/// One URL serves both connections: commands/publish on one, the
/// dedicated subscriber on the other.
#[derive(Debug, Deserialize, Clone)]
pub struct KvSettings {
    pub url: String,
    #[serde(default = "default_kv_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_kv_timeout_ms() -> u64 {
    5000
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

/// HTTP server surface.
#[derive(Debug, Deserialize, Clone)]
pub struct HttpSettings {
    #[serde(default = "default_http_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitSettings>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: default_http_host(),
            port: default_http_port(),
            cors_origins: default_cors_origins(),
            rate_limit: None,
        }
    }
}

/// Fixed-window request limiting, applied per client address.
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitSettings {
    pub ttl_ms: u64,
    pub limit: u32,
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    3000
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// Upstream launchpad push feed.
///
/// Empty allow-lists admit every protocol/network.
#[derive(Debug, Deserialize, Clone)]
pub struct FeedSettings {
    #[serde(default)]
    pub enabled: bool,
    pub url: String,
    pub api_key: String,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub network_ids: Vec<i64>,
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub scanner: ScannerSettings,
    pub chain: ChainSettings,
    pub classifier: ClassifierSettings,
    pub postgres: PostgresSettings,
    pub kv: KvSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub feed: Option<FeedSettings>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}
