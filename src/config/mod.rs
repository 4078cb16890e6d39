mod config;

pub use config::{
    ChainSettings, ClassifierSettings, FeedSettings, HttpSettings, KvSettings, PostgresSettings,
    RateLimitSettings, RetrySettings, ScanWindow, ScannerSettings, Settings,
};
