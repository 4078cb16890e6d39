pub mod abis;
pub mod bus;
pub mod chain;
pub mod config;
pub mod cron;
pub mod db;
pub mod engines;
pub mod errors;
pub mod feed;
pub mod http;
pub mod kv;
pub mod scanner;
pub mod sse;
pub mod utils;

pub use bus::{BusEvent, EventBus};
pub use config::Settings;
pub use cron::CronScheduler;
pub use db::Database;
pub use errors::ScryError;
pub use kv::KvClient;
pub use scanner::{TokenRepository, TokenScanner};
pub use sse::ChannelHub;
