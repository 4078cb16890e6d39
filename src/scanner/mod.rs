pub mod classifier;
pub mod processor;
pub mod repository;
pub mod scanner;
pub mod types;

pub use classifier::Classifier;
pub use processor::PoolProcessor;
pub use repository::{StoreOutcome, TokenRepository};
pub use scanner::{ScanResult, TokenScanner};
pub use types::{AppType, PartitionMeta, PoolKey, TokenPartition, TokenRecord};
