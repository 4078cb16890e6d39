pub mod batch;
pub mod currency;
pub mod gateway;
pub mod retry;
pub mod timestamps;

pub use batch::run_batched;
pub use currency::{Currency, CurrencyResolver};
pub use gateway::{ChainGateway, FungibleMeta, PoolInitLog, PoolState};
pub use retry::{is_rate_limited, with_retry, RetryPolicy};
pub use timestamps::BlockTimestamps;
