pub mod client;
pub mod subscriber;

pub use client::KvClient;
pub use subscriber::KvSubscriber;
