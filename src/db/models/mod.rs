pub mod comment;
pub mod user;
pub mod watchlist;

pub use comment::Comment;
pub use user::User;
pub use watchlist::WatchlistEntry;

use serde::{Deserialize, Serialize};

/// Lifecycle of an asynchronously persisted write: the caller gets a
/// `Processing` stub immediately, the background handler flips the
/// stored record to `Persisted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStatus {
    Processing,
    Persisted,
}

impl WriteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteStatus::Processing => "processing",
            WriteStatus::Persisted => "persisted",
        }
    }

    pub fn from_str_or_persisted(raw: &str) -> Self {
        match raw {
            "processing" => WriteStatus::Processing,
            _ => WriteStatus::Persisted,
        }
    }
}
