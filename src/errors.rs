use std::fmt;

/// Domain error taxonomy shared by the engines and the HTTP boundary.
///
/// Engines raise these; the HTTP layer translates them into response
/// envelopes. Background event handlers never propagate errors to the
/// originating request: they log and continue.
#[derive(Debug)]
pub enum ScryError {
    /// Rejected input: address shape, length bounds, unknown enum value.
    Validation(String),
    /// A required user or resource is absent.
    NotFound(String),
    /// Upstream rate limiting survived the retry budget.
    RateLimited(String),
    /// Network timeout, store disconnect, connection closed mid-operation.
    Transient(String),
    /// Unique-constraint style conflict.
    Conflict(String),
    /// Anything else; carries the underlying error chain.
    Internal(anyhow::Error),
}

impl fmt::Display for ScryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScryError::Validation(msg) => write!(f, "{msg}"),
            ScryError::NotFound(msg) => write!(f, "{msg}"),
            ScryError::RateLimited(msg) => write!(f, "rate limited: {msg}"),
            ScryError::Transient(msg) => write!(f, "temporary failure: {msg}"),
            ScryError::Conflict(msg) => write!(f, "conflict: {msg}"),
            ScryError::Internal(err) => write!(f, "internal error: {err}"),
        }
    }
}

impl std::error::Error for ScryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScryError::Internal(err) => err.source(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ScryError {
    fn from(err: anyhow::Error) -> Self {
        ScryError::Internal(err)
    }
}
