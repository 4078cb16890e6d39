//! Exponential-backoff retry for idempotent upstream calls.
//!
//! Only rate-limit failures are retried; anything else propagates
//! immediately to the caller.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use log::warn;

use crate::config::RetrySettings;

/// Retry budget for rate-limited upstream calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.base_delay_ms),
        )
    }
}

/// Returns true when the error chain looks like upstream rate limiting.
pub fn is_rate_limited(err: &anyhow::Error) -> bool {
    let rendered = format!("{err:#}").to_lowercase();
    rendered.contains("429")
        || rendered.contains("rate limit")
        || rendered.contains("too many requests")
}

/// Run `op` until it succeeds, retrying only rate-limited failures with
/// exponential backoff (base delay doubling per attempt). Exhausting the
/// budget surfaces the last error wrapped as a retries-exceeded failure.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_rate_limited(&err) => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    return Err(anyhow!(
                        "rate limit retries exceeded after {} attempts: {err:#}",
                        policy.max_attempts
                    ));
                }
                let delay = policy.base_delay * 2u32.pow(attempt - 1);
                warn!(
                    "Rate limited (attempt {attempt}/{}), backing off {delay:?}",
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn non_rate_limit_errors_propagate_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry(&RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow!("connection refused")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_calls_retry_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::default(), || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(anyhow!("HTTP 429 Too Many Requests"))
                } else {
                    Ok(7u32)
                }
            }
        })
        .await;
        assert_eq!(result.expect("should recover"), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_surfaces_retries_exceeded() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry(&RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow!("rate limit hit")) }
        })
        .await;
        let err = result.expect_err("should exhaust");
        assert!(err.to_string().contains("retries exceeded"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn rate_limit_detection_inspects_error_chain() {
        assert!(is_rate_limited(&anyhow!("status 429")));
        assert!(is_rate_limited(&anyhow!("provider Rate Limit reached")));
        assert!(is_rate_limited(
            &anyhow!("too many requests").context("get_logs failed")
        ));
        assert!(!is_rate_limited(&anyhow!("execution reverted")));
    }
}
