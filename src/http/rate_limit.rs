//! Fixed-window request limiter, tracked per client address.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;

use crate::config::RateLimitSettings;
use crate::http::envelope::error_body;
use crate::http::server::AppContext;

/// Entries kept before expired windows are swept.
const SWEEP_THRESHOLD: usize = 10_000;

struct Window {
    started: Instant,
    count: u32,
}

/// Per-address fixed window counter.
pub struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, Window>>,
    ttl: Duration,
    limit: u32,
}

impl RateLimiter {
    pub fn new(settings: &RateLimitSettings) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            ttl: Duration::from_millis(settings.ttl_ms),
            limit: settings.limit,
        }
    }

    /// Returns false once the caller exhausted the current window.
    pub fn check(&self, client: IpAddr) -> bool {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();

        if windows.len() > SWEEP_THRESHOLD {
            let ttl = self.ttl;
            windows.retain(|_, window| now.duration_since(window.started) < ttl);
        }

        let window = windows.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.ttl {
            window.started = now;
            window.count = 0;
        }
        window.count += 1;
        window.count <= self.limit
    }
}

pub async fn limit_middleware(
    State(ctx): State<Arc<AppContext>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(limiter) = &ctx.rate_limiter {
        if !limiter.check(addr.ip()) {
            return error_body(StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string());
        }
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, ttl_ms: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitSettings { ttl_ms, limit })
    }

    #[test]
    fn requests_within_the_window_pass() {
        let limiter = limiter(3, 60_000);
        let client: IpAddr = "127.0.0.1".parse().expect("valid");
        assert!(limiter.check(client));
        assert!(limiter.check(client));
        assert!(limiter.check(client));
        assert!(!limiter.check(client));
    }

    #[test]
    fn clients_are_tracked_independently() {
        let limiter = limiter(1, 60_000);
        let a: IpAddr = "10.0.0.1".parse().expect("valid");
        let b: IpAddr = "10.0.0.2".parse().expect("valid");
        assert!(limiter.check(a));
        assert!(limiter.check(b));
        assert!(!limiter.check(a));
    }
}
