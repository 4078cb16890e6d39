//! In-process publish/subscribe event bus.
//!
//! Engines communicate only through events, never by calling each other,
//! which keeps the dependency graph acyclic. Patterns may contain one `*`
//! segment. Each subscription owns a single bounded worker task, so
//! handler execution stays ordered per subscription and the bus never
//! spawns unbounded work.

use std::future::Future;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// Registration cap per topic pattern.
pub const MAX_LISTENERS_PER_PATTERN: usize = 20;

/// Pending events per subscription before emit awaits.
const HANDLER_QUEUE_DEPTH: usize = 256;

/// An event flowing through the bus.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusEvent {
    pub topic: String,
    pub aggregate_id: String,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

impl BusEvent {
    pub fn new(topic: impl Into<String>, aggregate_id: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            aggregate_id: aggregate_id.into(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Wildcard,
}

/// Dot-separated topic pattern with at most one `*` segment.
#[derive(Debug, Clone)]
pub struct TopicPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl TopicPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            bail!("empty topic pattern");
        }

        let segments: Vec<Segment> = pattern
            .split('.')
            .map(|segment| {
                if segment == "*" {
                    Segment::Wildcard
                } else {
                    Segment::Literal(segment.to_string())
                }
            })
            .collect();

        if segments
            .iter()
            .any(|s| matches!(s, Segment::Literal(l) if l.is_empty()))
        {
            bail!("topic pattern '{pattern}' has an empty segment");
        }
        let wildcards = segments
            .iter()
            .filter(|s| matches!(s, Segment::Wildcard))
            .count();
        if wildcards > 1 {
            bail!("topic pattern '{pattern}' has more than one wildcard segment");
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn matches(&self, topic: &str) -> bool {
        let parts: Vec<&str> = topic.split('.').collect();
        if parts.len() != self.segments.len() {
            return false;
        }
        self.segments
            .iter()
            .zip(parts)
            .all(|(segment, part)| match segment {
                Segment::Literal(literal) => literal == part,
                Segment::Wildcard => true,
            })
    }
}

struct Subscription {
    pattern: TopicPattern,
    tx: mpsc::Sender<BusEvent>,
}

/// The in-process event bus.
#[derive(Default)]
pub struct EventBus {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `handler` for topics matching `pattern`. Rejected once
    /// [`MAX_LISTENERS_PER_PATTERN`] handlers exist for the same pattern.
    pub fn on<F, Fut>(&self, pattern: &str, handler: F) -> Result<()>
    where
        F: Fn(BusEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let pattern = TopicPattern::parse(pattern)?;

        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let registered = subscriptions
            .iter()
            .filter(|s| s.pattern.raw == pattern.raw)
            .count();
        if registered >= MAX_LISTENERS_PER_PATTERN {
            bail!(
                "listener limit ({MAX_LISTENERS_PER_PATTERN}) reached for topic pattern '{}'",
                pattern.raw
            );
        }

        let (tx, mut rx) = mpsc::channel::<BusEvent>(HANDLER_QUEUE_DEPTH);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                handler(event).await;
            }
        });

        subscriptions.push(Subscription { pattern, tx });
        Ok(())
    }

    /// Deliver `event` to every matching subscription in registration
    /// order. Per-subscription ordering holds because each queue drains
    /// through a single worker.
    pub async fn emit(&self, event: BusEvent) {
        let targets: Vec<mpsc::Sender<BusEvent>> = {
            let subscriptions = self
                .subscriptions
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            subscriptions
                .iter()
                .filter(|s| s.pattern.matches(&event.topic))
                .map(|s| s.tx.clone())
                .collect()
        };

        for tx in targets {
            if tx.send(event.clone()).await.is_err() {
                warn!("Dropping event '{}': handler queue closed", event.topic);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn literal_patterns_match_exactly() {
        let pattern = TopicPattern::parse("comment.created").expect("valid");
        assert!(pattern.matches("comment.created"));
        assert!(!pattern.matches("comment.deleted"));
        assert!(!pattern.matches("comment"));
        assert!(!pattern.matches("comment.created.extra"));
    }

    #[test]
    fn wildcard_matches_one_segment() {
        let pattern = TopicPattern::parse("user.watchlist.token.*").expect("valid");
        assert!(pattern.matches("user.watchlist.token.added"));
        assert!(pattern.matches("user.watchlist.token.removed"));
        assert!(!pattern.matches("user.watchlist.token"));
        assert!(!pattern.matches("user.created"));
    }

    #[test]
    fn invalid_patterns_are_rejected() {
        assert!(TopicPattern::parse("").is_err());
        assert!(TopicPattern::parse("a..b").is_err());
        assert!(TopicPattern::parse("*.*").is_err());
    }

    #[tokio::test]
    async fn events_reach_matching_handlers_in_order() {
        let bus = EventBus::new();
        let (tx, mut rx) = mpsc::channel::<String>(8);
        bus.on("emoji.*", move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.aggregate_id).await;
            }
        })
        .expect("registered");

        for i in 0..3 {
            bus.emit(BusEvent::new("emoji.reacted", format!("t{i}"), json!({})))
                .await;
        }
        // Non-matching topic is ignored.
        bus.emit(BusEvent::new("comment.created", "x", json!({})))
            .await;

        for i in 0..3 {
            let got = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .expect("timely")
                .expect("open");
            assert_eq!(got, format!("t{i}"));
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn listener_cap_is_enforced_per_pattern() {
        let bus = EventBus::new();
        for _ in 0..MAX_LISTENERS_PER_PATTERN {
            bus.on("user.created", |_| async {}).expect("under cap");
        }
        assert!(bus.on("user.created", |_| async {}).is_err());
        // A different pattern still registers.
        bus.on("user.*", |_| async {}).expect("other pattern");
    }
}
