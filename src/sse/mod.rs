//! SSE broadcast fabric.
//!
//! One upstream pub/sub subscription per channel is shared by every
//! in-process client via a tokio broadcast sender. Each client gets a
//! bounded buffer; when it fills, the connection is dropped instead of
//! growing memory. When the last client of a channel leaves, the
//! upstream subscription is released.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use log::warn;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::kv::KvSubscriber;

/// Buffered messages per channel before slow fan-out lags.
const CHANNEL_CAPACITY: usize = 256;

/// Buffered events per client before the connection is dropped.
const CLIENT_BUFFER: usize = 64;

/// Per-channel fan-out bookkeeping, separated from the KV plumbing so the
/// subscription lifecycle is testable.
#[derive(Default)]
struct Registry {
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl Registry {
    /// Returns the receiver and whether the channel was newly created.
    fn subscribe(&self, channel: &str) -> (broadcast::Receiver<String>, bool) {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(tx) = channels.get(channel) {
            return (tx.subscribe(), false);
        }
        let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
        channels.insert(channel.to_string(), tx);
        (rx, true)
    }

    fn dispatch(&self, channel: &str, payload: String) {
        let channels = self
            .channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(tx) = channels.get(channel) {
            // Send only fails with zero receivers; release() handles that.
            let _ = tx.send(payload);
        }
    }

    /// Returns true when the channel had no receivers left and was
    /// removed.
    fn release(&self, channel: &str) -> bool {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let empty = channels
            .get(channel)
            .map(|tx| tx.receiver_count() == 0)
            .unwrap_or(false);
        if empty {
            channels.remove(channel);
        }
        empty
    }

    fn len(&self) -> usize {
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

/// The per-resource live-update hub backing every SSE endpoint.
pub struct ChannelHub {
    subscriber: KvSubscriber,
    registry: Arc<Registry>,
    shutdown: CancellationToken,
}

impl ChannelHub {
    pub async fn start(url: &str, shutdown: CancellationToken) -> Result<Arc<Self>> {
        let registry = Arc::new(Registry::default());
        let dispatch = registry.clone();
        let subscriber = KvSubscriber::start(url, shutdown.child_token(), move |channel, payload| {
            dispatch.dispatch(channel, payload);
        })
        .await?;

        Ok(Arc::new(Self {
            subscriber,
            registry,
            shutdown,
        }))
    }

    /// Join a channel, creating the upstream subscription on first use.
    pub fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        let (rx, created) = self.registry.subscribe(channel);
        if created {
            self.subscriber.subscribe(channel);
        }
        rx
    }

    /// Drop the upstream subscription once the last client left.
    pub fn release(&self, channel: &str) {
        if self.registry.release(channel) {
            self.subscriber.unsubscribe(channel);
        }
    }

    pub fn active_channels(&self) -> usize {
        self.registry.len()
    }
}

/// Build the long-lived SSE body for one client: a `connection` event,
/// the snapshot, then channel deltas in publish order. `delta_event` of
/// `None` forwards deltas as anonymous events.
pub fn stream_events(
    hub: Arc<ChannelHub>,
    channel: String,
    connection_payload: Value,
    snapshot_event: &'static str,
    snapshot_payload: Value,
    delta_event: Option<&'static str>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Event>(CLIENT_BUFFER);
    let mut deltas = hub.subscribe(&channel);
    let shutdown = hub.shutdown.child_token();

    tokio::spawn(async move {
        let connection = Event::default()
            .event("connection")
            .data(connection_payload.to_string());
        let snapshot = Event::default()
            .event(snapshot_event)
            .data(snapshot_payload.to_string());
        if tx.send(connection).await.is_err() || tx.send(snapshot).await.is_err() {
            drop(deltas);
            hub.release(&channel);
            return;
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tx.closed() => break,
                received = deltas.recv() => match received {
                    Ok(payload) => {
                        let event = match delta_event {
                            Some(name) => Event::default().event(name).data(payload),
                            None => Event::default().data(payload),
                        };
                        match tx.try_send(event) {
                            Ok(()) => {}
                            Err(mpsc::error::TrySendError::Full(_)) => {
                                warn!("Slow SSE client on '{channel}', closing connection");
                                break;
                            }
                            Err(mpsc::error::TrySendError::Closed(_)) => break,
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("SSE fan-out lagged {skipped} messages on '{channel}'");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }

        drop(deltas);
        hub.release(&channel);
    });

    Sse::new(ReceiverStream::new(rx).map(Ok)).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_subscriber_creates_the_channel() {
        let registry = Registry::default();
        let (_rx, created) = registry.subscribe("comments:0xt");
        assert!(created);
        let (_rx2, created2) = registry.subscribe("comments:0xt");
        assert!(!created2);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn release_removes_channel_only_when_empty() {
        let registry = Registry::default();
        let (rx1, _) = registry.subscribe("emojiUpdates:0xt");
        let (rx2, _) = registry.subscribe("emojiUpdates:0xt");

        drop(rx1);
        assert!(!registry.release("emojiUpdates:0xt"));
        assert_eq!(registry.len(), 1);

        drop(rx2);
        assert!(registry.release("emojiUpdates:0xt"));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn dispatch_reaches_subscribers() {
        let registry = Registry::default();
        let (mut rx, _) = registry.subscribe("new-tokens:updates");
        registry.dispatch("new-tokens:updates", "hello".to_string());
        assert_eq!(rx.try_recv().expect("delivered"), "hello");
    }

    #[test]
    fn dispatch_to_unknown_channel_is_a_noop() {
        let registry = Registry::default();
        registry.dispatch("nobody:listening", "hello".to_string());
        assert_eq!(registry.len(), 0);
    }
}
