//! Dedicated pub/sub connection.
//!
//! A connection in subscribe mode cannot multiplex commands, so the
//! process keeps exactly one subscriber connection, split into a command
//! sink and a message stream with their own pump tasks.

use anyhow::{Context, Result};
use futures::StreamExt;
use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

enum SinkCommand {
    Subscribe(String),
    Unsubscribe(String),
}

/// Handle to the process-wide subscriber connection.
pub struct KvSubscriber {
    sink_tx: mpsc::UnboundedSender<SinkCommand>,
}

impl KvSubscriber {
    /// Open the subscriber connection and start its pumps. `on_message`
    /// runs for every message on any subscribed channel.
    pub async fn start<F>(url: &str, cancel: CancellationToken, on_message: F) -> Result<Self>
    where
        F: Fn(&str, String) + Send + Sync + 'static,
    {
        let client = redis::Client::open(url).context("Invalid KV URL")?;
        let pubsub = client
            .get_async_pubsub()
            .await
            .context("Failed to open KV subscriber connection")?;
        let (mut sink, mut stream) = pubsub.split();

        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel::<SinkCommand>();
        tokio::spawn(async move {
            while let Some(command) = sink_rx.recv().await {
                let result = match &command {
                    SinkCommand::Subscribe(channel) => sink.subscribe(channel).await,
                    SinkCommand::Unsubscribe(channel) => sink.unsubscribe(channel).await,
                };
                if let Err(err) = result {
                    error!("KV subscriber command failed: {err}");
                }
            }
        });

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    message = stream.next() => match message {
                        Some(message) => {
                            let channel = message.get_channel_name().to_string();
                            match message.get_payload::<String>() {
                                Ok(payload) => on_message(&channel, payload),
                                Err(err) => warn!("Undecodable message on '{channel}': {err}"),
                            }
                        }
                        None => {
                            warn!("KV subscriber stream closed");
                            break;
                        }
                    }
                }
            }
        });

        info!("KV subscriber connection established");
        Ok(Self { sink_tx })
    }

    pub fn subscribe(&self, channel: &str) {
        let _ = self.sink_tx.send(SinkCommand::Subscribe(channel.to_string()));
    }

    pub fn unsubscribe(&self, channel: &str) {
        let _ = self
            .sink_tx
            .send(SinkCommand::Unsubscribe(channel.to_string()));
    }
}
