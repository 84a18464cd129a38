//! In-memory keyspace transport.
//!
//! One `tokio::sync::broadcast` channel per key, created on first
//! subscription, plus one channel carrying every event for pattern
//! subscribers. A subscriber that falls more than `capacity` events behind
//! on a channel skips the oldest ones.

use super::{RawEventStream, Transport, TransportCapabilities};
use crate::cancel::until_cancelled;
use crate::error::TransportError;
use crate::metrics;
use crate::pattern::KeyPattern;
use crate::store::Sequenced;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use dashmap::DashMap;
use ebus_types::EventKey;
use futures::{future, stream, Stream, StreamExt};
use std::collections::BTreeSet;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

const NAME: &str = "keyspace";

/// Broadcast-channel transport with pattern support.
pub struct KeyspaceTransport {
    channels: DashMap<EventKey, broadcast::Sender<Sequenced>>,
    pattern_channel: broadcast::Sender<Sequenced>,
    capacity: usize,
    shutdown: CancellationToken,
}

impl KeyspaceTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a transport buffering `capacity` events per subscriber per key.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (pattern_channel, _) = broadcast::channel(capacity);
        Self {
            channels: DashMap::new(),
            pattern_channel,
            capacity,
            shutdown: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of keys with at least one channel allocated.
    #[must_use]
    pub fn active_keys(&self) -> usize {
        self.channels.len()
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::Closed { transport: NAME });
        }
        Ok(())
    }

    /// Wrap `events` so it ends when the transport shuts down.
    fn until_shutdown(
        &self,
        events: impl Stream<Item = Sequenced> + Send + 'static,
    ) -> RawEventStream {
        Box::pin(until_cancelled(&self.shutdown, events))
    }
}

impl Default for KeyspaceTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Live events from one broadcast receiver; lagged gaps are skipped.
fn live(
    receiver: broadcast::Receiver<Sequenced>,
) -> impl Stream<Item = Sequenced> + Send + 'static {
    BroadcastStream::new(receiver).filter_map(|item| {
        future::ready(match item {
            Ok(written) => Some(written),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                debug!(skipped, "Subscriber lagged, oldest events dropped");
                metrics::record_subscriber_lagged(skipped);
                None
            }
        })
    })
}

#[async_trait]
impl Transport for KeyspaceTransport {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            supports_pattern_subscribe: true,
        }
    }

    async fn publish(&self, written: &Sequenced) -> Result<(), TransportError> {
        self.ensure_open()?;
        let key = written.event.event_key();

        let delivered = match self.channels.get(&key) {
            Some(sender) => sender.send(written.clone()).ok(),
            None => None,
        };

        // Every receiver is gone; reclaim the channel.
        if delivered.is_none() {
            self.channels
                .remove_if(&key, |_, sender| sender.receiver_count() == 0);
        }

        if self.pattern_channel.receiver_count() > 0 {
            let _ = self.pattern_channel.send(written.clone());
        }

        debug!(
            event_key = %key,
            sequence = written.sequence,
            receivers = delivered.unwrap_or(0),
            "Event published"
        );
        Ok(())
    }

    async fn subscribe(&self, keys: &[EventKey]) -> Result<RawEventStream, TransportError> {
        self.ensure_open()?;

        let unique: BTreeSet<&EventKey> = keys.iter().collect();
        let receivers = unique.into_iter().map(|key| {
            let receiver = self
                .channels
                .entry(key.clone())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe();
            live(receiver)
        });

        debug!(keys = keys.len(), "Keyspace subscription registered");
        Ok(self.until_shutdown(stream::select_all(receivers.map(Box::pin))))
    }

    async fn pattern_subscribe(
        &self,
        pattern: &KeyPattern,
    ) -> Result<RawEventStream, TransportError> {
        self.ensure_open()?;

        let pattern = pattern.clone();
        debug!(pattern = %pattern, "Keyspace pattern subscription registered");
        let matching = live(self.pattern_channel.subscribe())
            .filter(move |written| future::ready(pattern.matches(&written.event.event_key())));
        Ok(self.until_shutdown(matching))
    }

    async fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        self.channels.clear();
        debug!(transport = NAME, "Transport shut down");
    }
}
