//! Append-only log transport.
//!
//! Each key owns a partition holding the encoded events most recently
//! published on it, bounded by a retention count. Readers start at the
//! partition head when they subscribe and follow it; a reader overtaken by
//! retention jumps to the oldest retained entry.
//!
//! Events cross this transport in their wire encoding, so a codec failure
//! surfaces as a publish error. Pattern subscription is not supported.

use super::{RawEventStream, Transport, TransportCapabilities};
use crate::cancel::until_cancelled;
use crate::error::TransportError;
use crate::metrics;
use crate::pattern::KeyPattern;
use crate::store::Sequenced;
use crate::DEFAULT_LOG_RETENTION;
use async_trait::async_trait;
use dashmap::DashMap;
use ebus_types::{Event, EventKey};
use futures::stream;
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const NAME: &str = "log";

/// An encoded event and its store sequence.
type Entry = (u64, Vec<u8>);

struct Partition {
    entries: VecDeque<Entry>,
    /// Offset of `entries[0]`.
    base: u64,
    /// Offset the next append will receive.
    head: watch::Sender<u64>,
}

impl Partition {
    fn new() -> Self {
        let (head, _) = watch::channel(0);
        Self {
            entries: VecDeque::new(),
            base: 0,
            head,
        }
    }

    fn next_offset(&self) -> u64 {
        self.base + self.entries.len() as u64
    }

    fn append(&mut self, entry: Entry, retention: usize) {
        self.entries.push_back(entry);
        while self.entries.len() > retention {
            self.entries.pop_front();
            self.base += 1;
        }
        self.head.send_replace(self.next_offset());
    }

    /// Entry at `offset`, or the oldest retained one if it was trimmed.
    fn read(&self, offset: u64) -> Option<(u64, Entry)> {
        let offset = offset.max(self.base);
        let index = usize::try_from(offset - self.base).ok()?;
        self.entries.get(index).map(|entry| (offset, entry.clone()))
    }
}

type SharedPartition = Arc<Mutex<Partition>>;

struct Reader {
    partition: SharedPartition,
    offset: u64,
    head: watch::Receiver<u64>,
}

impl Reader {
    async fn next_event(mut self) -> Option<(Sequenced, Self)> {
        loop {
            let entry = self.partition.lock().read(self.offset);
            match entry {
                Some((offset, (sequence, bytes))) => {
                    if offset > self.offset {
                        let skipped = offset - self.offset;
                        debug!(skipped, "Log reader overtaken by retention");
                        metrics::record_subscriber_lagged(skipped);
                    }
                    self.offset = offset + 1;
                    match Event::from_bytes(&bytes) {
                        Ok(event) => return Some((Sequenced { sequence, event }, self)),
                        Err(e) => warn!(offset, error = %e, "Skipping undecodable log entry"),
                    }
                }
                None => {
                    if self.head.changed().await.is_err() {
                        return None;
                    }
                }
            }
        }
    }
}

/// Per-key log transport without pattern support.
pub struct LogTransport {
    partitions: DashMap<EventKey, SharedPartition>,
    retention: usize,
    shutdown: CancellationToken,
}

impl LogTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_LOG_RETENTION)
    }

    /// Create a transport keeping at most `retention` events per key.
    #[must_use]
    pub fn with_retention(retention: usize) -> Self {
        Self {
            partitions: DashMap::new(),
            retention: retention.max(1),
            shutdown: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Number of events currently retained for `key`.
    #[must_use]
    pub fn retained(&self, key: &EventKey) -> usize {
        self.partitions
            .get(key)
            .map_or(0, |partition| partition.lock().entries.len())
    }

    fn partition(&self, key: &EventKey) -> SharedPartition {
        self.partitions
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Partition::new())))
            .clone()
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.shutdown.is_cancelled() {
            return Err(TransportError::Closed { transport: NAME });
        }
        Ok(())
    }
}

impl Default for LogTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for LogTransport {
    fn name(&self) -> &'static str {
        NAME
    }

    fn capabilities(&self) -> TransportCapabilities {
        TransportCapabilities {
            supports_pattern_subscribe: false,
        }
    }

    async fn publish(&self, written: &Sequenced) -> Result<(), TransportError> {
        self.ensure_open()?;
        let bytes = written.event.to_bytes()?;
        let key = written.event.event_key();

        let partition = self.partition(&key);
        let offset = {
            let mut partition = partition.lock();
            partition.append((written.sequence, bytes), self.retention);
            partition.next_offset() - 1
        };

        debug!(event_key = %key, offset, "Event appended");
        Ok(())
    }

    async fn subscribe(&self, keys: &[EventKey]) -> Result<RawEventStream, TransportError> {
        self.ensure_open()?;

        let unique: BTreeSet<&EventKey> = keys.iter().collect();
        let readers = unique.into_iter().map(|key| {
            let partition = self.partition(key);
            let (offset, head) = {
                let guard = partition.lock();
                (guard.next_offset(), guard.head.subscribe())
            };
            let reader = Reader {
                partition,
                offset,
                head,
            };
            Box::pin(stream::unfold(reader, Reader::next_event))
        });

        debug!(keys = keys.len(), "Log subscription registered");
        Ok(Box::pin(until_cancelled(
            &self.shutdown,
            stream::select_all(readers),
        )))
    }

    async fn pattern_subscribe(
        &self,
        pattern: &KeyPattern,
    ) -> Result<RawEventStream, TransportError> {
        Err(TransportError::Rejected(format!(
            "{NAME} transport cannot subscribe to pattern '{pattern}'"
        )))
    }

    async fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            self.shutdown.cancel();
            debug!(transport = NAME, "Transport shut down");
        }
    }
}
