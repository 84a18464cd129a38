//! # Latest Value Store
//!
//! Per-key cache of the most recently published event.
//!
//! ## Invariants
//!
//! - After a successful publish of `e` for key `k`, `get(k)` returns `e`
//!   until superseded.
//! - A key that was never written reads as `Event::invalid(k)`.
//! - Writes are synchronized per key (sharded map); unrelated keys never
//!   contend on a common lock.
//! - Every write is stamped with a sequence number, increasing across the
//!   whole store. Transports carry the stamp so subscribers can discard live
//!   events already covered by their seed. Invalid events have sequence 0.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ebus_types::{Event, EventId, EventKey};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// An event with the sequence number of the write that stored it.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequenced {
    pub sequence: u64,
    pub event: Event,
}

impl Sequenced {
    /// Stamp for a key that was never written.
    #[must_use]
    pub fn invalid(key: &EventKey) -> Self {
        Self {
            sequence: 0,
            event: Event::invalid(key),
        }
    }
}

/// Mapping from key to latest event, shared by publishers and subscribers.
#[derive(Debug, Default)]
pub struct LatestValueStore {
    entries: DashMap<EventKey, Sequenced>,
    last_sequence: AtomicU64,
}

impl LatestValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Unconditionally overwrite the entry for `key`.
    ///
    /// Returns the stamped write and the previous entry, so a failed
    /// publish can be undone.
    pub fn put(&self, key: EventKey, event: Event) -> (Sequenced, Option<Sequenced>) {
        // The shard lock is held while the sequence is drawn, so stamps on
        // one key increase in write order.
        let slot = self.entries.entry(key);
        let written = Sequenced {
            sequence: self.last_sequence.fetch_add(1, Ordering::Relaxed) + 1,
            event,
        };
        let previous = match slot {
            Entry::Occupied(mut occupied) => Some(occupied.insert(written.clone())),
            Entry::Vacant(vacant) => {
                vacant.insert(written.clone());
                None
            }
        };
        (written, previous)
    }

    /// Latest event for `key`, or its invalid event if never set.
    #[must_use]
    pub fn get(&self, key: &EventKey) -> Event {
        self.get_sequenced(key).event
    }

    /// Latest entry for `key` with its stamp.
    #[must_use]
    pub fn get_sequenced(&self, key: &EventKey) -> Sequenced {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| Sequenced::invalid(key))
    }

    /// Point-in-time snapshot with one entry per distinct key.
    pub fn get_all<'a>(&self, keys: impl IntoIterator<Item = &'a EventKey>) -> Vec<Event> {
        self.snapshot(keys)
            .into_iter()
            .map(|entry| entry.event)
            .collect()
    }

    /// As [`get_all`](Self::get_all), keeping the stamps.
    pub fn snapshot<'a>(&self, keys: impl IntoIterator<Item = &'a EventKey>) -> Vec<Sequenced> {
        keys.into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|key| self.get_sequenced(key))
            .collect()
    }

    /// Undo a `put` of the event `failed` if it is still the current entry.
    ///
    /// A newer write from another publisher is left in place.
    pub fn restore(&self, key: &EventKey, failed: &EventId, previous: Option<Sequenced>) {
        let Some(mut entry) = self.entries.get_mut(key) else {
            return;
        };
        if entry.event.event_id() != failed {
            return;
        }

        match previous {
            Some(previous) => *entry = previous,
            None => {
                drop(entry);
                self.entries
                    .remove_if(key, |_, current| current.event.event_id() == failed);
            }
        }
        debug!(event_key = %key, "Restored latest value after failed publish");
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
