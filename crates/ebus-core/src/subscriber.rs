//! # Event Subscriber
//!
//! Subscribing side of the event service.
//!
//! Key subscriptions first emit one seed per key (its latest event, or the
//! invalid event if nothing was published), then every live publish on
//! those keys. Pattern subscriptions deliver live events only.
//!
//! Every flavour runs on the same driver; they differ only in how events
//! reach the consumer:
//!
//! | Method | Consumer |
//! |--------|----------|
//! | `subscribe` | [`EventStream`] |
//! | `subscribe_callback` | `FnMut(Event)` |
//! | `subscribe_async` | `FnMut(Event) -> Future`, awaited one at a time |
//! | `subscribe_channel` | an `mpsc::Sender<Event>` owned by the caller |
//!
//! The `_every` variants put a rate controller in front of the consumer.
//! Setup errors (no keys, bad pattern, unsupported pattern subscription,
//! zero interval) are returned before anything is spawned. All subscribe
//! methods must be called inside a tokio runtime.

use crate::error::EventServiceError;
use crate::pattern::KeyPattern;
use crate::rate::{RateControl, SubscriptionMode};
use crate::store::LatestValueStore;
use crate::subscription::{Delivery, EventStream, EventSubscription, Plan, Target};
use crate::transport::Transport;
use ebus_types::{Event, EventKey, Subsystem};
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Creates subscriptions against a shared store and transport.
#[derive(Clone)]
pub struct EventSubscriber {
    store: Arc<LatestValueStore>,
    transport: Arc<dyn Transport>,
    buffer: usize,
}

impl std::fmt::Debug for EventSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscriber")
            .field("transport", &self.transport.name())
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

impl EventSubscriber {
    /// `buffer` bounds the events queued between a driver and its stream.
    pub fn new(store: Arc<LatestValueStore>, transport: Arc<dyn Transport>, buffer: usize) -> Self {
        Self {
            store,
            transport,
            buffer: buffer.max(1),
        }
    }

    /// Stream the seeds and live events for `keys`.
    ///
    /// # Errors
    ///
    /// - `EventServiceError::EmptyKeySet` if `keys` is empty.
    pub fn subscribe(
        &self,
        keys: impl IntoIterator<Item = EventKey>,
    ) -> Result<EventStream, EventServiceError> {
        Ok(self.key_plan(keys, None)?.spawn_stream(self.buffer))
    }

    /// As [`subscribe`](Self::subscribe), rate controlled.
    ///
    /// # Errors
    ///
    /// - `EventServiceError::EmptyKeySet` if `keys` is empty.
    /// - `EventServiceError::InvalidInterval` if `every` is zero.
    pub fn subscribe_every(
        &self,
        keys: impl IntoIterator<Item = EventKey>,
        every: Duration,
        mode: SubscriptionMode,
    ) -> Result<EventStream, EventServiceError> {
        let rate = RateControl::new(every, mode)?;
        Ok(self.key_plan(keys, Some(rate))?.spawn_stream(self.buffer))
    }

    /// Invoke `callback` for every event, on the driver task.
    ///
    /// # Errors
    ///
    /// - `EventServiceError::EmptyKeySet` if `keys` is empty.
    pub fn subscribe_callback<F>(
        &self,
        keys: impl IntoIterator<Item = EventKey>,
        callback: F,
    ) -> Result<EventSubscription, EventServiceError>
    where
        F: FnMut(Event) + Send + 'static,
    {
        Ok(self
            .key_plan(keys, None)?
            .spawn(Delivery::Callback(Box::new(callback))))
    }

    /// # Errors
    ///
    /// - `EventServiceError::EmptyKeySet` if `keys` is empty.
    /// - `EventServiceError::InvalidInterval` if `every` is zero.
    pub fn subscribe_callback_every<F>(
        &self,
        keys: impl IntoIterator<Item = EventKey>,
        callback: F,
        every: Duration,
        mode: SubscriptionMode,
    ) -> Result<EventSubscription, EventServiceError>
    where
        F: FnMut(Event) + Send + 'static,
    {
        let rate = RateControl::new(every, mode)?;
        Ok(self
            .key_plan(keys, Some(rate))?
            .spawn(Delivery::Callback(Box::new(callback))))
    }

    /// Invoke an asynchronous `callback` for every event. Each call is
    /// awaited before the next event is delivered.
    ///
    /// # Errors
    ///
    /// - `EventServiceError::EmptyKeySet` if `keys` is empty.
    pub fn subscribe_async<F, Fut>(
        &self,
        keys: impl IntoIterator<Item = EventKey>,
        callback: F,
    ) -> Result<EventSubscription, EventServiceError>
    where
        F: FnMut(Event) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Ok(self.key_plan(keys, None)?.spawn(async_delivery(callback)))
    }

    /// # Errors
    ///
    /// - `EventServiceError::EmptyKeySet` if `keys` is empty.
    /// - `EventServiceError::InvalidInterval` if `every` is zero.
    pub fn subscribe_async_every<F, Fut>(
        &self,
        keys: impl IntoIterator<Item = EventKey>,
        callback: F,
        every: Duration,
        mode: SubscriptionMode,
    ) -> Result<EventSubscription, EventServiceError>
    where
        F: FnMut(Event) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let rate = RateControl::new(every, mode)?;
        Ok(self
            .key_plan(keys, Some(rate))?
            .spawn(async_delivery(callback)))
    }

    /// Push every event into `sink`. Delivery waits while `sink` is full and
    /// stops when its receiver is dropped.
    ///
    /// # Errors
    ///
    /// - `EventServiceError::EmptyKeySet` if `keys` is empty.
    pub fn subscribe_channel(
        &self,
        keys: impl IntoIterator<Item = EventKey>,
        sink: mpsc::Sender<Event>,
    ) -> Result<EventSubscription, EventServiceError> {
        Ok(self.key_plan(keys, None)?.spawn(Delivery::Channel(sink)))
    }

    /// # Errors
    ///
    /// - `EventServiceError::EmptyKeySet` if `keys` is empty.
    /// - `EventServiceError::InvalidInterval` if `every` is zero.
    pub fn subscribe_channel_every(
        &self,
        keys: impl IntoIterator<Item = EventKey>,
        sink: mpsc::Sender<Event>,
        every: Duration,
        mode: SubscriptionMode,
    ) -> Result<EventSubscription, EventServiceError> {
        let rate = RateControl::new(every, mode)?;
        Ok(self
            .key_plan(keys, Some(rate))?
            .spawn(Delivery::Channel(sink)))
    }

    /// Stream live events on every key of `subsystem` matching `pattern`.
    ///
    /// # Errors
    ///
    /// - `EventServiceError::InvalidPattern` for a malformed pattern.
    /// - `EventServiceError::PatternSubscriptionUnsupported` if the transport
    ///   cannot match patterns.
    pub fn pattern_subscribe(
        &self,
        subsystem: Subsystem,
        pattern: &str,
    ) -> Result<EventStream, EventServiceError> {
        let pattern = KeyPattern::new(subsystem, pattern)?;
        Ok(self.pattern_plan(pattern, false)?.spawn_stream(self.buffer))
    }

    /// Invoke `callback` for every live event matching `pattern`.
    ///
    /// # Errors
    ///
    /// As for [`pattern_subscribe`](Self::pattern_subscribe).
    pub fn pattern_subscribe_callback<F>(
        &self,
        subsystem: Subsystem,
        pattern: &str,
        callback: F,
    ) -> Result<EventSubscription, EventServiceError>
    where
        F: FnMut(Event) + Send + 'static,
    {
        let pattern = KeyPattern::new(subsystem, pattern)?;
        Ok(self
            .pattern_plan(pattern, false)?
            .spawn(Delivery::Callback(Box::new(callback))))
    }

    /// Stream observe events from every subsystem.
    ///
    /// # Errors
    ///
    /// - `EventServiceError::PatternSubscriptionUnsupported` if the transport
    ///   cannot match patterns.
    pub fn subscribe_observe_events(&self) -> Result<EventStream, EventServiceError> {
        Ok(self
            .pattern_plan(KeyPattern::everything(), true)?
            .spawn_stream(self.buffer))
    }

    /// Latest event for `key`, or its invalid event.
    #[must_use]
    pub fn get(&self, key: &EventKey) -> Event {
        self.store.get(key)
    }

    /// Latest events for `keys`, one per distinct key.
    #[must_use]
    pub fn get_all<'a>(&self, keys: impl IntoIterator<Item = &'a EventKey>) -> Vec<Event> {
        self.store.get_all(keys)
    }

    fn key_plan(
        &self,
        keys: impl IntoIterator<Item = EventKey>,
        rate: Option<RateControl>,
    ) -> Result<Plan, EventServiceError> {
        let keys: Vec<EventKey> = keys.into_iter().collect();
        if keys.is_empty() {
            return Err(EventServiceError::EmptyKeySet);
        }
        debug!(keys = keys.len(), rate = ?rate, "Creating key subscription");
        Ok(self.plan(Target::Keys(keys), rate))
    }

    fn pattern_plan(
        &self,
        pattern: KeyPattern,
        observe_only: bool,
    ) -> Result<Plan, EventServiceError> {
        if !self.transport.capabilities().supports_pattern_subscribe {
            return Err(EventServiceError::PatternSubscriptionUnsupported {
                transport: self.transport.name(),
            });
        }
        debug!(pattern = %pattern, observe_only, "Creating pattern subscription");
        Ok(self.plan(
            Target::Pattern {
                pattern,
                observe_only,
            },
            None,
        ))
    }

    fn plan(&self, target: Target, rate: Option<RateControl>) -> Plan {
        Plan {
            target,
            rate,
            store: Arc::clone(&self.store),
            transport: Arc::clone(&self.transport),
        }
    }
}

fn async_delivery<F, Fut>(mut callback: F) -> Delivery
where
    F: FnMut(Event) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Delivery::Async(Box::new(move |event| callback(event).boxed()))
}
