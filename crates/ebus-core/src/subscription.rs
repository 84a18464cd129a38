//! # Subscriptions
//!
//! Every subscription runs one driver task that owns its whole pipeline:
//!
//! ```text
//! transport registration -> [seed from store] -> live events
//!     -> [filter] -> [rate controller] -> delivery (channel, callback, async callback)
//! ```
//!
//! The caller keeps an [`EventSubscription`] handle whose `ready()` and
//! `unsubscribe()` are completion signals separate from the data itself.
//!
//! ## Lifecycle
//!
//! `Pending` → `Ready` → `Cancelled`, or `Pending` → `Failed` when the
//! transport refuses the registration. `Ready` is entered only after the
//! transport registration completes, so every publish that starts after
//! `ready()` resolves is observed.
//!
//! Seeds are read after registration. Live events carry the store sequence
//! of their write, and any live event no newer than its key's seed is
//! dropped, so a publish racing with activation is delivered once and never
//! after a newer seed.
//!
//! The driver task owns the final transition: when it stops after a cancel
//! it moves the state to `Cancelled` and releases every `unsubscribe()`
//! waiter, whether or not the caller that cancelled is still waiting.

use crate::error::EventServiceError;
use crate::metrics;
use crate::pattern::KeyPattern;
use crate::rate::{rate_controlled, RateControl};
use crate::store::{LatestValueStore, Sequenced};
use crate::transport::Transport;
use ebus_types::{Event, EventKey};
use futures::future::{BoxFuture, FutureExt};
use futures::{stream, Stream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Where a subscription is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Registration with the transport is in progress.
    Pending,
    /// Every later publish on the subscribed keys will be observed.
    Ready,
    /// Registration failed; nothing will be delivered.
    Failed,
    /// Unsubscribed; nothing more will be delivered.
    Cancelled,
}

/// What a subscription listens to.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    Keys(Vec<EventKey>),
    Pattern {
        pattern: KeyPattern,
        observe_only: bool,
    },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Keys(keys) => {
                let keys: Vec<String> = keys.iter().map(EventKey::canonical).collect();
                write!(f, "keys[{}]", keys.join(","))
            }
            Target::Pattern { pattern, .. } => write!(f, "pattern[{pattern}]"),
        }
    }
}

pub(crate) type EventCallback = Box<dyn FnMut(Event) + Send>;
pub(crate) type AsyncEventCallback = Box<dyn FnMut(Event) -> BoxFuture<'static, ()> + Send>;

/// How events leave the driver task.
pub(crate) enum Delivery {
    Channel(mpsc::Sender<Event>),
    Callback(EventCallback),
    Async(AsyncEventCallback),
}

impl Delivery {
    /// Hand `event` to the consumer. Returns `false` once the consumer is gone.
    async fn deliver(&mut self, event: Event, target: &Target) -> bool {
        match self {
            Delivery::Channel(sender) => sender.send(event).await.is_ok(),
            Delivery::Callback(callback) => {
                if std::panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                    error!(subscription = %target, "Subscription callback panicked");
                }
                true
            }
            Delivery::Async(callback) => {
                let pending = AssertUnwindSafe(callback(event)).catch_unwind();
                if pending.await.is_err() {
                    error!(subscription = %target, "Async subscription callback panicked");
                }
                true
            }
        }
    }
}

struct Inner {
    target: Target,
    state: watch::Sender<SubscriptionState>,
    failure: Mutex<Option<EventServiceError>>,
    became_ready: AtomicBool,
    /// Raised to stop the driver.
    cancel: CancellationToken,
    /// Raised by the driver when it has stopped.
    stopped: CancellationToken,
}

impl Inner {
    fn mark_ready(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == SubscriptionState::Pending {
                *state = SubscriptionState::Ready;
                true
            } else {
                false
            }
        });
        if changed {
            self.became_ready.store(true, Ordering::Release);
            debug!(subscription = %self.target, "Subscription ready");
        }
    }

    fn fail(&self, error: EventServiceError) {
        warn!(subscription = %self.target, error = %error, "Subscription failed");
        *self.failure.lock() = Some(error);
        self.state.send_if_modified(|state| {
            if *state == SubscriptionState::Pending {
                *state = SubscriptionState::Failed;
                true
            } else {
                false
            }
        });
    }
}

/// Handle to a live subscription.
///
/// Cloning yields another handle to the same subscription. Dropping every
/// handle does not stop a callback subscription; call
/// [`unsubscribe`](Self::unsubscribe).
#[derive(Clone)]
pub struct EventSubscription {
    inner: Arc<Inner>,
}

impl fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscription")
            .field("target", &self.inner.target.to_string())
            .field("state", &self.state())
            .finish()
    }
}

impl EventSubscription {
    /// Resolves once the subscription is guaranteed to observe later publishes.
    ///
    /// # Errors
    ///
    /// - The registration error if the transport refused the subscription.
    /// - `EventServiceError::SubscriptionCancelled` if unsubscribed first.
    pub async fn ready(&self) -> Result<(), EventServiceError> {
        let mut state = self.inner.state.subscribe();
        let reached = state
            .wait_for(|state| *state != SubscriptionState::Pending)
            .await
            .map(|state| *state);

        match reached {
            Ok(SubscriptionState::Ready) => Ok(()),
            Ok(SubscriptionState::Failed) => Err(self
                .inner
                .failure
                .lock()
                .clone()
                .unwrap_or_else(|| EventServiceError::SubscriptionFailed("unknown".into()))),
            Ok(SubscriptionState::Cancelled) if self.inner.became_ready.load(Ordering::Acquire) => {
                Ok(())
            }
            _ => Err(EventServiceError::SubscriptionCancelled),
        }
    }

    /// Stop delivery. Resolves after the driver task has stopped; no event
    /// reaches the consumer afterwards. Idempotent and safe to call from
    /// several tasks at once, from inside an async callback of this same
    /// subscription, or under a timeout: the stop completes even if this
    /// future is dropped.
    pub async fn unsubscribe(&self) {
        self.inner.cancel.cancel();
        self.inner.stopped.cancelled().await;
        // The driver may have ended on its own before the cancel.
        self.inner.state.send_replace(SubscriptionState::Cancelled);
    }

    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        *self.inner.state.borrow()
    }

    /// Whether the subscription was cancelled, by `unsubscribe` or by
    /// dropping its stream.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }
}

/// Stream of events for one subscription.
///
/// Yields `None` once the subscription is cancelled, even if events were
/// still buffered. Dropping the stream cancels the subscription.
pub struct EventStream {
    events: mpsc::Receiver<Event>,
    subscription: EventSubscription,
}

impl EventStream {
    /// The handle controlling this stream.
    #[must_use]
    pub fn subscription(&self) -> &EventSubscription {
        &self.subscription
    }

    /// See [`EventSubscription::ready`].
    ///
    /// # Errors
    ///
    /// As for [`EventSubscription::ready`].
    pub async fn ready(&self) -> Result<(), EventServiceError> {
        self.subscription.ready().await
    }

    /// See [`EventSubscription::unsubscribe`].
    pub async fn unsubscribe(&self) {
        self.subscription.unsubscribe().await;
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.subscription.is_cancelled() {
            return Poll::Ready(None);
        }
        self.events.poll_recv(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.subscription.inner.cancel.cancel();
    }
}

/// Keeps the active-subscription gauge in step with driver lifetimes.
struct ActiveGuard;

impl ActiveGuard {
    fn new() -> Self {
        metrics::subscription_opened();
        Self
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        metrics::subscription_closed();
    }
}

/// Everything a driver task needs.
pub(crate) struct Plan {
    pub target: Target,
    pub rate: Option<RateControl>,
    pub store: Arc<LatestValueStore>,
    pub transport: Arc<dyn Transport>,
}

impl Plan {
    /// Spawn the driver task. Must be called inside a tokio runtime.
    pub(crate) fn spawn(self, delivery: Delivery) -> EventSubscription {
        let (state, _) = watch::channel(SubscriptionState::Pending);
        let inner = Arc::new(Inner {
            target: self.target.clone(),
            state,
            failure: Mutex::new(None),
            became_ready: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            stopped: CancellationToken::new(),
        });

        let driver = Arc::clone(&inner);
        tokio::spawn(async move {
            // Dropped last, also on panic or runtime shutdown.
            let _stopped = driver.stopped.clone().drop_guard();
            tokio::select! {
                biased;
                () = driver.cancel.cancelled() => {}
                () = self.run(delivery, &driver) => {}
            }
            if driver.cancel.is_cancelled() {
                driver.state.send_replace(SubscriptionState::Cancelled);
                debug!(subscription = %driver.target, "Unsubscribed");
            }
        });

        EventSubscription { inner }
    }

    /// Spawn a driver feeding a bounded stream.
    pub(crate) fn spawn_stream(self, buffer: usize) -> EventStream {
        let (sender, events) = mpsc::channel(buffer.max(1));
        let subscription = self.spawn(Delivery::Channel(sender));
        EventStream {
            events,
            subscription,
        }
    }

    async fn run(self, mut delivery: Delivery, inner: &Inner) {
        let _active = ActiveGuard::new();

        let registered = match &self.target {
            Target::Keys(keys) => self.transport.subscribe(keys).await,
            Target::Pattern { pattern, .. } => self.transport.pattern_subscribe(pattern).await,
        };
        let live = match registered {
            Ok(live) => live,
            Err(e) => {
                inner.fail(e.into());
                return;
            }
        };
        inner.mark_ready();

        // Pattern subscriptions are not seeded.
        let seeds = match &self.target {
            Target::Keys(keys) => self.store.snapshot(keys),
            Target::Pattern { .. } => Vec::new(),
        };
        let covered: HashMap<EventKey, u64> = seeds
            .iter()
            .map(|seed| (seed.event.event_key(), seed.sequence))
            .collect();
        let observe_only = matches!(
            self.target,
            Target::Pattern {
                observe_only: true,
                ..
            }
        );
        let live = live.filter_map(move |written| {
            futures::future::ready(newer_than_seed(&covered, written))
        });
        let events = stream::iter(seeds.into_iter().map(|seed| seed.event))
            .chain(live)
            .filter(move |event| futures::future::ready(!observe_only || event.is_observe()));

        let mut events: Pin<Box<dyn Stream<Item = Event> + Send>> = match self.rate {
            Some(control) => Box::pin(rate_controlled(Box::pin(events), control)),
            None => Box::pin(events),
        };

        while let Some(event) = events.next().await {
            if !delivery.deliver(event, &self.target).await {
                debug!(subscription = %self.target, "Consumer dropped, stopping subscription");
                return;
            }
            metrics::record_delivered();
        }
        debug!(subscription = %self.target, "Transport stream ended");
    }
}

/// `written`'s event, unless the seed for its key already covers it.
fn newer_than_seed(covered: &HashMap<EventKey, u64>, written: Sequenced) -> Option<Event> {
    let key = written.event.event_key();
    match covered.get(&key) {
        Some(&seed) if written.sequence <= seed => {
            debug!(event_key = %key, sequence = written.sequence, "Live event covered by seed");
            None
        }
        _ => Some(written.event),
    }
}
