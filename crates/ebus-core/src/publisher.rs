//! # Event Publisher
//!
//! Publishing side of the event service.
//!
//! Each publisher owns a FIFO queue drained by one driver task. `publish`
//! enqueues at call time, so the order of `publish` calls is the order in
//! which events reach the store and the transport, whether or not the
//! returned futures are awaited.
//!
//! For every event the driver:
//! 1. writes the latest-value store,
//! 2. hands the event to the transport,
//! 3. on transport failure, restores the previous store entry and reports
//!    a [`PublishFailure`].
//!
//! The queue is shared by every key, so a publisher's events reach the
//! transport in call order across keys as well. The cost is head-of-line
//! blocking: a slow transport write on one key delays the publisher's
//! writes on every other key. Components that need independent keys use
//! one publisher per key group (`EventService::make_new_publisher`).

use crate::cancel::{until_cancelled, Cancellable};
use crate::error::{EventServiceError, PublishFailure};
use crate::metrics;
use crate::store::LatestValueStore;
use crate::transport::Transport;
use ebus_types::{Event, UtcTime};
use futures::future::{self, BoxFuture, FutureExt};
use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Callback for publishes that failed in a background task.
pub type PublishErrorHandler = Box<dyn Fn(PublishFailure) + Send + Sync>;

/// When a periodic publisher ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    every: Duration,
    start: Option<UtcTime>,
}

impl Schedule {
    /// Tick every `every`, starting immediately.
    #[must_use]
    pub fn every(every: Duration) -> Self {
        Self { every, start: None }
    }

    /// Delay the first tick until `start`. Ticks before it are suppressed.
    /// A start time in the past ticks immediately.
    #[must_use]
    pub fn starting_at(self, start: UtcTime) -> Self {
        Self {
            start: Some(start),
            ..self
        }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.every
    }

    #[must_use]
    pub fn start(&self) -> Option<UtcTime> {
        self.start
    }

    fn validate(&self) -> Result<(), EventServiceError> {
        if self.every.is_zero() {
            return Err(EventServiceError::InvalidInterval);
        }
        Ok(())
    }
}

struct Request {
    event: Event,
    reply: oneshot::Sender<Result<(), PublishFailure>>,
}

struct Inner {
    queue: mpsc::UnboundedSender<Request>,
    closed: CancellationToken,
    tasks: Mutex<Vec<CancellationToken>>,
}

/// Publishes events through a shared store and transport.
///
/// Clones share the same queue and therefore the same ordering.
#[derive(Clone)]
pub struct EventPublisher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("closed", &self.inner.closed.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl EventPublisher {
    /// Start a publisher and its driver task. Must be called inside a tokio
    /// runtime.
    pub fn new(store: Arc<LatestValueStore>, transport: Arc<dyn Transport>) -> Self {
        let (queue, requests) = mpsc::unbounded_channel();
        tokio::spawn(drive(requests, store, transport));

        Self {
            inner: Arc::new(Inner {
                queue,
                closed: CancellationToken::new(),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Publish one event.
    ///
    /// The event is queued before this returns; the future reports the
    /// outcome and need not be awaited.
    pub fn publish(
        &self,
        event: Event,
    ) -> impl Future<Output = Result<(), PublishFailure>> + Send + 'static {
        let (reply, outcome) = oneshot::channel();
        let fallback = event.clone();

        let enqueued = if self.inner.closed.is_cancelled() {
            Err("publisher is shut down")
        } else {
            self.inner
                .queue
                .send(Request { event, reply })
                .map_err(|_| "publisher driver stopped")
        };

        async move {
            enqueued.map_err(|reason| PublishFailure::new(fallback.clone(), reason))?;
            outcome
                .await
                .unwrap_or_else(|_| Err(PublishFailure::new(fallback, "publisher driver stopped")))
        }
    }

    /// Publish every event of `events` in order until it ends or is cancelled.
    pub fn publish_stream<S>(&self, events: S) -> Cancellable
    where
        S: Stream<Item = Event> + Send + 'static,
    {
        self.spawn_stream(events, None)
    }

    /// As [`publish_stream`](Self::publish_stream), reporting failed events
    /// to `on_error`.
    pub fn publish_stream_with_handler<S, H>(&self, events: S, on_error: H) -> Cancellable
    where
        S: Stream<Item = Event> + Send + 'static,
        H: Fn(PublishFailure) + Send + Sync + 'static,
    {
        self.spawn_stream(events, Some(Box::new(on_error)))
    }

    /// Call `generator` on every tick of `schedule` and publish what it
    /// returns. `None` skips the tick.
    ///
    /// # Errors
    ///
    /// - `EventServiceError::InvalidInterval` for a zero interval.
    pub fn publish_periodic<G>(
        &self,
        generator: G,
        schedule: Schedule,
    ) -> Result<Cancellable, EventServiceError>
    where
        G: FnMut() -> Option<Event> + Send + 'static,
    {
        self.spawn_periodic(sync_producer(generator), schedule, None)
    }

    /// As [`publish_periodic`](Self::publish_periodic), reporting failed
    /// publishes to `on_error`. Skipped ticks are not failures.
    ///
    /// # Errors
    ///
    /// - `EventServiceError::InvalidInterval` for a zero interval.
    pub fn publish_periodic_with_handler<G, H>(
        &self,
        generator: G,
        schedule: Schedule,
        on_error: H,
    ) -> Result<Cancellable, EventServiceError>
    where
        G: FnMut() -> Option<Event> + Send + 'static,
        H: Fn(PublishFailure) + Send + Sync + 'static,
    {
        self.spawn_periodic(sync_producer(generator), schedule, Some(Box::new(on_error)))
    }

    /// Periodic publishing with an asynchronous generator.
    ///
    /// # Errors
    ///
    /// - `EventServiceError::InvalidInterval` for a zero interval.
    pub fn publish_periodic_async<G, F>(
        &self,
        generator: G,
        schedule: Schedule,
    ) -> Result<Cancellable, EventServiceError>
    where
        G: FnMut() -> F + Send + 'static,
        F: Future<Output = Option<Event>> + Send + 'static,
    {
        self.spawn_periodic(async_producer(generator), schedule, None)
    }

    /// # Errors
    ///
    /// - `EventServiceError::InvalidInterval` for a zero interval.
    pub fn publish_periodic_async_with_handler<G, F, H>(
        &self,
        generator: G,
        schedule: Schedule,
        on_error: H,
    ) -> Result<Cancellable, EventServiceError>
    where
        G: FnMut() -> F + Send + 'static,
        F: Future<Output = Option<Event>> + Send + 'static,
        H: Fn(PublishFailure) + Send + Sync + 'static,
    {
        self.spawn_periodic(async_producer(generator), schedule, Some(Box::new(on_error)))
    }

    /// Close the publisher. Background tasks stop and later publishes fail.
    pub fn shutdown(&self) {
        if self.inner.closed.is_cancelled() {
            return;
        }
        self.inner.closed.cancel();
        for task in self.inner.tasks.lock().drain(..) {
            task.cancel();
        }
        debug!("Publisher shut down");
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    fn register_task(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut tasks = self.inner.tasks.lock();
        tasks.retain(|task| !task.is_cancelled());
        tasks.push(token.clone());
        token
    }

    fn spawn_stream<S>(&self, events: S, on_error: Option<PublishErrorHandler>) -> Cancellable
    where
        S: Stream<Item = Event> + Send + 'static,
    {
        let token = self.register_task();
        let publisher = self.clone();
        let mut events = Box::pin(until_cancelled(&token, events));

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(failure) = publisher.publish(event).await {
                    report(failure, on_error.as_ref());
                }
            }
            debug!("Publish stream finished");
        });

        Cancellable::new(token)
    }

    fn spawn_periodic(
        &self,
        produce: Producer,
        schedule: Schedule,
        on_error: Option<PublishErrorHandler>,
    ) -> Result<Cancellable, EventServiceError> {
        schedule.validate()?;
        let token = self.register_task();
        tokio::spawn(tick(
            self.clone(),
            produce,
            schedule,
            token.clone(),
            on_error,
        ));
        Ok(Cancellable::new(token))
    }
}

async fn drive(
    mut requests: mpsc::UnboundedReceiver<Request>,
    store: Arc<LatestValueStore>,
    transport: Arc<dyn Transport>,
) {
    while let Some(Request { event, reply }) = requests.recv().await {
        let outcome = publish_one(&store, transport.as_ref(), event).await;
        let _ = reply.send(outcome);
    }
    debug!("Publisher driver stopped");
}

async fn publish_one(
    store: &LatestValueStore,
    transport: &dyn Transport,
    event: Event,
) -> Result<(), PublishFailure> {
    let key = event.event_key();
    let (written, previous) = store.put(key.clone(), event);

    match transport.publish(&written).await {
        Ok(()) => {
            metrics::record_published();
            debug!(
                event_key = %key,
                event_id = %written.event.event_id(),
                sequence = written.sequence,
                "Event published"
            );
            Ok(())
        }
        Err(e) => {
            store.restore(&key, written.event.event_id(), previous);
            metrics::record_publish_failure();
            warn!(event_key = %key, error = %e, "Publish failed");
            Err(PublishFailure::new(written.event, e.to_string()))
        }
    }
}

fn report(failure: PublishFailure, on_error: Option<&PublishErrorHandler>) {
    warn!(event_key = %failure.event.event_key(), reason = %failure.reason, "Background publish failed");
    if let Some(handler) = on_error {
        handler(failure);
    }
}

/// One tick's generator call. `Err` carries a panic payload.
type Produced = std::thread::Result<Option<Event>>;
type Producer = Box<dyn FnMut() -> BoxFuture<'static, Produced> + Send>;

fn sync_producer<G>(mut generator: G) -> Producer
where
    G: FnMut() -> Option<Event> + Send + 'static,
{
    Box::new(move || {
        let produced = std::panic::catch_unwind(AssertUnwindSafe(&mut generator));
        future::ready(produced).boxed()
    })
}

fn async_producer<G, F>(mut generator: G) -> Producer
where
    G: FnMut() -> F + Send + 'static,
    F: Future<Output = Option<Event>> + Send + 'static,
{
    Box::new(
        move || match std::panic::catch_unwind(AssertUnwindSafe(&mut generator)) {
            Ok(pending) => AssertUnwindSafe(pending).catch_unwind().boxed(),
            Err(panic) => future::ready(Err(panic)).boxed(),
        },
    )
}

async fn tick(
    publisher: EventPublisher,
    mut produce: Producer,
    schedule: Schedule,
    token: CancellationToken,
    on_error: Option<PublishErrorHandler>,
) {
    let delay = schedule
        .start
        .and_then(|start| start.duration_from_now())
        .unwrap_or_default();
    let mut ticker = time::interval_at(Instant::now() + delay, schedule.every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let cancelled = token.cancelled();
    tokio::pin!(cancelled);

    loop {
        tokio::select! {
            biased;
            () = &mut cancelled => break,
            _ = ticker.tick() => {}
        }

        // A tick in flight completes even if cancelled meanwhile.
        match produce().await {
            Ok(Some(event)) => {
                if let Err(failure) = publisher.publish(event).await {
                    report(failure, on_error.as_ref());
                }
            }
            Ok(None) => {}
            Err(_) => error!("Event generator panicked; tick skipped"),
        }
    }
    debug!("Periodic publisher stopped");
}
