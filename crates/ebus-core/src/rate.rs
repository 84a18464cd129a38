//! # Rate Control
//!
//! Reshapes a subscription's event stream onto a fixed tick.
//!
//! | Mode | On each tick |
//! |------|--------------|
//! | `Adaptive` | emit the latest event, repeating it if nothing new arrived |
//! | `Limiter` | emit the latest event only if one arrived since the last emission |
//!
//! The first tick fires when the subscription starts. A tick that cannot
//! be serviced in time is skipped rather than bunched up.

use crate::error::EventServiceError;
use ebus_types::Event;
use futures::{stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{self, Interval, MissedTickBehavior};

/// How a rate-controlled subscription fills its ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionMode {
    /// Emit the latest event on every tick.
    #[default]
    Adaptive,
    /// Emit at most once per tick, and only new events.
    Limiter,
}

/// Tick interval plus mode for a rate-controlled subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateControl {
    interval: Duration,
    mode: SubscriptionMode,
}

impl RateControl {
    /// # Errors
    ///
    /// - `EventServiceError::InvalidInterval` if `interval` is zero.
    pub fn new(interval: Duration, mode: SubscriptionMode) -> Result<Self, EventServiceError> {
        if interval.is_zero() {
            return Err(EventServiceError::InvalidInterval);
        }
        Ok(Self { interval, mode })
    }

    /// # Errors
    ///
    /// - `EventServiceError::InvalidInterval` if `interval` is zero.
    pub fn adaptive(interval: Duration) -> Result<Self, EventServiceError> {
        Self::new(interval, SubscriptionMode::Adaptive)
    }

    /// # Errors
    ///
    /// - `EventServiceError::InvalidInterval` if `interval` is zero.
    pub fn limiter(interval: Duration) -> Result<Self, EventServiceError> {
        Self::new(interval, SubscriptionMode::Limiter)
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn mode(&self) -> SubscriptionMode {
        self.mode
    }
}

struct RateState<S> {
    events: S,
    ticker: Interval,
    mode: SubscriptionMode,
    latest: Option<Event>,
    /// An event arrived since the last emission.
    fresh: bool,
}

impl<S> RateState<S>
where
    S: Stream<Item = Event> + Unpin,
{
    async fn next_tick(mut self) -> Option<(Event, Self)> {
        loop {
            tokio::select! {
                // Arrivals win a tie with the tick.
                biased;

                arrived = self.events.next() => match arrived {
                    Some(event) => {
                        self.latest = Some(event);
                        self.fresh = true;
                    }
                    None => return None,
                },
                _ = self.ticker.tick() => {
                    let due = match self.mode {
                        SubscriptionMode::Adaptive => true,
                        SubscriptionMode::Limiter => self.fresh,
                    };
                    if let Some(event) = self.latest.clone().filter(|_| due) {
                        self.fresh = false;
                        return Some((event, self));
                    }
                }
            }
        }
    }
}

/// Apply `control` to `events`. Must be called inside a tokio runtime.
///
/// The output ends when `events` ends.
pub(crate) fn rate_controlled<S>(
    events: S,
    control: RateControl,
) -> impl Stream<Item = Event> + Send + 'static
where
    S: Stream<Item = Event> + Send + Unpin + 'static,
{
    let mut ticker = time::interval(control.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let state = RateState {
        events,
        ticker,
        mode: control.mode,
        latest: None,
        fresh: false,
    };
    stream::unfold(state, RateState::next_tick)
}
