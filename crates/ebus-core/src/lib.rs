//! # Event Bus Core - Publish/Subscribe for Telescope Components
//!
//! Components publish typed, timestamped events under an [`EventKey`]; other
//! components subscribe to keys or key patterns, optionally at a controlled
//! rate. Behaviour is the same whichever transport carries the events.
//!
//! ## Data Flow
//!
//! ```text
//! ┌───────────┐  put   ┌──────────────────┐
//! │ Publisher │ ─────→ │ LatestValueStore │ ──── seed ────┐
//! │  (queue)  │        └──────────────────┘               ▼
//! │           │  publish  ┌───────────┐  live   ┌──────────────────┐
//! │           │ ────────→ │ Transport │ ──────→ │ Subscription     │
//! └───────────┘           └───────────┘         │ driver → [rate]  │ → consumer
//!                                               └──────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Seed**: a key subscription emits exactly one event per key before any
//!   live event: the latest value, or the invalid event if none.
//! - **Order**: events from one publisher on one key arrive in publish order.
//! - **Silence**: once `unsubscribe()` resolves, nothing more is delivered.
//! - **Clean failures**: a publish rejected by the transport does not
//!   update the latest-value store.
//!
//! [`EventKey`]: ebus_types::EventKey

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod cancel;
pub mod config;
pub mod error;
pub mod metrics;
pub mod pattern;
pub mod publisher;
pub mod rate;
pub mod service;
pub mod store;
pub mod subscriber;
pub mod subscription;
pub mod transport;

// Re-export main types
pub use cancel::Cancellable;
pub use config::{EventServiceConfig, TransportKind};
pub use error::{EventServiceError, PublishFailure, TransportError};
pub use pattern::KeyPattern;
pub use publisher::{EventPublisher, PublishErrorHandler, Schedule};
pub use rate::{RateControl, SubscriptionMode};
pub use service::EventService;
pub use store::{LatestValueStore, Sequenced};
pub use subscriber::EventSubscriber;
pub use subscription::{EventStream, EventSubscription, SubscriptionState};
pub use transport::{
    KeyspaceTransport, LogTransport, RawEventStream, Transport, TransportCapabilities,
};

/// Events buffered per key for each live keyspace subscriber.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Events buffered between a subscription driver and its stream.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

/// Events retained per key by the log transport.
pub const DEFAULT_LOG_RETENTION: usize = 10_000;
