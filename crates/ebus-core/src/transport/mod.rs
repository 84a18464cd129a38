//! # Transports
//!
//! The carrier that moves events from publishers to subscribers.
//!
//! A transport only delivers live events: it does not cache. Seeding new
//! subscribers from the latest value is the subscriber core's job.
//!
//! Events travel with the store sequence of the write that produced them,
//! and a transport hands that stamp back unchanged.
//!
//! Two backends are provided:
//!
//! | Backend | Delivery | Patterns |
//! |---------|----------|----------|
//! | [`KeyspaceTransport`] | per-key broadcast channels | yes |
//! | [`LogTransport`] | per-key append-only logs | no |

mod keyspace;
mod log;

pub use keyspace::KeyspaceTransport;
pub use log::LogTransport;

use crate::error::TransportError;
use crate::pattern::KeyPattern;
use crate::store::Sequenced;
use async_trait::async_trait;
use ebus_types::EventKey;
use futures::Stream;
use std::pin::Pin;

/// Stream of live events produced by a transport registration.
///
/// Dropping the stream deregisters it.
pub type RawEventStream = Pin<Box<dyn Stream<Item = Sequenced> + Send>>;

/// What a transport can do beyond exact-key delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportCapabilities {
    /// Whether [`Transport::pattern_subscribe`] is available.
    pub supports_pattern_subscribe: bool,
}

/// A backend that carries events between publishers and subscribers.
///
/// For a single key, events are delivered in the order `publish` was
/// called. Nothing is promised across keys.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> TransportCapabilities;

    /// Deliver `written` to every live registration for its key.
    ///
    /// Returns once the event is accepted for delivery. Having no
    /// subscribers is not an error.
    async fn publish(&self, written: &Sequenced) -> Result<(), TransportError>;

    /// Register for live events on `keys`.
    ///
    /// Registration is complete when this returns: any event published
    /// afterwards is visible on the stream.
    async fn subscribe(&self, keys: &[EventKey]) -> Result<RawEventStream, TransportError>;

    /// Register for live events on every key matching `pattern`.
    ///
    /// Backends without pattern support return `TransportError::Rejected`.
    async fn pattern_subscribe(&self, pattern: &KeyPattern)
        -> Result<RawEventStream, TransportError>;

    /// Close the transport. Later calls fail with `TransportError::Closed`
    /// and open streams end.
    async fn shutdown(&self);
}
