//! # Error Types
//!
//! Errors surfaced by the publish and subscribe APIs.
//!
//! Failures are isolated: an error on one publish or one subscription never
//! affects other keys or other subscriptions, and nothing is retried here.

use ebus_types::{CodecError, Event};
use thiserror::Error;

/// Errors raised by a transport backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport was shut down or lost its connection.
    #[error("Transport '{transport}' is closed")]
    Closed { transport: &'static str },

    /// An event could not be encoded or decoded for the wire.
    #[error("Codec failure: {0}")]
    Codec(String),

    /// The backend refused the operation.
    #[error("Transport rejected operation: {0}")]
    Rejected(String),
}

impl From<CodecError> for TransportError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err.to_string())
    }
}

/// Errors from subscription setup and service construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventServiceError {
    /// A key-based subscription was requested with no keys.
    #[error("At least one event key is required")]
    EmptyKeySet,

    /// The glob pattern could not be compiled.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The transport cannot deliver by pattern.
    #[error("Transport '{transport}' does not support pattern subscription")]
    PatternSubscriptionUnsupported { transport: &'static str },

    /// A rate or publish interval of zero was requested.
    #[error("Interval must be greater than zero")]
    InvalidInterval,

    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The subscription could not be established.
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    /// The subscription was cancelled before it became ready.
    #[error("Subscription cancelled before it became ready")]
    SubscriptionCancelled,

    /// Configuration is invalid or could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A publish that did not reach the transport.
///
/// Carries the event so callers can log or republish it.
#[derive(Debug, Clone, Error)]
#[error("Failed to publish event {event_key}: {reason}", event_key = .event.event_key())]
pub struct PublishFailure {
    /// The event that was not published.
    pub event: Event,
    /// Why the publish failed.
    pub reason: String,
}

impl PublishFailure {
    pub(crate) fn new(event: Event, reason: impl Into<String>) -> Self {
        Self {
            event,
            reason: reason.into(),
        }
    }
}
