//! # Events
//!
//! The immutable value that flows through the bus.
//!
//! ## Invalid Event
//!
//! Every key has a reserved sentinel, [`Event::invalid`], returned wherever a
//! real event would be expected but nothing has been published yet. It is an
//! ordinary value (encodable, equal by value) marked by the reserved id
//! [`EventId::INVALID`].

use crate::entities::{EventKey, EventName, Prefix};
use crate::errors::CodecError;
use crate::params::{ParamSet, Parameter};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier of a published event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(String);

impl EventId {
    /// Reserved id carried only by invalid events.
    pub const INVALID: &'static str = "-1";

    /// Generate a fresh unique id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn invalid() -> Self {
        Self(Self::INVALID.to_string())
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.0 == Self::INVALID
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wall-clock UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtcTime(DateTime<Utc>);

impl UtcTime {
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// The Unix epoch, used as the time of invalid events.
    #[must_use]
    pub fn epoch() -> Self {
        Self(Utc.timestamp_opt(0, 0).single().unwrap_or_default())
    }

    #[must_use]
    pub fn value(&self) -> DateTime<Utc> {
        self.0
    }

    /// This time shifted forward by `duration` (saturating).
    #[must_use]
    pub fn plus(&self, duration: Duration) -> Self {
        chrono::Duration::from_std(duration)
            .ok()
            .and_then(|delta| self.0.checked_add_signed(delta))
            .map_or(*self, Self)
    }

    /// Time remaining until this instant, or `None` if it has passed.
    #[must_use]
    pub fn duration_from_now(&self) -> Option<Duration> {
        (self.0 - Utc::now()).to_std().ok().filter(|d| !d.is_zero())
    }
}

impl From<DateTime<Utc>> for UtcTime {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Kind of event. Observe events report on observations in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    System,
    Observe,
}

/// An immutable, timestamped, typed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    kind: EventKind,
    event_id: EventId,
    source: Prefix,
    event_name: EventName,
    event_time: UtcTime,
    params: ParamSet,
}

impl Event {
    /// Create a system event stamped with the current time.
    #[must_use]
    pub fn system(source: Prefix, event_name: EventName) -> Self {
        Self::with_kind(EventKind::System, source, event_name)
    }

    /// Create an observe event stamped with the current time.
    #[must_use]
    pub fn observe(source: Prefix, event_name: EventName) -> Self {
        Self::with_kind(EventKind::Observe, source, event_name)
    }

    fn with_kind(kind: EventKind, source: Prefix, event_name: EventName) -> Self {
        Self {
            kind,
            event_id: EventId::generate(),
            source,
            event_name,
            event_time: UtcTime::now(),
            params: ParamSet::new(),
        }
    }

    /// The sentinel for a key on which nothing has been published.
    #[must_use]
    pub fn invalid(key: &EventKey) -> Self {
        Self {
            kind: EventKind::System,
            event_id: EventId::invalid(),
            source: key.source().clone(),
            event_name: key.event_name().clone(),
            event_time: UtcTime::epoch(),
            params: ParamSet::new(),
        }
    }

    /// A copy with `param` added (or replaced) and a fresh id.
    #[must_use]
    pub fn with_param(&self, param: Parameter) -> Self {
        let mut next = self.clone();
        next.params.insert(param);
        next.event_id = EventId::generate();
        next
    }

    /// A copy with the named parameter removed and a fresh id.
    #[must_use]
    pub fn without_param(&self, key_name: &str) -> Self {
        let mut next = self.clone();
        next.params.remove(key_name);
        next.event_id = EventId::generate();
        next
    }

    /// A copy stamped with `event_time`.
    #[must_use]
    pub fn at(&self, event_time: UtcTime) -> Self {
        Self {
            event_time,
            ..self.clone()
        }
    }

    #[must_use]
    pub fn event_key(&self) -> EventKey {
        EventKey::new(self.source.clone(), self.event_name.clone())
    }

    #[must_use]
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    #[must_use]
    pub fn event_id(&self) -> &EventId {
        &self.event_id
    }

    #[must_use]
    pub fn source(&self) -> &Prefix {
        &self.source
    }

    #[must_use]
    pub fn event_name(&self) -> &EventName {
        &self.event_name
    }

    #[must_use]
    pub fn event_time(&self) -> UtcTime {
        self.event_time
    }

    #[must_use]
    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    #[must_use]
    pub fn is_invalid(&self) -> bool {
        self.event_id.is_invalid()
    }

    #[must_use]
    pub fn is_observe(&self) -> bool {
        self.kind == EventKind::Observe
    }

    /// Encode to the binary wire form.
    ///
    /// # Errors
    ///
    /// - `CodecError::Encode` if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Decode from the binary wire form.
    ///
    /// # Errors
    ///
    /// - `CodecError::Decode` if the bytes are not a valid event.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
