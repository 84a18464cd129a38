//! # Event Bus Types
//!
//! Identity and value types shared by every event bus crate.
//!
//! ## Design Principles
//!
//! - **Canonical identity**: an `EventKey` is its canonical string
//!   `SUBSYSTEM.component.eventName`; equality and pattern matching use it.
//! - **Immutable values**: an `Event` never changes; "modifying" one yields a
//!   new event with a fresh id.
//! - **No absence**: "nothing published yet" is the invalid event for a key,
//!   not an `Option`.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod entities;
pub mod errors;
pub mod event;
pub mod params;

pub use entities::{EventKey, EventName, Prefix, Subsystem, KEY_SEPARATOR};
pub use errors::{CodecError, ModelError};
pub use event::{Event, EventId, EventKind, UtcTime};
pub use params::{ParamSet, ParamValue, Parameter};
