//! # Error Types
//!
//! Errors raised while building or decoding the event model.

use thiserror::Error;

/// Errors from constructing or parsing identity types.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ModelError {
    /// Subsystem name is not one of the known subsystems.
    #[error("Unknown subsystem: {0}")]
    UnknownSubsystem(String),

    /// Component name violates the prefix rules.
    #[error("Invalid component name '{name}': {reason}")]
    InvalidComponentName { name: String, reason: &'static str },

    /// Event name is empty.
    #[error("Event name must not be empty")]
    EmptyEventName,

    /// A canonical string could not be split into its parts.
    #[error("Malformed {kind} '{value}': expected {expected}")]
    Malformed {
        kind: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Errors from the binary event codec.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// Encoding an event failed.
    #[error("Failed to encode event: {0}")]
    Encode(String),

    /// Decoding bytes into an event failed.
    #[error("Failed to decode event: {0}")]
    Decode(String),
}
