//! # Event Service Configuration
//!
//! Loaded from a TOML file or from environment variables.
//!
//! ```toml
//! transport = "keyspace"   # or "log"
//! channel_capacity = 1000
//! subscriber_buffer = 256
//! log_retention = 10000
//! ```

use crate::error::EventServiceError;
use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_LOG_RETENTION, DEFAULT_SUBSCRIBER_BUFFER};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Backend used to carry events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-memory keyspace with per-key channels; supports patterns.
    #[default]
    Keyspace,
    /// Append-only per-key logs; exact-key subscription only.
    Log,
}

impl FromStr for TransportKind {
    type Err = EventServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "keyspace" => Ok(Self::Keyspace),
            "log" => Ok(Self::Log),
            other => Err(EventServiceError::Config(format!(
                "unknown transport '{other}' (expected 'keyspace' or 'log')"
            ))),
        }
    }
}

/// Runtime configuration for an event service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EventServiceConfig {
    /// Backend selection.
    pub transport: TransportKind,

    /// Events buffered per key for each live subscriber before the
    /// oldest are skipped.
    pub channel_capacity: usize,

    /// Events buffered between a subscription driver and its consumer.
    pub subscriber_buffer: usize,

    /// Events retained per key by the log transport.
    pub log_retention: usize,
}

impl Default for EventServiceConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::Keyspace,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            log_retention: DEFAULT_LOG_RETENTION,
        }
    }
}

impl EventServiceConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `EventServiceError::Config` if the file cannot be read,
    /// parsed, or fails validation.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EventServiceError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            EventServiceError::Config(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `EventServiceError::Config` on malformed TOML or invalid values.
    pub fn parse(content: &str) -> Result<Self, EventServiceError> {
        let config: Self =
            toml::from_str(content).map_err(|e| EventServiceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `EBUS_TRANSPORT`: `keyspace` or `log` (default: keyspace)
    /// - `EBUS_CHANNEL_CAPACITY`: per-key subscriber buffer (default: 1000)
    /// - `EBUS_SUBSCRIBER_BUFFER`: driver-to-consumer buffer (default: 256)
    /// - `EBUS_LOG_RETENTION`: events kept per key by the log transport (default: 10000)
    ///
    /// # Errors
    ///
    /// Returns `EventServiceError::Config` for unparsable values.
    pub fn from_env() -> Result<Self, EventServiceError> {
        let defaults = Self::default();

        let config = Self {
            transport: match env::var("EBUS_TRANSPORT") {
                Ok(value) => value.parse()?,
                Err(_) => defaults.transport,
            },
            channel_capacity: env_usize("EBUS_CHANNEL_CAPACITY", defaults.channel_capacity)?,
            subscriber_buffer: env_usize("EBUS_SUBSCRIBER_BUFFER", defaults.subscriber_buffer)?,
            log_retention: env_usize("EBUS_LOG_RETENTION", defaults.log_retention)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject capacities that would make channels unusable.
    ///
    /// # Errors
    ///
    /// Returns `EventServiceError::Config` naming the first zero field.
    pub fn validate(&self) -> Result<(), EventServiceError> {
        let fields = [
            ("channel_capacity", self.channel_capacity),
            ("subscriber_buffer", self.subscriber_buffer),
            ("log_retention", self.log_retention),
        ];
        match fields.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(EventServiceError::Config(format!(
                "{name} must be greater than zero"
            ))),
            None => Ok(()),
        }
    }
}

fn env_usize(name: &str, default: usize) -> Result<usize, EventServiceError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| EventServiceError::Config(format!("{name}='{value}' is not a number"))),
        Err(_) => Ok(default),
    }
}
