//! # Event Bus Telemetry
//!
//! Logging setup for processes using the event bus.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ebus_telemetry::{init_tracing, TelemetryConfig};
//!
//! fn main() -> Result<(), ebus_telemetry::TelemetryError> {
//!     init_tracing(&TelemetryConfig::from_env())?;
//!     // Application code here
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `EBUS_SERVICE_NAME` | `event-bus` | Service name in logs |
//! | `EBUS_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `EBUS_CONSOLE_OUTPUT` | `true` | Write logs to the console |
//! | `EBUS_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use tracing_setup::{init_test_tracing, init_tracing};

#[doc(hidden)]
pub use tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Tracing already initialized: {0}")]
    AlreadyInitialized(String),
}
