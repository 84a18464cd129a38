//! # Event Bus Metrics
//!
//! Prometheus metrics for publish and delivery health.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! ebus-core = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `ebus_events_published_total` - Counter of events accepted by the transport
//! - `ebus_publish_failures_total` - Counter of publishes that failed
//! - `ebus_events_delivered_total` - Counter of events handed to consumers
//! - `ebus_active_subscriptions` - Gauge of running subscription drivers
//! - `ebus_subscriber_lagged_total` - Counter of events skipped by slow subscribers

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Events accepted by the transport
    pub static ref EVENTS_PUBLISHED: IntCounter = register_int_counter!(
        "ebus_events_published_total",
        "Total number of events accepted by the transport"
    )
    .expect("Failed to create EVENTS_PUBLISHED metric");

    /// Publishes that failed
    pub static ref PUBLISH_FAILURES: IntCounter = register_int_counter!(
        "ebus_publish_failures_total",
        "Total number of publishes that failed"
    )
    .expect("Failed to create PUBLISH_FAILURES metric");

    /// Events handed to consumers
    pub static ref EVENTS_DELIVERED: IntCounter = register_int_counter!(
        "ebus_events_delivered_total",
        "Total number of events delivered to subscribers"
    )
    .expect("Failed to create EVENTS_DELIVERED metric");

    /// Running subscription drivers
    pub static ref ACTIVE_SUBSCRIPTIONS: IntGauge = register_int_gauge!(
        "ebus_active_subscriptions",
        "Number of running subscription drivers"
    )
    .expect("Failed to create ACTIVE_SUBSCRIPTIONS metric");

    /// Events skipped by lagging subscribers
    pub static ref SUBSCRIBER_LAGGED: IntCounter = register_int_counter!(
        "ebus_subscriber_lagged_total",
        "Total number of events skipped because a subscriber fell behind"
    )
    .expect("Failed to create SUBSCRIBER_LAGGED metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_published() {
    EVENTS_PUBLISHED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_publish_failure() {
    PUBLISH_FAILURES.inc();
}

#[cfg(feature = "metrics")]
pub fn record_delivered() {
    EVENTS_DELIVERED.inc();
}

#[cfg(feature = "metrics")]
pub fn subscription_opened() {
    ACTIVE_SUBSCRIPTIONS.inc();
}

#[cfg(feature = "metrics")]
pub fn subscription_closed() {
    ACTIVE_SUBSCRIPTIONS.dec();
}

/// Record events a subscriber skipped after falling behind
#[cfg(feature = "metrics")]
pub fn record_subscriber_lagged(skipped: u64) {
    SUBSCRIBER_LAGGED.inc_by(skipped);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_published() {}

#[cfg(not(feature = "metrics"))]
pub fn record_publish_failure() {}

#[cfg(not(feature = "metrics"))]
pub fn record_delivered() {}

#[cfg(not(feature = "metrics"))]
pub fn subscription_opened() {}

#[cfg(not(feature = "metrics"))]
pub fn subscription_closed() {}

#[cfg(not(feature = "metrics"))]
pub fn record_subscriber_lagged(_skipped: u64) {}
