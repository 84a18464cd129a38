//! # Event Bus Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── fixtures.rs       # Keys, events, services for both transports
//! └── integration/      # Cross-crate publish/subscribe scenarios
//!     ├── pubsub.rs     # Seeds, latest value, fan-out, unsubscribe
//!     ├── rate.rs       # Adaptive and limiter subscriptions
//!     ├── patterns.rs   # Pattern and observe-event subscriptions
//!     ├── publishing.rs # Ordering, streams, periodic publishing
//!     └── failures.rs   # Transport failures and setup errors
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p ebus-tests
//!
//! # By category
//! cargo test -p ebus-tests integration::rate::
//!
//! # Benchmarks
//! cargo bench -p ebus-tests
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod integration;
