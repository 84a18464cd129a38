//! # Integration Scenarios
//!
//! Every scenario that the transport supports runs against both the
//! keyspace and the log transport.

mod patterns;
mod publishing;
mod pubsub;
