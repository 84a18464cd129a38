//! Shared fixtures for integration tests and benchmarks.

use ebus_core::{EventService, EventServiceConfig, TransportKind};
use ebus_types::{Event, EventKey, ParamValue, Parameter};
use futures::{Stream, StreamExt};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Name of the parameter carrying a sequence number.
pub const COUNTER: &str = "counter";

pub fn key(canonical: &str) -> EventKey {
    canonical
        .parse()
        .unwrap_or_else(|e| panic!("bad test key {canonical}: {e}"))
}

/// A system event for `key` with no parameters.
pub fn event(key: &EventKey) -> Event {
    Event::system(key.source().clone(), key.event_name().clone())
}

/// A system event for `key` carrying `n` in its counter parameter.
pub fn numbered(key: &EventKey, n: i64) -> Event {
    event(key).with_param(Parameter::new(COUNTER, [n]))
}

/// The counter parameter of `event`, if present.
pub fn counter(event: &Event) -> Option<i64> {
    match event.params().get(COUNTER)?.values.first()? {
        ParamValue::Int(n) => Some(*n),
        _ => None,
    }
}

/// One service per transport, logging through the test writer.
pub fn services() -> Vec<EventService> {
    ebus_telemetry::init_test_tracing();
    [TransportKind::Keyspace, TransportKind::Log]
        .into_iter()
        .map(|transport| {
            EventService::from_config(EventServiceConfig {
                transport,
                ..EventServiceConfig::default()
            })
        })
        .collect()
}

/// Services whose transport supports pattern subscription.
pub fn pattern_services() -> Vec<EventService> {
    services()
        .into_iter()
        .filter(|service| service.transport().capabilities().supports_pattern_subscribe)
        .collect()
}

/// Everything `stream` yields within `window`.
pub async fn collect_for<S>(stream: &mut S, window: Duration) -> Vec<Event>
where
    S: Stream<Item = Event> + Unpin,
{
    let deadline = Instant::now() + window;
    let mut collected = Vec::new();
    while let Ok(Some(event)) = timeout_at(deadline, stream.next()).await {
        collected.push(event);
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_round_trip() {
        let k = key("CSW.fixtures.count");
        assert_eq!(counter(&numbered(&k, 7)), Some(7));
        assert_eq!(counter(&event(&k)), None);
    }

    #[test]
    fn test_services_cover_both_transports() {
        let names: Vec<_> = services().iter().map(|s| s.transport().name()).collect();
        assert_eq!(names, ["keyspace", "log"]);
        assert_eq!(pattern_services().len(), 1);
    }
}
