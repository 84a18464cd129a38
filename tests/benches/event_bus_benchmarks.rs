//! # Event Bus Benchmarks
//!
//! | Area | Measured |
//! |------|----------|
//! | Codec | event encode and decode with a payload |
//! | Pattern | glob match against a key |
//! | Publish | publish through store and transport, no subscribers |
//! | Fan-out | publish reaching N live subscribers |

#![allow(clippy::excessive_nesting)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ebus_core::{EventService, KeyPattern};
use ebus_types::{Event, EventKey, Parameter, Subsystem};
use futures::StreamExt;
use rand::Rng;
use std::time::Duration;
use tokio::runtime::Runtime;

fn key(canonical: &str) -> EventKey {
    canonical.parse().unwrap()
}

fn payload_event(key: &EventKey, values: usize) -> Event {
    let mut rng = rand::thread_rng();
    let samples: Vec<f64> = (0..values).map(|_| rng.gen_range(-1.0..1.0)).collect();
    Event::system(key.source().clone(), key.event_name().clone())
        .with_param(Parameter::new("samples", samples))
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ============================================================================
// Codec
// ============================================================================

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec");
    let k = key("CSW.bench.codec");

    for values in [1, 64, 1024] {
        let event = payload_event(&k, values);
        let bytes = event.to_bytes().unwrap();

        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", values), &event, |b, event| {
            b.iter(|| black_box(event.to_bytes().unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("decode", values), &bytes, |b, bytes| {
            b.iter(|| black_box(Event::from_bytes(bytes).unwrap()))
        });
    }
    group.finish();
}

// ============================================================================
// Pattern matching
// ============================================================================

fn bench_pattern_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern");
    let keys = [
        key("CSW.prefix.movement.linear"),
        key("CSW.prefix.temperature"),
        key("CSW.a_rather_long_component_name.some.deeply.nested.event"),
    ];

    for glob in ["*", "*.movement.*", "*.?ove*", "prefix.[mt]*"] {
        let pattern = KeyPattern::new(Subsystem::Csw, glob).unwrap();
        group.bench_function(glob, |b| {
            b.iter(|| keys.iter().filter(|k| pattern.matches(k)).count())
        });
    }
    group.finish();
}

// ============================================================================
// Publish
// ============================================================================

fn bench_publish(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("publish");

    for (name, service) in [
        ("keyspace", rt.block_on(async { EventService::in_memory() })),
        ("log", rt.block_on(async { EventService::log_backed() })),
    ] {
        let publisher = rt.block_on(async { service.make_new_publisher() });
        let event = payload_event(&key("CSW.bench.publish"), 16);

        group.bench_function(name, |b| {
            b.to_async(&rt)
                .iter(|| async { publisher.publish(event.clone()).await.unwrap() })
        });
    }
    group.finish();
}

fn bench_fan_out(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("fan_out");
    group.measurement_time(Duration::from_secs(5));
    let k = key("CSW.bench.fanout");

    for subscribers in [1, 10, 100] {
        let service = rt.block_on(async { EventService::in_memory() });
        let publisher = rt.block_on(async { service.make_new_publisher() });
        let mut streams = rt.block_on(async {
            let mut streams = Vec::new();
            for _ in 0..subscribers {
                let mut stream = service.default_subscriber().subscribe([k.clone()]).unwrap();
                stream.ready().await.unwrap();
                stream.next().await;
                streams.push(stream);
            }
            streams
        });
        let event = payload_event(&k, 4);

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_function(BenchmarkId::from_parameter(subscribers), |b| {
            b.iter(|| {
                rt.block_on(async {
                    publisher.publish(event.clone()).await.unwrap();
                    for stream in streams.iter_mut() {
                        black_box(stream.next().await);
                    }
                })
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_codec,
    bench_pattern_match,
    bench_publish,
    bench_fan_out
);
criterion_main!(benches);
