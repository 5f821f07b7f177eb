//! Codec benchmarks

use coordsock_core::{codec, Message};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn sample() -> Message {
    Message::new("A", "B")
        .with_position(10.5, 20.25)
        .with_gesture("swipe")
        .with_dimensions(1920.0, 1080.0)
}

fn parse_benchmark(c: &mut Criterion) {
    let encoded = codec::encode(&sample()).unwrap();

    c.bench_function("parse_message", |b| {
        b.iter(|| black_box(codec::parse(black_box(&encoded)).unwrap()))
    });
}

fn validate_benchmark(c: &mut Criterion) {
    let msg = sample();

    c.bench_function("validate_message", |b| {
        b.iter(|| black_box(black_box(&msg).validate()))
    });
}

fn encode_error_benchmark(c: &mut Criterion) {
    c.bench_function("encode_error", |b| {
        b.iter(|| black_box(codec::encode_error("Target client C does not exist").unwrap()))
    });
}

criterion_group!(
    benches,
    parse_benchmark,
    validate_benchmark,
    encode_error_benchmark
);
criterion_main!(benches);
