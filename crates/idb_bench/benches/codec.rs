//! Key encoding and structured clone benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use idb_bench::{nested, random_keys, record};
use idb_codec::{decode_key, encode_key, structured_clone, Key, StructuredValue};

/// Benchmark encoding single keys of each type.
fn bench_encode_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_key");

    let cases = [
        ("number", Key::Number(42.5)),
        ("date", Key::Date(1_700_000_000_000.0)),
        ("string_short", Key::from("hello")),
        ("string_long", Key::from("x".repeat(256))),
        ("binary_256", Key::Binary(vec![0u8; 256].into())),
        (
            "array_nested",
            Key::Array(vec![Key::from(1), Key::Array(vec![Key::from("a"), Key::Date(0.0)])]),
        ),
    ];
    for (name, key) in &cases {
        group.bench_function(*name, |b| {
            b.iter(|| black_box(encode_key(black_box(key))));
        });
    }

    group.finish();
}

/// Benchmark decoding.
fn bench_decode_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_key");

    for size in [16, 256, 4096].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("string", size), size, |b, &size| {
            let encoded = encode_key(&Key::from("k".repeat(size)));
            b.iter(|| black_box(decode_key(black_box(&encoded)).unwrap()));
        });
    }

    group.finish();
}

/// Compare by `Key::compare` against comparing encoded bytes.
fn bench_compare(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare");
    let keys = random_keys(1000);
    let encoded: Vec<Vec<u8>> = keys.iter().map(encode_key).collect();
    group.throughput(Throughput::Elements(keys.len() as u64));

    group.bench_function("keys_sort_1000", |b| {
        b.iter(|| {
            let mut sorted = keys.clone();
            sorted.sort();
            black_box(sorted);
        });
    });

    group.bench_function("encoded_sort_1000", |b| {
        b.iter(|| {
            let mut sorted = encoded.clone();
            sorted.sort();
            black_box(sorted);
        });
    });

    group.finish();
}

/// Benchmark structured clone of flat and nested values.
fn bench_clone(c: &mut Criterion) {
    let mut group = c.benchmark_group("structured_clone");

    for size in [64, 1024, 16384].iter() {
        group.throughput(Throughput::Bytes(*size as u64));
        group.bench_with_input(BenchmarkId::new("record", size), size, |b, &size| {
            let value = record(1, size);
            b.iter(|| black_box(structured_clone(value.heap(), value.root()).unwrap()));
        });
    }

    group.bench_function("nested_depth3_width5", |b| {
        let value = nested(3, 5);
        b.iter(|| black_box(structured_clone(value.heap(), value.root()).unwrap()));
    });

    group.finish();
}

/// Benchmark serializing values to and from bytes.
fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");

    group.bench_function("record_to_bytes", |b| {
        let value = record(1, 256);
        b.iter(|| black_box(value.to_bytes().unwrap()));
    });

    group.bench_function("record_from_bytes", |b| {
        let bytes = record(1, 256).to_bytes().unwrap();
        b.iter(|| black_box(StructuredValue::from_bytes(black_box(&bytes)).unwrap()));
    });

    group.bench_function("nested_roundtrip", |b| {
        let value = nested(3, 5);
        b.iter(|| {
            let bytes = value.to_bytes().unwrap();
            black_box(StructuredValue::from_bytes(&bytes).unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_key,
    bench_decode_key,
    bench_compare,
    bench_clone,
    bench_serialize,
);

criterion_main!(benches);
