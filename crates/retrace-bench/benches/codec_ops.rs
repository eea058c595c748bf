//! Criterion micro-benchmarks for the log buffer and event codec.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use retrace_log::{BuildMetadata, LogReader, LogWriter, Trailer, DEFAULT_BUFFER_CAPACITY};

const VALUES: u64 = 10_000;

fn encoded(capacity: usize) -> Vec<u8> {
    let mut buf = Vec::with_capacity(VALUES as usize * 8 + 4096);
    let mut writer = LogWriter::new(&mut buf, &BuildMetadata::current(0), capacity).unwrap();
    for v in 0..VALUES {
        writer.encode(v).unwrap();
    }
    writer.finish(&Trailer::default()).unwrap();
    buf
}

/// Benchmark: encode 10K u64 through the default 64 KiB buffer.
fn bench_encode_u64(c: &mut Criterion) {
    c.bench_function("encode_10k_u64", |b| {
        b.iter(|| black_box(encoded(DEFAULT_BUFFER_CAPACITY)));
    });
}

/// Benchmark: same, but a 64-byte buffer flushes every eight values.
fn bench_encode_u64_small_buffer(c: &mut Criterion) {
    c.bench_function("encode_10k_u64_small_buffer", |b| {
        b.iter(|| black_box(encoded(64)));
    });
}

/// Benchmark: decode 10K u64.
fn bench_decode_u64(c: &mut Criterion) {
    let log = encoded(DEFAULT_BUFFER_CAPACITY);

    c.bench_function("decode_10k_u64", |b| {
        b.iter(|| {
            let mut reader = LogReader::open(log.as_slice()).unwrap();
            let mut sum = 0u64;
            for _ in 0..VALUES {
                sum = sum.wrapping_add(reader.decode::<u64>().unwrap());
            }
            black_box(sum);
        });
    });
}

criterion_group!(
    benches,
    bench_encode_u64,
    bench_encode_u64_small_buffer,
    bench_decode_u64
);
criterion_main!(benches);
