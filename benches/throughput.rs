//! Throughput Benchmark for SnapKV
//!
//! Measures the storage engine under various workloads and the snapshot
//! decoder over an in-memory file.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use snapkv::protocol::LineReader;
use snapkv::snapshot::{opcode, SnapshotReader, STRING_VALUE_TYPE};
use snapkv::storage::StorageEngine;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

/// Benchmark SET operations
fn bench_set(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            engine.set(key, Bytes::from("small_value"), 0);
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = Bytes::from("x".repeat(1024)); // 1KB value
        b.iter(|| {
            let key = Bytes::from(format!("key:{}", i));
            engine.set(key, value.clone(), 0);
            i += 1;
        });
    });

    group.bench_function("set_with_ttl", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = Bytes::from(format!("ttl:{}", i));
            engine.set(key, Bytes::from("value"), 3_600_000);
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark GET operations
fn bench_get(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..100_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        engine.set(key, value, 0);
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(engine.get(key.as_bytes()));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(engine.get(key.as_bytes()));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let engine = Arc::new(StorageEngine::new());

    for i in 0..10_000 {
        let key = Bytes::from(format!("key:{}", i));
        let value = Bytes::from(format!("value:{}", i));
        engine.set(key, value, 0);
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                let key = Bytes::from(format!("new:{}", i));
                engine.set(key, Bytes::from("value"), 0);
            } else {
                let key = format!("key:{}", i % 10_000);
                black_box(engine.get(key.as_bytes()));
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let engine = Arc::new(StorageEngine::new());
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let engine = Arc::clone(&engine);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = Bytes::from(format!("key:{}:{}", t, i));
                            engine.set(key.clone(), Bytes::from("value"), 0);
                            engine.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(engine.len());
        });
    });

    group.finish();
}

/// Builds a single-database snapshot with `count` entries, every other one
/// carrying an expiry far in the future.
fn build_snapshot(count: usize) -> Vec<u8> {
    fn push_string(out: &mut Vec<u8>, s: &[u8]) {
        out.push(s.len() as u8);
        out.extend_from_slice(s);
    }

    let mut out = b"REDIS0011".to_vec();
    out.push(opcode::AUX);
    push_string(&mut out, b"redis-ver");
    push_string(&mut out, b"7.2.0");
    out.extend_from_slice(&[
        opcode::SELECT_DB,
        0,
        opcode::RESIZE_DB,
        count as u8,
        count.div_ceil(2) as u8,
    ]);

    for i in 0..count {
        if i % 2 == 0 {
            out.push(opcode::EXPIRE_TIME_MS);
            out.extend_from_slice(&u64::MAX.to_le_bytes());
        }
        out.push(STRING_VALUE_TYPE);
        push_string(&mut out, format!("key:{}", i).as_bytes());
        push_string(&mut out, format!("value:{}", i).as_bytes());
    }

    out.push(opcode::EOF);
    out.extend_from_slice(&[0; 8]);
    out
}

/// Benchmark snapshot decoding
fn bench_snapshot(c: &mut Criterion) {
    // Entry count is bounded by the single-byte section header
    let data = build_snapshot(60);

    let mut group = c.benchmark_group("snapshot");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("read_database", |b| {
        b.iter(|| {
            let mut reader = SnapshotReader::new(Cursor::new(&data[..]));
            black_box(reader.read_database(0, 0).unwrap());
        });
    });

    group.finish();
}

/// Benchmark request framing
fn bench_protocol(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let input: Vec<u8> = b"*3\r\n$3\r\nSET\r\n$4\r\nkey1\r\n$4\r\nval1\r\n".repeat(100);

    let mut group = c.benchmark_group("protocol");
    group.throughput(Throughput::Elements(100));

    group.bench_function("read_100_requests", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let mut reader = LineReader::new(&input[..]);
                while let Some(request) = reader.read_request().await.unwrap() {
                    black_box(request);
                }
            });
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_mixed,
    bench_concurrent,
    bench_snapshot,
    bench_protocol,
);

criterion_main!(benches);
