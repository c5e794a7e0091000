//! Micro-benchmarks for the LSM tree's core operations.
//!
//! Uses Criterion for statistically rigorous measurement with regression
//! detection and HTML reports.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench micro              # run all micro-benchmarks
//! cargo bench --bench micro -- put       # filter by name
//! ```
//!
//! Reports are generated in `target/criterion/report/index.html`.

use criterion::{BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use lsmkv::config::LsmTreeConfig;
use lsmkv::tree::LsmTree;

fn small_buffer_config() -> LsmTreeConfig {
    LsmTreeConfig {
        buffer_max_entries: 256,
        depth: 6,
        fanout: 4,
        thread_count: 4,
        bf_bits_per_entry: 10.0,
    }
}

fn bench_put_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("put_sequential");
    for &n in &[1_000u64, 10_000] {
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || LsmTree::new(small_buffer_config()),
                |tree| {
                    for k in 0..n as i64 {
                        tree.put(black_box(k), black_box(k)).unwrap();
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_get_hit(c: &mut Criterion) {
    let tree = LsmTree::new(small_buffer_config());
    for k in 0..10_000i64 {
        tree.put(k, k).unwrap();
    }
    c.bench_function("get_hit", |b| {
        b.iter(|| black_box(tree.get(black_box(5_000))));
    });
}

fn bench_get_miss(c: &mut Criterion) {
    let tree = LsmTree::new(small_buffer_config());
    for k in 0..10_000i64 {
        tree.put(k * 2, k).unwrap();
    }
    c.bench_function("get_miss", |b| {
        b.iter(|| black_box(tree.get(black_box(4_999))));
    });
}

fn bench_range(c: &mut Criterion) {
    let tree = LsmTree::new(small_buffer_config());
    for k in 0..10_000i64 {
        tree.put(k, k).unwrap();
    }
    let mut group = c.benchmark_group("range");
    for &width in &[10i64, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, &width| {
            b.iter(|| black_box(tree.range(black_box(1_000), black_box(1_000 + width))));
        });
    }
    group.finish();
}

fn bench_delete(c: &mut Criterion) {
    c.bench_function("delete", |b| {
        b.iter_batched(
            || {
                let tree = LsmTree::new(small_buffer_config());
                for k in 0..1_000i64 {
                    tree.put(k, k).unwrap();
                }
                tree
            },
            |tree| {
                for k in 0..1_000i64 {
                    tree.delete(black_box(k)).unwrap();
                }
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(
    benches,
    bench_put_sequential,
    bench_get_hit,
    bench_get_miss,
    bench_range,
    bench_delete
);
criterion_main!(benches);
