//! # Worker Pool Benchmark
//!
//! FRAME BUDGET:
//! - A frame runs three strip passes
//! - Scheduling overhead must stay far below the 16ms frame time
//!
//! Run with: `cargo bench --package framevox_core --bench worker_pool_benchmark`

// Benchmarks don't need docs
#![allow(missing_docs)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use framevox_core::{run_strip_pass, DeferredTask, StripPlan, WorkerPool};

/// Rows in a 1080p frame.
const FRAME_ROWS: usize = 1080;

/// Benchmark: submit N no-op tasks and wait for all of them.
fn bench_submit_wait_all(c: &mut Criterion) {
    let pool = WorkerPool::new(4).expect("pool");
    let mut group = c.benchmark_group("submit_wait_all");

    for count in [100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                for _ in 0..count {
                    let task = Arc::new(DeferredTask::new(|| ()));
                    pool.submit(task).expect("submit");
                }
                pool.wait_all();
            });
        });
    }

    group.finish();
}

/// Benchmark: typed spawn and result round trip.
fn bench_spawn_result(c: &mut Criterion) {
    let pool = WorkerPool::new(2).expect("pool");

    c.bench_function("spawn_result", |b| {
        b.iter(|| {
            let handle = pool.spawn(|| black_box(7u64) * 6).expect("spawn");
            black_box(handle.result().expect("result"))
        });
    });
}

/// Benchmark: one strip pass over a frame with light per-row work.
fn bench_strip_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("strip_pass_1080_rows");

    for workers in [1, 2, 4, 8] {
        let pool = WorkerPool::new(workers).expect("pool");
        let plan = StripPlan::new(FRAME_ROWS, workers);
        let sink = Arc::new(AtomicU64::new(0));

        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| {
                let sink = Arc::clone(&sink);
                run_strip_pass(&pool, &plan, move |strip| {
                    let mut acc = 0u64;
                    for row in strip.rows() {
                        for x in 0..1920u64 {
                            acc = acc.wrapping_add((row as u64) ^ x);
                        }
                    }
                    sink.fetch_add(acc, Ordering::Relaxed);
                })
                .expect("strip pass");
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_submit_wait_all, bench_spawn_result, bench_strip_pass);
criterion_main!(benches);
