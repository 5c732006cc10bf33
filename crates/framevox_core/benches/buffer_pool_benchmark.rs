//! # Buffer Pool Benchmark
//!
//! Compares recycled buffers against fresh allocation for mesh-sized
//! vertex buffers.
//!
//! Run with: `cargo bench --package framevox_core --bench buffer_pool_benchmark`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use framevox_core::BufferPool;

/// Default vertex capacity of a mesh buffer.
const VERTEX_CAPACITY: usize = 4444;

/// Vertices written per simulated mesh.
const VERTICES_PER_MESH: usize = 3000;

/// Benchmark: acquire, fill, release.
fn bench_pooled(c: &mut Criterion) {
    let pool: BufferPool<[f32; 8]> = BufferPool::new(VERTEX_CAPACITY);

    c.bench_function("pooled_fill_3000", |b| {
        b.iter(|| {
            let mut buffer = pool.acquire();
            for i in 0..VERTICES_PER_MESH {
                buffer.push([i as f32; 8]);
            }
            black_box(buffer.len());
            pool.release(buffer);
        });
    });
}

/// Benchmark: same work, fresh allocation every time.
fn bench_fresh(c: &mut Criterion) {
    c.bench_function("fresh_fill_3000", |b| {
        b.iter(|| {
            let mut buffer: Vec<[f32; 8]> = Vec::with_capacity(VERTEX_CAPACITY);
            for i in 0..VERTICES_PER_MESH {
                buffer.push([i as f32; 8]);
            }
            black_box(buffer.len());
        });
    });
}

criterion_group!(benches, bench_pooled, bench_fresh);
criterion_main!(benches);
