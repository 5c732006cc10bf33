//! # Frame World Integration Tests
//!
//! Whole frames through the pipeline, with a render thread committing
//! concurrently.
//!
//! Run with: cargo test --package framevox_world --test frame_world_test

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use framevox_core::{FramevoxConfig, SlotId, WorkerPool};
use framevox_world::{
    ChunkCoord, FrameWorld, GeometryType, NoiseSeed, VideoFrame, MAX_TERRAIN_HEIGHT, WATER_LEVEL,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn config(threads: usize) -> FramevoxConfig {
    let mut config = FramevoxConfig::default();
    config.pool.threads = threads;
    config.slots.initial_slots = 16;
    config
}

fn random_frame(rng: &mut StdRng, width: usize, height: usize, index: u64) -> VideoFrame {
    let pixels: Vec<u8> = (0..width * height * 3).map(|_| rng.gen()).collect();
    VideoFrame::new(width, height, index, pixels).unwrap()
}

/// Test: a black frame floods every column with water.
#[test]
fn test_black_frame_is_all_lowland() {
    let world = FrameWorld::new(64, 64, &config(4)).unwrap();
    world
        .display_frame(&VideoFrame::solid(64, 64, 0, [0, 0, 0]))
        .unwrap();

    let field = world.height_field();
    for y in 0..64 {
        for x in 0..64 {
            let h = field.get(x, y).unwrap();
            assert!((2..=7).contains(&h), "height {h} at ({x}, {y})");
        }
    }

    let water = world.commit_geometry(GeometryType::Transparent);
    assert_eq!(water.live_count(), 16);
    for (_, mesh, _) in water.iter() {
        assert!(!mesh.is_empty());
        let level = WATER_LEVEL as f32;
        assert!(mesh
            .vertices
            .iter()
            .all(|v| (v.position[1] - level).abs() <= 0.5 + 1e-6));
    }
}

/// Test: random frames keep one unique live mesh per column and type.
#[test]
fn test_random_frames_keep_ids_consistent() {
    let mut rng = StdRng::seed_from_u64(0xF4A3);
    let world = FrameWorld::new(80, 48, &config(3)).unwrap();
    let (columns_x, columns_z) = world.grid_size();

    for index in 0..8 {
        world
            .display_frame(&random_frame(&mut rng, 80, 48, index))
            .unwrap();

        for geometry in GeometryType::ALL {
            let view = world.commit_geometry(geometry);
            assert_eq!(view.live_count(), columns_x * columns_z);

            let mut seen: HashSet<SlotId> = HashSet::new();
            for x in 0..columns_x {
                for z in 0..columns_z {
                    let coord = ChunkCoord::new(x, z);
                    let column = world.column(coord).unwrap();
                    let id = column.mesh_id(geometry);
                    assert!(!id.is_reserved());
                    assert!(seen.insert(id), "{id} shared by two columns");

                    let (_, bounds) = view.get(id).unwrap();
                    assert_eq!(*bounds, coord.bounds());
                }
            }
        }
    }

    let field = world.height_field();
    for y in 0..48 {
        for x in 0..80 {
            assert!(field.get(x, y).unwrap() <= MAX_TERRAIN_HEIGHT);
        }
    }
}

/// Test: same seed and frame give the same terrain regardless of workers.
#[test]
fn test_terrain_independent_of_worker_count() {
    let frame = VideoFrame::gradient(96, 64, 11);
    let one = FrameWorld::with_pool(
        Arc::new(WorkerPool::new(1).unwrap()),
        96,
        64,
        &config(1),
        NoiseSeed::new(5),
    )
    .unwrap();
    let many = FrameWorld::with_pool(
        Arc::new(WorkerPool::new(7).unwrap()),
        96,
        64,
        &config(7),
        NoiseSeed::new(5),
    )
    .unwrap();

    let a = one.display_frame(&frame).unwrap();
    let b = many.display_frame(&frame).unwrap();
    assert_eq!(a.vertices, b.vertices);
    assert_eq!(a.triangles, b.triangles);

    for y in 0..64 {
        for x in 0..96 {
            assert_eq!(one.height_field().get(x, y), many.height_field().get(x, y));
        }
    }
}

/// Test: a render thread commits while frames are being published.
#[test]
fn test_render_thread_commits_concurrently() {
    let world = Arc::new(FrameWorld::new(64, 48, &config(4)).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let renderer = {
        let world = Arc::clone(&world);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut commits = 0usize;
            while !done.load(Ordering::Acquire) {
                for geometry in GeometryType::ALL {
                    let view = world.commit_geometry(geometry);
                    // Each publish swaps one mesh for one mesh
                    assert!(view.live_count() <= 12);
                    commits += 1;
                }
                thread::yield_now();
            }
            commits
        })
    };

    for index in 0..30 {
        world
            .display_frame(&VideoFrame::gradient(64, 48, index))
            .unwrap();
        if index == 15 {
            world.set_thread_count(2).unwrap();
        }
    }
    done.store(true, Ordering::Release);
    assert!(renderer.join().unwrap() > 0);

    assert_eq!(world.frames_published(), 30);
    assert_eq!(world.commit_geometry(GeometryType::Solid).live_count(), 12);
    assert_eq!(world.pool_stats().failed, 0);
}

/// Test: a renderer reads columns while holding a view and frames keep publishing.
#[test]
fn test_view_holder_can_read_columns_during_publish() {
    let world = Arc::new(FrameWorld::new(64, 48, &config(3)).unwrap());
    let done = Arc::new(AtomicBool::new(false));

    let renderer = {
        let world = Arc::clone(&world);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut reads = 0usize;
            loop {
                let view = world.commit_geometry(GeometryType::Solid);
                let column = world.column(ChunkCoord::new(0, 0)).unwrap();
                let _ = world.frames_published();
                if !column.mesh_id(GeometryType::Solid).is_reserved() {
                    assert!(view.live_count() <= 12);
                }
                drop(view);
                reads += 1;
                if done.load(Ordering::Acquire) {
                    break reads;
                }
            }
        })
    };

    for index in 0..200 {
        world
            .display_frame(&VideoFrame::gradient(64, 48, index))
            .unwrap();
    }
    done.store(true, Ordering::Release);
    assert!(renderer.join().unwrap() > 0);
    assert_eq!(world.frames_published(), 200);
}
