//! # Frame World
//!
//! Turns every decoded frame into published terrain meshes.
//!
//! ```text
//! frame ──> height field        strip pass over frame rows
//!       ──> regenerate columns  strip pass over grid columns   ┐ barrier
//!       ──> mesh columns        strip pass, reads neighbours   ┘ barrier
//!       ──> publish             calling thread, under the world lock
//! ```
//!
//! Publishing replaces each column's previous mesh with
//! `mark_for_deletion(old)` + `write(new)` per geometry type. The renderer
//! picks the changes up with [`FrameWorld::commit_geometry`], which hands
//! released mesh buffers back to the world's buffer pools.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use framevox_core::{
    run_strip_pass, Aabb, BufferPool, FramevoxConfig, PoolStats, SlotAllocator, SlotBackend,
    SlotId, SlotView, StripPlan, WorkerPool,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::chunk::{ChunkColumn, ChunkCoord, CHUNK_SIZE};
use crate::error::{WorldError, WorldResult};
use crate::frame::VideoFrame;
use crate::heightfield::{HeightField, HeightGenerator};
use crate::mesher::{mesh_column, ChunkMesh, GeometryType, MeshPayload, Neighbours, Vertex};
use crate::noise::NoiseSeed;

/// Summary of one displayed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Index of the frame in its stream.
    pub frame_index: u64,
    /// Chunk columns regenerated.
    pub columns: usize,
    /// Meshes handed to the slot allocators.
    pub published: usize,
    /// Vertices across all published meshes.
    pub vertices: usize,
    /// Triangles across all published meshes.
    pub triangles: usize,
    /// Wall time spent on the frame.
    pub elapsed: Duration,
}

/// Returns released mesh buffers to the world's buffer pools.
pub struct MeshRecycler<'a> {
    vertices: &'a BufferPool<Vertex>,
    indices: &'a BufferPool<u32>,
    uploaded: usize,
    released: usize,
}

impl<'a> MeshRecycler<'a> {
    /// Creates a recycler feeding the given pools.
    #[must_use]
    pub fn new(vertices: &'a BufferPool<Vertex>, indices: &'a BufferPool<u32>) -> Self {
        Self {
            vertices,
            indices,
            uploaded: 0,
            released: 0,
        }
    }

    /// Meshes installed during the commit.
    #[must_use]
    pub const fn uploaded(&self) -> usize {
        self.uploaded
    }

    /// Meshes recycled during the commit.
    #[must_use]
    pub const fn released(&self) -> usize {
        self.released
    }
}

impl SlotBackend<MeshPayload> for MeshRecycler<'_> {
    fn upload(&mut self, _id: SlotId, _payload: &MeshPayload, _bounds: &Aabb) {
        self.uploaded += 1;
    }

    fn release(&mut self, _id: SlotId, payload: MeshPayload) {
        self.vertices.release(payload.vertices);
        self.indices.release(payload.indices);
        self.released += 1;
    }
}

/// State shared with strip tasks.
struct WorldState {
    frame_width: usize,
    frame_height: usize,
    columns_x: usize,
    columns_z: usize,
    field: Arc<HeightField>,
    generator: Arc<HeightGenerator>,
    /// Chunk columns, indexed `x * columns_z + z`.
    grid: Vec<RwLock<ChunkColumn>>,
    /// Meshes built in pass 2 and consumed in pass 3.
    meshes: Vec<Mutex<Option<ChunkMesh>>>,
    vertex_pool: BufferPool<Vertex>,
    index_pool: BufferPool<u32>,
    slots: [SlotAllocator<MeshPayload>; GeometryType::COUNT],
    /// Serializes publishing; the world lock.
    publish: Mutex<()>,
    frames_published: AtomicU64,
}

impl WorldState {
    #[inline]
    fn index(&self, x: usize, z: usize) -> usize {
        x * self.columns_z + z
    }

    fn regenerate_columns(&self, xs: std::ops::Range<usize>) {
        for x in xs {
            for z in 0..self.columns_z {
                self.grid[self.index(x, z)].write().regenerate(&self.field);
            }
        }
    }

    fn mesh_columns(&self, xs: std::ops::Range<usize>) {
        for x in xs {
            for z in 0..self.columns_z {
                let column = self.grid[self.index(x, z)].read();
                let left = (x > 0).then(|| self.grid[self.index(x - 1, z)].read());
                let right = (x + 1 < self.columns_x).then(|| self.grid[self.index(x + 1, z)].read());
                let back = (z > 0).then(|| self.grid[self.index(x, z - 1)].read());
                let front = (z + 1 < self.columns_z).then(|| self.grid[self.index(x, z + 1)].read());

                let neighbours = Neighbours {
                    left: left.as_deref(),
                    right: right.as_deref(),
                    back: back.as_deref(),
                    front: front.as_deref(),
                };
                let mesh = mesh_column(&column, &neighbours, &self.vertex_pool, &self.index_pool);
                *self.meshes[self.index(x, z)].lock() = Some(mesh);
            }
        }
    }
}

/// A world of chunk columns rebuilt from every frame.
///
/// # Example
///
/// ```rust,ignore
/// let world = FrameWorld::new(1920, 1080, &FramevoxConfig::default())?;
/// let report = world.display_frame(&frame)?;
///
/// // Render thread
/// let view = world.commit_geometry(GeometryType::Solid);
/// for (id, mesh, bounds) in view.iter() { /* draw */ }
/// ```
pub struct FrameWorld {
    pool: Arc<WorkerPool>,
    state: Arc<WorldState>,
}

impl FrameWorld {
    /// Creates a world for `width` x `height` frames with its own worker pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is smaller than one chunk or the
    /// worker pool cannot be started.
    pub fn new(width: usize, height: usize, config: &FramevoxConfig) -> WorldResult<Self> {
        let pool = Arc::new(WorkerPool::from_config(&config.pool)?);
        Self::with_pool(pool, width, height, config, NoiseSeed::default())
    }

    /// Creates a world that schedules its passes on `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::FrameTooSmall`] if either side is shorter than
    /// one chunk.
    pub fn with_pool(
        pool: Arc<WorkerPool>,
        width: usize,
        height: usize,
        config: &FramevoxConfig,
        seed: NoiseSeed,
    ) -> WorldResult<Self> {
        if width < CHUNK_SIZE || height < CHUNK_SIZE {
            return Err(WorldError::FrameTooSmall { width, height });
        }

        let columns_x = width / CHUNK_SIZE;
        let columns_z = height / CHUNK_SIZE;
        let mut grid = Vec::with_capacity(columns_x * columns_z);
        for x in 0..columns_x {
            for z in 0..columns_z {
                grid.push(RwLock::new(ChunkColumn::new(ChunkCoord::new(x, z))));
            }
        }

        let state = WorldState {
            frame_width: width,
            frame_height: height,
            columns_x,
            columns_z,
            field: Arc::new(HeightField::new(width, height)),
            generator: Arc::new(HeightGenerator::new(seed)),
            meshes: (0..grid.len()).map(|_| Mutex::new(None)).collect(),
            grid,
            vertex_pool: BufferPool::new(config.buffers.vertex_capacity),
            index_pool: BufferPool::new(config.buffers.index_capacity),
            slots: [
                SlotAllocator::new(config.slots.initial_slots),
                SlotAllocator::new(config.slots.initial_slots),
            ],
            publish: Mutex::new(()),
            frames_published: AtomicU64::new(0),
        };

        debug!(width, height, columns_x, columns_z, "frame world created");

        Ok(Self {
            pool,
            state: Arc::new(state),
        })
    }

    /// Builds and publishes the terrain for `frame`.
    ///
    /// Blocks until every pass is done. Concurrent calls are serialized at
    /// the publish step only; frames should be displayed from one thread.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::FrameSize`] for a frame of the wrong size, or a
    /// pool error if a pass could not be scheduled or one of its strips
    /// failed. Nothing is published for a frame whose passes failed.
    pub fn display_frame(&self, frame: &VideoFrame) -> WorldResult<FrameReport> {
        let started = Instant::now();
        let state = &self.state;

        if frame.width() != state.frame_width || frame.height() != state.frame_height {
            return Err(WorldError::FrameSize {
                width: state.frame_width,
                height: state.frame_height,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }

        state.generator.generate(&self.pool, frame, &state.field)?;

        let plan = StripPlan::new(state.columns_x, self.pool.thread_count());

        let shared = Arc::clone(state);
        run_strip_pass(&self.pool, &plan, move |strip| {
            shared.regenerate_columns(strip.rows());
        })?;
        trace!(frame = frame.index(), "columns regenerated");

        let shared = Arc::clone(state);
        run_strip_pass(&self.pool, &plan, move |strip| {
            shared.mesh_columns(strip.rows());
        })?;
        trace!(frame = frame.index(), "columns meshed");

        let mut report = self.publish(&plan);
        report.frame_index = frame.index();
        report.elapsed = started.elapsed();

        debug!(
            frame = report.frame_index,
            published = report.published,
            vertices = report.vertices,
            elapsed_us = report.elapsed.as_micros() as u64,
            "frame displayed"
        );
        Ok(report)
    }

    /// Pass 3: swaps every column's meshes, strip by strip.
    ///
    /// A column lock and a slot-table lock are never held together: the
    /// render thread may hold a view while it reads columns.
    fn publish(&self, plan: &StripPlan) -> FrameReport {
        let state = &self.state;
        let _publishing = state.publish.lock();
        let mut report = FrameReport::default();

        for strip in plan.iter() {
            for x in strip.rows() {
                for z in 0..state.columns_z {
                    let index = state.index(x, z);
                    let Some(mesh) = state.meshes[index].lock().take() else {
                        continue;
                    };
                    let (bounds, old_ids) = {
                        let column = state.grid[index].read();
                        (column.bounds(), GeometryType::ALL.map(|g| column.mesh_id(g)))
                    };

                    let mut new_ids = old_ids;
                    for (geometry, part) in GeometryType::ALL.into_iter().zip(mesh.into_parts()) {
                        report.vertices += part.vertex_count();
                        report.triangles += part.triangle_count();

                        let slots = &state.slots[geometry.index()];
                        slots.mark_for_deletion(old_ids[geometry.index()]);
                        new_ids[geometry.index()] = slots.write(part, bounds);
                        report.published += 1;
                    }

                    let mut column = state.grid[index].write();
                    for geometry in GeometryType::ALL {
                        column.replace_mesh_id(geometry, new_ids[geometry.index()]);
                    }
                    report.columns += 1;
                }
            }
        }

        state.frames_published.fetch_add(1, Ordering::Release);
        report
    }

    /// Applies pending mesh changes for `geometry` and returns the live set.
    ///
    /// Replaced meshes go back to the world's buffer pools. Hold the view
    /// only while drawing; publishing continues once it is dropped.
    #[must_use]
    pub fn commit_geometry(&self, geometry: GeometryType) -> SlotView<'_, MeshPayload> {
        let state = &self.state;
        let mut recycler = MeshRecycler::new(&state.vertex_pool, &state.index_pool);
        let view = state.slots[geometry.index()].commit_with(&mut recycler);
        trace!(
            ?geometry,
            uploaded = recycler.uploaded(),
            recycled = recycler.released(),
            "geometry committed"
        );
        view
    }

    /// Changes the number of workers used by the passes.
    ///
    /// # Errors
    ///
    /// See [`WorkerPool::set_thread_count`].
    pub fn set_thread_count(&self, threads: usize) -> WorldResult<()> {
        self.pool.set_thread_count(threads)?;
        Ok(())
    }

    /// Copy of the column at `coord`, if it is on the grid.
    #[must_use]
    pub fn column(&self, coord: ChunkCoord) -> Option<ChunkColumn> {
        if coord.x >= self.state.columns_x || coord.z >= self.state.columns_z {
            return None;
        }
        Some(self.state.grid[self.state.index(coord.x, coord.z)].read().clone())
    }

    /// Grid size in columns, `(x, z)`.
    #[must_use]
    pub fn grid_size(&self) -> (usize, usize) {
        (self.state.columns_x, self.state.columns_z)
    }

    /// Frame size this world expects, `(width, height)`.
    #[must_use]
    pub fn frame_size(&self) -> (usize, usize) {
        (self.state.frame_width, self.state.frame_height)
    }

    /// Terrain heights of the last frame.
    #[must_use]
    pub fn height_field(&self) -> &HeightField {
        &self.state.field
    }

    /// Number of frames published so far.
    #[must_use]
    pub fn frames_published(&self) -> u64 {
        self.state.frames_published.load(Ordering::Acquire)
    }

    /// Worker pool the passes run on.
    #[must_use]
    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Pool counters.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Vertex buffer pool backing the meshes.
    #[must_use]
    pub fn vertex_pool(&self) -> &BufferPool<Vertex> {
        &self.state.vertex_pool
    }

    /// Index buffer pool backing the meshes.
    #[must_use]
    pub fn index_pool(&self) -> &BufferPool<u32> {
        &self.state.index_pool
    }
}

impl std::fmt::Debug for FrameWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWorld")
            .field("frame_size", &self.frame_size())
            .field("grid_size", &self.grid_size())
            .field("threads", &self.pool.thread_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> FramevoxConfig {
        let mut config = FramevoxConfig::default();
        config.pool.threads = 3;
        config.slots.initial_slots = 8;
        config.buffers.vertex_capacity = 256;
        config.buffers.index_capacity = 384;
        config
    }

    #[test]
    fn test_too_small_frame() {
        let err = FrameWorld::new(8, 64, &small_config()).unwrap_err();
        assert!(matches!(err, WorldError::FrameTooSmall { width: 8, .. }));
    }

    #[test]
    fn test_grid_size_truncates() {
        let world = FrameWorld::new(70, 33, &small_config()).unwrap();
        assert_eq!(world.grid_size(), (4, 2));
        assert_eq!(world.frame_size(), (70, 33));
    }

    #[test]
    fn test_wrong_frame_size_rejected() {
        let world = FrameWorld::new(64, 32, &small_config()).unwrap();
        let err = world
            .display_frame(&VideoFrame::gradient(64, 48, 0))
            .unwrap_err();
        assert!(matches!(err, WorldError::FrameSize { actual_height: 48, .. }));
        assert_eq!(world.frames_published(), 0);
    }

    #[test]
    fn test_first_frame_publishes_every_column() {
        let world = FrameWorld::new(64, 48, &small_config()).unwrap();
        let report = world.display_frame(&VideoFrame::gradient(64, 48, 1)).unwrap();

        assert_eq!(report.frame_index, 1);
        assert_eq!(report.columns, 12);
        assert_eq!(report.published, 12 * GeometryType::COUNT);
        assert!(report.vertices > 0);

        let solid = world.commit_geometry(GeometryType::Solid);
        assert_eq!(solid.live_count(), 12);
        drop(solid);
        let water = world.commit_geometry(GeometryType::Transparent);
        assert_eq!(water.live_count(), 12);
    }

    #[test]
    fn test_second_frame_replaces_meshes() {
        let world = FrameWorld::new(64, 48, &small_config()).unwrap();
        world.display_frame(&VideoFrame::gradient(64, 48, 1)).unwrap();
        let first: Vec<SlotId> = world
            .commit_geometry(GeometryType::Solid)
            .iter()
            .map(|(id, _, _)| id)
            .collect();

        world.display_frame(&VideoFrame::gradient(64, 48, 2)).unwrap();
        let view = world.commit_geometry(GeometryType::Solid);
        assert_eq!(view.live_count(), 12);
        assert!(first.iter().all(|id| view.get(*id).is_none()));

        let column = world.column(ChunkCoord::new(3, 2)).unwrap();
        let (_, bounds) = view.get(column.mesh_id(GeometryType::Solid)).unwrap();
        assert_eq!(*bounds, ChunkCoord::new(3, 2).bounds());
    }

    #[test]
    fn test_commit_recycles_buffers() {
        let world = FrameWorld::new(32, 32, &small_config()).unwrap();
        for index in 0..3 {
            world.display_frame(&VideoFrame::gradient(32, 32, index)).unwrap();
            for geometry in GeometryType::ALL {
                drop(world.commit_geometry(geometry));
            }
        }
        // 4 columns x 2 geometry types are live; earlier meshes came back
        assert!(world.vertex_pool().available() > 0);
        assert!(world.index_pool().available() > 0);
        assert!(world.vertex_pool().total_created() <= 8 * 3);
    }

    #[test]
    fn test_thread_count_change_between_frames() {
        let world = FrameWorld::new(96, 32, &small_config()).unwrap();
        world.display_frame(&VideoFrame::gradient(96, 32, 0)).unwrap();
        world.set_thread_count(5).unwrap();
        let report = world.display_frame(&VideoFrame::gradient(96, 32, 1)).unwrap();

        assert_eq!(world.pool().thread_count(), 5);
        assert_eq!(report.columns, 12);
        assert_eq!(world.frames_published(), 2);
    }
}
