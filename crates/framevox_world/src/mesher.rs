//! # Chunk Mesher
//!
//! Builds vertex and index buffers for one chunk column, split by
//! geometry type so water can be drawn after opaque terrain.
//!
//! A block is meshed only if at least one of its six neighbours exists and
//! is see-through. It then gets a face toward every neighbour that is
//! see-through or unknown (edge of the world, missing column).
//!
//! Output buffers are taken from [`BufferPool`]s and go back to them when
//! the published mesh is released.

use bytemuck::{Pod, Zeroable};
use framevox_core::BufferPool;

use crate::chunk::{Block, ChunkColumn, CHUNK_HEIGHT, CHUNK_SIZE};

/// Size of one atlas tile in UV units (16x16 tile atlas).
const TILE_UV: f32 = 0.0625;

/// Vertex layout shared with the renderer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Position in world space [x, y, z]
    pub position: [f32; 3],
    /// Normal direction [nx, ny, nz]
    pub normal: [f32; 3],
    /// Atlas coordinates [u, v]
    pub uv: [f32; 2],
}

impl Vertex {
    /// Size of a vertex in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Render batch a mesh belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeometryType {
    /// Opaque terrain.
    Solid,
    /// Water, drawn blended after solid geometry.
    Transparent,
}

impl GeometryType {
    /// Number of geometry types.
    pub const COUNT: usize = 2;

    /// All geometry types, in draw order.
    pub const ALL: [Self; Self::COUNT] = [Self::Solid, Self::Transparent];

    /// Dense index, usable for per-type arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Solid => 0,
            Self::Transparent => 1,
        }
    }
}

/// Vertex and index buffers of one mesh.
#[derive(Clone, Debug, Default)]
pub struct MeshPayload {
    /// Vertex buffer data.
    pub vertices: Vec<Vertex>,
    /// Index buffer data.
    pub indices: Vec<u32>,
}

impl MeshPayload {
    /// True if the mesh has no geometry.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Vertex count.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Triangle count.
    #[inline]
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Bytes this mesh occupies once uploaded.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        bytemuck::cast_slice::<Vertex, u8>(&self.vertices).len()
            + bytemuck::cast_slice::<u32, u8>(&self.indices).len()
    }
}

/// Meshes of one column, one per geometry type.
#[derive(Debug, Default)]
pub struct ChunkMesh {
    parts: [MeshPayload; GeometryType::COUNT],
}

impl ChunkMesh {
    /// Mesh for `geometry`.
    #[inline]
    #[must_use]
    pub fn part(&self, geometry: GeometryType) -> &MeshPayload {
        &self.parts[geometry.index()]
    }

    /// Splits into per-type meshes, indexed by [`GeometryType::index`].
    #[must_use]
    pub fn into_parts(self) -> [MeshPayload; GeometryType::COUNT] {
        self.parts
    }
}

/// The four horizontal neighbours of a column. Missing ones are `None`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Neighbours<'a> {
    /// Column at `x - 1`.
    pub left: Option<&'a ChunkColumn>,
    /// Column at `x + 1`.
    pub right: Option<&'a ChunkColumn>,
    /// Column at `z - 1`.
    pub back: Option<&'a ChunkColumn>,
    /// Column at `z + 1`.
    pub front: Option<&'a ChunkColumn>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Face {
    Back,
    Front,
    Top,
    Bottom,
    Left,
    Right,
}

impl Face {
    const ALL: [Self; 6] = [
        Self::Back,
        Self::Front,
        Self::Top,
        Self::Bottom,
        Self::Left,
        Self::Right,
    ];

    const fn normal(self) -> [f32; 3] {
        match self {
            Self::Back => [0.0, 0.0, -1.0],
            Self::Front => [0.0, 0.0, 1.0],
            Self::Top => [0.0, 1.0, 0.0],
            Self::Bottom => [0.0, -1.0, 0.0],
            Self::Left => [-1.0, 0.0, 0.0],
            Self::Right => [1.0, 0.0, 0.0],
        }
    }

    /// Corners relative to the block center, wound for `0 3 1, 1 3 2`.
    const fn corners(self) -> [[f32; 3]; 4] {
        match self {
            Self::Back => [
                [0.5, 0.5, -0.5],
                [-0.5, 0.5, -0.5],
                [-0.5, -0.5, -0.5],
                [0.5, -0.5, -0.5],
            ],
            Self::Front => [
                [-0.5, 0.5, 0.5],
                [0.5, 0.5, 0.5],
                [0.5, -0.5, 0.5],
                [-0.5, -0.5, 0.5],
            ],
            Self::Top => [
                [-0.5, 0.5, -0.5],
                [0.5, 0.5, -0.5],
                [0.5, 0.5, 0.5],
                [-0.5, 0.5, 0.5],
            ],
            Self::Bottom => [
                [-0.5, -0.5, 0.5],
                [0.5, -0.5, 0.5],
                [0.5, -0.5, -0.5],
                [-0.5, -0.5, -0.5],
            ],
            Self::Left => [
                [-0.5, 0.5, -0.5],
                [-0.5, 0.5, 0.5],
                [-0.5, -0.5, 0.5],
                [-0.5, -0.5, -0.5],
            ],
            Self::Right => [
                [0.5, 0.5, 0.5],
                [0.5, 0.5, -0.5],
                [0.5, -0.5, -0.5],
                [0.5, -0.5, 0.5],
            ],
        }
    }
}

const FACE_UV: [[f32; 2]; 4] = [[0.0, 0.0], [TILE_UV, 0.0], [TILE_UV, TILE_UV], [0.0, TILE_UV]];
const FACE_INDICES: [u32; 6] = [0, 3, 1, 1, 3, 2];

/// Atlas tile (column, row) for a block face.
const fn atlas_tile(block: Block, face: Face) -> (u8, u8) {
    match (block, face) {
        (Block::Grass, Face::Top) => (0, 0),
        (Block::Grass, Face::Bottom) | (Block::Dirt, _) => (2, 0),
        (Block::Grass, _) => (3, 0),
        (Block::Sand, _) => (2, 1),
        (Block::Water, _) => (13, 12),
        (Block::Stone | Block::Air, _) => (1, 0),
    }
}

/// Builds the meshes of `column`.
///
/// # Arguments
///
/// * `column` - The column to mesh
/// * `neighbours` - Adjacent columns, consulted at the column edges
/// * `vertex_pool` - Source of vertex buffers
/// * `index_pool` - Source of index buffers
#[must_use]
pub fn mesh_column(
    column: &ChunkColumn,
    neighbours: &Neighbours<'_>,
    vertex_pool: &BufferPool<Vertex>,
    index_pool: &BufferPool<u32>,
) -> ChunkMesh {
    let mut parts = [
        MeshPayload {
            vertices: vertex_pool.acquire(),
            indices: index_pool.acquire(),
        },
        MeshPayload {
            vertices: vertex_pool.acquire(),
            indices: index_pool.acquire(),
        },
    ];

    let origin_x = column.coord().world_x() as f32;
    let origin_z = column.coord().world_z() as f32;

    for x in 0..CHUNK_SIZE {
        for z in 0..CHUNK_SIZE {
            for y in 0..CHUNK_HEIGHT {
                let block = column.block_at(x, y, z);
                let Some(geometry) = block.geometry() else {
                    continue;
                };

                let around = Face::ALL.map(|face| neighbour(column, neighbours, x, y, z, face));
                let exposed = around
                    .iter()
                    .any(|block| block.is_some_and(Block::is_transparent));
                if !exposed {
                    continue;
                }

                let center = [origin_x + x as f32, y as f32, origin_z + z as f32];
                let mesh = &mut parts[geometry.index()];
                for (face, next) in Face::ALL.into_iter().zip(around) {
                    if next.map_or(true, Block::is_transparent) {
                        push_face(mesh, block, face, center);
                    }
                }
            }
        }
    }

    ChunkMesh { parts }
}

/// Block next to `(x, y, z)` across `face`, or `None` if nothing is there.
fn neighbour(
    column: &ChunkColumn,
    neighbours: &Neighbours<'_>,
    x: usize,
    y: usize,
    z: usize,
    face: Face,
) -> Option<Block> {
    const LAST: usize = CHUNK_SIZE - 1;

    match face {
        Face::Left if x > 0 => Some(column.block_at(x - 1, y, z)),
        Face::Left => neighbours.left.map(|c| c.block_at(LAST, y, z)),
        Face::Right if x < LAST => Some(column.block_at(x + 1, y, z)),
        Face::Right => neighbours.right.map(|c| c.block_at(0, y, z)),
        Face::Back if z > 0 => Some(column.block_at(x, y, z - 1)),
        Face::Back => neighbours.back.map(|c| c.block_at(x, y, LAST)),
        Face::Front if z < LAST => Some(column.block_at(x, y, z + 1)),
        Face::Front => neighbours.front.map(|c| c.block_at(x, y, 0)),
        Face::Bottom => (y > 0).then(|| column.block_at(x, y - 1, z)),
        Face::Top => (y + 1 < CHUNK_HEIGHT).then(|| column.block_at(x, y + 1, z)),
    }
}

fn push_face(mesh: &mut MeshPayload, block: Block, face: Face, center: [f32; 3]) {
    let base = mesh.vertices.len() as u32;
    let (tile_u, tile_v) = atlas_tile(block, face);
    let tile = [f32::from(tile_u) * TILE_UV, f32::from(tile_v) * TILE_UV];
    let normal = face.normal();

    for (corner, uv) in face.corners().into_iter().zip(FACE_UV) {
        mesh.vertices.push(Vertex {
            position: [
                center[0] + corner[0],
                center[1] + corner[1],
                center[2] + corner[2],
            ],
            normal,
            uv: [tile[0] + uv[0], tile[1] + uv[1]],
        });
    }
    mesh.indices.extend(FACE_INDICES.iter().map(|i| base + i));
}
