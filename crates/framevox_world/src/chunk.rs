//! # Chunk Columns
//!
//! The world is a fixed grid of 16x16 block columns, one per 16x16 pixel
//! tile of the frame. A column stores only its surface heights; blocks are
//! derived from them on demand:
//!
//! ```text
//! y = 29 ┐
//!        │ air
//! y = s  ┤ ← surface (grass, or sand below height 10)
//!        │ dirt
//! s - 3  ┤ filler (sand < 10, dirt 10..12, stone >= 12)
//! y = 4  ┤
//!        │ stone
//! y = 0  ┘
//! ```
//!
//! Columns whose surface is at or below the water level carry one layer of
//! water at `y = 8`.

use framevox_core::{Aabb, SlotId};

use crate::heightfield::HeightField;
use crate::mesher::GeometryType;

/// Chunk width/depth in blocks.
pub const CHUNK_SIZE: usize = 16;

/// Chunk height in blocks.
pub const CHUNK_HEIGHT: usize = 30;

/// Layer that holds water over low columns.
pub const WATER_LEVEL: usize = 8;

/// Everything below this layer is stone.
const STONE_BASE_HEIGHT: usize = 4;

/// Dirt layers between the filler and the surface block.
const DIRT_LAYERS: usize = 3;

/// Terrain height below which filler and surface turn to sand.
const SAND_BELOW: u8 = 10;

/// Terrain height from which filler turns to stone.
const STONE_FROM: u8 = 12;

/// Height used for samples outside the height field.
const FALLBACK_HEIGHT: u8 = 1;

/// Block kinds that terrain generation produces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Block {
    /// Empty space.
    #[default]
    Air = 0,
    /// Stone.
    Stone = 1,
    /// Dirt.
    Dirt = 2,
    /// Grass-topped dirt.
    Grass = 3,
    /// Sand.
    Sand = 4,
    /// Water.
    Water = 5,
}

impl Block {
    /// Returns true for air.
    #[inline]
    #[must_use]
    pub const fn is_air(self) -> bool {
        matches!(self, Self::Air)
    }

    /// Returns true if faces behind this block can be seen.
    #[inline]
    #[must_use]
    pub const fn is_transparent(self) -> bool {
        matches!(self, Self::Air | Self::Water)
    }

    /// Geometry batch this block's faces belong to. `None` for air.
    #[must_use]
    pub const fn geometry(self) -> Option<GeometryType> {
        match self {
            Self::Air => None,
            Self::Water => Some(GeometryType::Transparent),
            _ => Some(GeometryType::Solid),
        }
    }
}

/// Chunk coordinate in the grid.
///
/// `x` runs across the frame (columns), `z` runs down it (rows).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not blocks).
    pub x: usize,
    /// Z coordinate (in chunks, not blocks).
    pub z: usize,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: usize, z: usize) -> Self {
        Self { x, z }
    }

    /// World X of the chunk's origin corner.
    #[inline]
    #[must_use]
    pub const fn world_x(self) -> usize {
        self.x * CHUNK_SIZE
    }

    /// World Z of the chunk's origin corner.
    #[inline]
    #[must_use]
    pub const fn world_z(self) -> usize {
        self.z * CHUNK_SIZE
    }

    /// Bounding box of the whole column.
    #[must_use]
    pub fn bounds(self) -> Aabb {
        let x = self.world_x() as f32;
        let z = self.world_z() as f32;
        Aabb::new(
            [x, 0.0, z],
            [x + CHUNK_SIZE as f32, CHUNK_HEIGHT as f32, z + CHUNK_SIZE as f32],
        )
    }
}

/// One column of the world grid.
#[derive(Clone, Debug)]
pub struct ChunkColumn {
    coord: ChunkCoord,
    /// Terrain height per local column, indexed `[x][z]`.
    heights: [[u8; CHUNK_SIZE]; CHUNK_SIZE],
    /// Published mesh per geometry type.
    mesh_ids: [SlotId; GeometryType::COUNT],
}

impl ChunkColumn {
    /// Creates a flat column with nothing published yet.
    #[must_use]
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            heights: [[FALLBACK_HEIGHT; CHUNK_SIZE]; CHUNK_SIZE],
            mesh_ids: [SlotId::RESERVED; GeometryType::COUNT],
        }
    }

    /// Grid position of this column.
    #[inline]
    #[must_use]
    pub const fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Bounding box of this column.
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.coord.bounds()
    }

    /// Re-samples terrain heights from `field`. Mesh IDs are kept.
    pub fn regenerate(&mut self, field: &HeightField) {
        let origin_x = self.coord.world_x();
        let origin_z = self.coord.world_z();

        for (x, column) in self.heights.iter_mut().enumerate() {
            for (z, height) in column.iter_mut().enumerate() {
                *height = field
                    .get(origin_x + x, origin_z + z)
                    .unwrap_or(FALLBACK_HEIGHT);
            }
        }
    }

    /// Terrain height at local `(x, z)`, or `None` out of range.
    #[inline]
    #[must_use]
    pub fn height(&self, x: usize, z: usize) -> Option<u8> {
        self.heights.get(x).and_then(|column| column.get(z)).copied()
    }

    /// Index of the first air layer at local `(x, z)`.
    #[inline]
    #[must_use]
    pub fn surface(&self, x: usize, z: usize) -> usize {
        let height = self.height(x, z).unwrap_or(FALLBACK_HEIGHT);
        usize::from(height).clamp(1, CHUNK_HEIGHT - 1)
    }

    /// Block at local coordinates. Out of range reads as air.
    ///
    /// # Arguments
    ///
    /// * `x` - Local X (0-15)
    /// * `y` - Y level (0-29)
    /// * `z` - Local Z (0-15)
    #[must_use]
    pub fn block_at(&self, x: usize, y: usize, z: usize) -> Block {
        let Some(height) = self.height(x, z) else {
            return Block::Air;
        };
        if y >= CHUNK_HEIGHT {
            return Block::Air;
        }

        let surface = self.surface(x, z);
        if y < surface {
            return layer_block(y, surface, height);
        }
        if y == WATER_LEVEL && surface <= WATER_LEVEL {
            return Block::Water;
        }
        Block::Air
    }

    /// Published mesh ID for `geometry`, or [`SlotId::RESERVED`] if none.
    #[inline]
    #[must_use]
    pub fn mesh_id(&self, geometry: GeometryType) -> SlotId {
        self.mesh_ids[geometry.index()]
    }

    /// Records the published mesh ID for `geometry`, returning the old one.
    pub fn replace_mesh_id(&mut self, geometry: GeometryType, id: SlotId) -> SlotId {
        std::mem::replace(&mut self.mesh_ids[geometry.index()], id)
    }
}

/// Block below the surface, picked by depth and terrain height.
fn layer_block(y: usize, surface: usize, height: u8) -> Block {
    if y < STONE_BASE_HEIGHT {
        Block::Stone
    } else if y + DIRT_LAYERS < surface {
        if height < SAND_BELOW {
            Block::Sand
        } else if height >= STONE_FROM {
            Block::Stone
        } else {
            Block::Dirt
        }
    } else if y + 1 < surface {
        Block::Dirt
    } else if height < SAND_BELOW {
        Block::Sand
    } else {
        Block::Grass
    }
}
