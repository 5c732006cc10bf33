//! # FRAMEVOX World
//!
//! Voxel terrain rebuilt from every frame of a video.
//!
//! ## Pipeline
//!
//! 1. **Height field**: each pixel's brightness becomes a terrain height
//! 2. **Columns**: the frame is tiled into 16x16 chunk columns
//! 3. **Meshes**: every column is meshed against its four neighbours
//! 4. **Publishing**: meshes replace their predecessors in slot tables
//!    that a renderer commits once per draw
//!
//! Steps 1 to 3 run as strip passes on a shared [`framevox_core::WorkerPool`];
//! step 4 runs on the caller's thread.
//!
//! ## Example
//!
//! ```rust,ignore
//! use framevox_core::FramevoxConfig;
//! use framevox_world::{FrameWorld, GeometryType, VideoFrame};
//!
//! let world = FrameWorld::new(640, 360, &FramevoxConfig::default())?;
//! world.display_frame(&VideoFrame::gradient(640, 360, 0))?;
//!
//! let solid = world.commit_geometry(GeometryType::Solid);
//! assert_eq!(solid.live_count(), 40 * 22);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod chunk;
pub mod error;
pub mod frame;
pub mod heightfield;
pub mod mesher;
pub mod noise;
pub mod world;

pub use chunk::{Block, ChunkColumn, ChunkCoord, CHUNK_HEIGHT, CHUNK_SIZE, WATER_LEVEL};
pub use error::{WorldError, WorldResult};
pub use frame::VideoFrame;
pub use heightfield::{HeightField, HeightGenerator, MAX_TERRAIN_HEIGHT};
pub use mesher::{mesh_column, ChunkMesh, GeometryType, MeshPayload, Neighbours, Vertex};
pub use noise::{NoiseSeed, TerrainNoise};
pub use world::{FrameReport, FrameWorld, MeshRecycler};
