//! # FRAMEVOX Core
//!
//! Concurrent scheduling and pooled resources for turning video frames into
//! published geometry, every frame, without allocation storms:
//! - Deferred tasks with captured results and failures
//! - A fixed-worker pool with a wait-all barrier and run-time resizing
//! - Recycled `Vec` buffers for mesh data
//! - A stable-ID slot table with staged commit/delete
//!
//! ## Architecture Rules
//!
//! 1. **Pool the buffers** - Mesh memory is recycled, not reallocated
//! 2. **One lock per resource** - Never hold two of them at once
//! 3. **Failures stay in the task** - A failing task never takes down a worker
//!
//! ## Example
//!
//! ```rust,ignore
//! use framevox_core::{run_strip_pass, StripPlan, WorkerPool};
//!
//! let pool = WorkerPool::new(4)?;
//! let plan = StripPlan::new(height, pool.thread_count());
//! run_strip_pass(&pool, &plan, move |strip| generate_rows(strip.rows()))?;
//! // Every strip is done here
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod geometry;
pub mod memory;
pub mod sched;
pub mod strip;
pub mod task;

pub use config::{BufferConfig, FramevoxConfig, PoolConfig, SlotConfig};
pub use error::{
    ConfigError, ConfigResult, PoolError, PoolResult, TaskError, TaskFailure, TaskResult,
};
pub use geometry::{Aabb, NoopBackend, SlotAllocator, SlotBackend, SlotEntry, SlotId, SlotView};
pub use memory::{BufferPool, PooledVec};
pub use sched::{PoolStats, TaskHandle, TaskId, WorkerPool, DEFAULT_PURGE_INTERVAL};
pub use strip::{run_strip_pass, Strip, StripPlan};
pub use task::{DeferredTask, Invokable, RunStatus};
