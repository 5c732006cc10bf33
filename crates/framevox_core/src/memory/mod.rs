//! # Memory Management
//!
//! Recycled buffers for the frame path.
//!
//! ## Design Philosophy
//!
//! Mesh buffers are allocated during the first frames. After that:
//! - Released buffers keep their capacity
//! - Acquiring a buffer pops one off a free stack
//! - Allocation only happens when the pool runs dry

mod buffer_pool;

pub use buffer_pool::{BufferPool, PooledVec};
