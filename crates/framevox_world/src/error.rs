//! # World Error Types

use framevox_core::PoolError;
use thiserror::Error;

/// Errors that can occur while building a world from frames.
#[derive(Error, Debug)]
pub enum WorldError {
    /// A scheduling pass failed.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// The pixel buffer does not match the declared frame size.
    #[error("pixel buffer has {actual} bytes, expected {expected} for {width}x{height} RGB")]
    PixelBuffer {
        /// Declared width.
        width: usize,
        /// Declared height.
        height: usize,
        /// Expected byte count.
        expected: usize,
        /// Actual byte count.
        actual: usize,
    },

    /// The frame is too small to hold a single chunk.
    #[error("frame {width}x{height} is smaller than one chunk")]
    FrameTooSmall {
        /// Frame width.
        width: usize,
        /// Frame height.
        height: usize,
    },

    /// The frame size differs from the size the world was built for.
    #[error("frame is {actual_width}x{actual_height}, world expects {width}x{height}")]
    FrameSize {
        /// Expected width.
        width: usize,
        /// Expected height.
        height: usize,
        /// Width of the offending frame.
        actual_width: usize,
        /// Height of the offending frame.
        actual_height: usize,
    },
}

/// Result type for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
