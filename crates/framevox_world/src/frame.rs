//! # Video Frames
//!
//! Decoded RGB8 frames as they arrive from a decoder.

use std::sync::Arc;

use crate::error::{WorldError, WorldResult};

/// Rec. 601 luma weights.
const LUMA: [f32; 3] = [0.299, 0.587, 0.114];

/// A packed RGB8 frame, cheap to clone and share across workers.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    width: usize,
    height: usize,
    index: u64,
    pixels: Arc<[u8]>,
}

impl VideoFrame {
    /// Wraps a packed RGB8 buffer (`width * height * 3` bytes, row-major).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::PixelBuffer`] if the length does not match.
    pub fn new(width: usize, height: usize, index: u64, pixels: Vec<u8>) -> WorldResult<Self> {
        let expected = width * height * 3;
        if pixels.len() != expected {
            return Err(WorldError::PixelBuffer {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }

        Ok(Self {
            width,
            height,
            index,
            pixels: pixels.into(),
        })
    }

    /// Creates a frame of a single color.
    #[must_use]
    pub fn solid(width: usize, height: usize, index: u64, rgb: [u8; 3]) -> Self {
        let pixels: Vec<u8> = rgb.iter().copied().cycle().take(width * height * 3).collect();
        Self {
            width,
            height,
            index,
            pixels: pixels.into(),
        }
    }

    /// Creates a synthetic frame: a diagonal gradient that drifts with `index`.
    #[must_use]
    pub fn gradient(width: usize, height: usize, index: u64) -> Self {
        let shift = (index % 256) as usize;
        let mut pixels = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for x in 0..width {
                let v = ((x + y + shift * 4) % 256) as u8;
                pixels.extend_from_slice(&[v, v / 2 + 64, 255 - v]);
            }
        }
        Self {
            width,
            height,
            index,
            pixels: pixels.into(),
        }
    }

    /// Frame width in pixels.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Frame height in pixels.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Position of the frame in its stream.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Returns the RGB triple at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the frame.
    #[inline]
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let offset = (y * self.width + x) * 3;
        [
            self.pixels[offset],
            self.pixels[offset + 1],
            self.pixels[offset + 2],
        ]
    }

    /// Returns the brightness at `(x, y)` in `[0, 1]`.
    #[inline]
    #[must_use]
    pub fn luminance(&self, x: usize, y: usize) -> f32 {
        let [r, g, b] = self.pixel(x, y);
        (f32::from(r) * LUMA[0] + f32::from(g) * LUMA[1] + f32::from(b) * LUMA[2]) / 255.0
    }
}
