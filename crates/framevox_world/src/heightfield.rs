//! # Height Field
//!
//! Turns a [`VideoFrame`] into one terrain height per pixel.
//!
//! Bright pixels grow mountains, dark pixels sink into valleys, and a
//! cosine ramp around mid brightness blends the two so the terrain has no
//! visible seam:
//!
//! ```text
//! brightness:  0.0 ─────── 0.2 ───── 0.5 ───── 0.8 ─────── 1.0
//! blend:       valley only │   cosine ramp    │ mountain only
//! ```
//!
//! Rows are generated in horizontal strips, one task per worker.

use std::sync::Arc;

use framevox_core::{run_strip_pass, StripPlan, WorkerPool};
use parking_lot::RwLock;

use crate::error::{WorldError, WorldResult};
use crate::frame::VideoFrame;
use crate::noise::{NoiseSeed, TerrainNoise};

/// Highest terrain height a pixel can produce.
pub const MAX_TERRAIN_HEIGHT: u8 = 25;

/// Height of a pure black pixel before noise.
const MIN_BRIGHTNESS_HEIGHT: f32 = 2.0;
/// Height of a pure white pixel before noise.
const MAX_BRIGHTNESS_HEIGHT: f32 = 4.0;

const MOUNTAIN_NOISE_SCALE: f32 = 0.033;
const MOUNTAIN_INTENSITY: f32 = 32.2;
const VALLEY_NOISE_SCALE: f32 = 0.017;
const VALLEY_INTENSITY: f32 = 5.0;

const TRANSITION_CENTER: f32 = 0.5;
const TRANSITION_WIDTH: f32 = 0.6;

/// Noise drift per frame, so still footage keeps moving.
const DRIFT_PER_FRAME: f32 = 0.001;

/// Per-pixel terrain heights, one lock per row.
///
/// Strips write disjoint rows, so row locks never contend during
/// generation; later passes only read.
pub struct HeightField {
    width: usize,
    height: usize,
    rows: Vec<RwLock<Vec<u8>>>,
}

impl HeightField {
    /// Creates a flat field of `width` x `height` zeros.
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rows: (0..height).map(|_| RwLock::new(vec![0; width])).collect(),
        }
    }

    /// Creates a field where every cell is `value`.
    #[must_use]
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            rows: (0..height).map(|_| RwLock::new(vec![value; width])).collect(),
        }
    }

    /// Field width (frame columns).
    #[inline]
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Field height (frame rows).
    #[inline]
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Height at column `x`, row `y`. `None` outside the field.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        if x >= self.width {
            return None;
        }
        self.rows.get(y).map(|row| row.read()[x])
    }

    fn write_row(&self, y: usize, f: impl FnOnce(&mut [u8])) {
        if let Some(row) = self.rows.get(y) {
            f(row.write().as_mut_slice());
        }
    }
}

impl std::fmt::Debug for HeightField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeightField")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Computes terrain heights from pixel brightness.
pub struct HeightGenerator {
    noise: TerrainNoise,
}

impl HeightGenerator {
    /// Creates a generator whose noise is derived from `seed`.
    #[must_use]
    pub fn new(seed: NoiseSeed) -> Self {
        Self {
            noise: TerrainNoise::new(seed),
        }
    }

    /// Noise offset applied to frame `index`.
    #[inline]
    #[must_use]
    pub fn drift(index: u64) -> f32 {
        // Wraps well before f32 loses precision on small offsets
        (index % 1_000_000) as f32 * DRIFT_PER_FRAME
    }

    /// Height for one pixel of brightness `brightness` at `(x, y)`.
    ///
    /// # Arguments
    ///
    /// * `brightness` - Luminance in `[0, 1]`
    /// * `x`, `y` - Pixel coordinates, already offset by the frame drift
    #[must_use]
    pub fn height(&self, brightness: f32, x: f32, y: f32) -> u8 {
        let base = MIN_BRIGHTNESS_HEIGHT
            + brightness * (MAX_BRIGHTNESS_HEIGHT - MIN_BRIGHTNESS_HEIGHT);
        let blend = transition(brightness);

        let mountain = if brightness < 0.5 {
            0.0
        } else {
            let factor = (brightness - 0.5) * 2.0;
            self.noise
                .sample_unit(x * MOUNTAIN_NOISE_SCALE, y * MOUNTAIN_NOISE_SCALE)
                * factor
                * MOUNTAIN_INTENSITY
        };

        let valley = if brightness > 0.5 {
            0.0
        } else {
            let factor = (0.5 - brightness) * 2.0;
            self.noise
                .sample_unit(x * VALLEY_NOISE_SCALE, y * VALLEY_NOISE_SCALE)
                * factor
                * VALLEY_INTENSITY
        };

        clamp_height(base + mountain * blend + valley * (1.0 - blend))
    }

    /// Fills rows `start..end` of `field` from `frame`.
    pub fn fill_rows(&self, frame: &VideoFrame, field: &HeightField, start: usize, end: usize) {
        let drift = Self::drift(frame.index());
        let width = frame.width().min(field.width());

        for y in start..end.min(frame.height()) {
            field.write_row(y, |row| {
                for (x, cell) in row.iter_mut().enumerate().take(width) {
                    let brightness = frame.luminance(x, y);
                    *cell = self.height(brightness, x as f32 + drift, y as f32 + drift);
                }
            });
        }
    }

    /// Generates the whole field from `frame`, one strip of rows per worker.
    ///
    /// Returns once every row has been written.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::FrameSize`] if the frame does not match the
    /// field, or a pool error if a strip could not be scheduled or failed.
    pub fn generate(
        self: &Arc<Self>,
        pool: &WorkerPool,
        frame: &VideoFrame,
        field: &Arc<HeightField>,
    ) -> WorldResult<()> {
        if frame.width() != field.width() || frame.height() != field.height() {
            return Err(WorldError::FrameSize {
                width: field.width(),
                height: field.height(),
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }

        let plan = StripPlan::new(field.height(), pool.thread_count());
        let generator = Arc::clone(self);
        let frame = frame.clone();
        let field = Arc::clone(field);

        run_strip_pass(pool, &plan, move |strip| {
            generator.fill_rows(&frame, &field, strip.start, strip.end);
        })?;
        Ok(())
    }
}

impl Default for HeightGenerator {
    fn default() -> Self {
        Self::new(NoiseSeed::default())
    }
}

/// Cosine ramp from valley (0) to mountain (1) around mid brightness.
#[must_use]
pub fn transition(brightness: f32) -> f32 {
    let start = TRANSITION_CENTER - TRANSITION_WIDTH / 2.0;
    let adjusted = ((brightness - start) / TRANSITION_WIDTH).clamp(0.0, 1.0);
    0.5 * (1.0 - (adjusted * std::f32::consts::PI).cos())
}

#[inline]
fn clamp_height(height: f32) -> u8 {
    height.clamp(0.0, f32::from(MAX_TERRAIN_HEIGHT)) as u8
}
