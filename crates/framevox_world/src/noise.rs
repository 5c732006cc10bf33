//! # Terrain Noise
//!
//! 2D simplex noise used to raise mountains out of bright pixels and carve
//! valleys out of dark ones.
//!
//! Same seed, same terrain: the permutation table is shuffled with a
//! xorshift stream derived only from the seed.

/// Seed for the terrain noise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoiseSeed(u64);

impl NoiseSeed {
    /// Wraps a raw seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl Default for NoiseSeed {
    fn default() -> Self {
        Self(0x0F4A_3E00_5EED_0001)
    }
}

/// Corner gradients of the 2D simplex lattice.
const GRADIENTS: [[i8; 2]; 12] = [
    [1, 0],
    [1, 1],
    [0, 1],
    [-1, 1],
    [-1, 0],
    [-1, -1],
    [0, -1],
    [1, -1],
    [1, 0],
    [0, 1],
    [-1, 0],
    [0, -1],
];

/// Skew factor, `(sqrt(3) - 1) / 2`.
const F2: f64 = 0.366_025_403_784_439;
/// Unskew factor, `(3 - sqrt(3)) / 6`.
const G2: f64 = 0.211_324_865_405_187;

/// Seeded 2D simplex noise.
///
/// # Example
///
/// ```rust,ignore
/// let noise = TerrainNoise::new(NoiseSeed::new(42));
/// let bump = noise.sample_unit(x * 0.033, y * 0.033); // [0, 1]
/// ```
pub struct TerrainNoise {
    /// 256 shuffled entries, repeated once to skip index wrapping.
    perm: [u8; 512],
}

impl TerrainNoise {
    /// Builds the permutation table for `seed`.
    #[must_use]
    pub fn new(seed: NoiseSeed) -> Self {
        let mut perm = [0u8; 512];
        for (slot, value) in perm.iter_mut().zip(0..=255u8) {
            *slot = value;
        }

        // Fisher-Yates with xorshift64; a zero state would never move
        let mut state = seed.value() | 1;
        for i in (1..256usize).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let j = (state % (i as u64 + 1)) as usize;
            perm.swap(i, j);
        }

        let (low, high) = perm.split_at_mut(256);
        high.copy_from_slice(low);

        Self { perm }
    }

    #[inline]
    fn hash(&self, index: usize) -> usize {
        usize::from(self.perm[index & 511])
    }

    /// Samples noise at `(x, y)`. Output lies in `[-1, 1]`.
    #[must_use]
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let skew = (x + y) * F2;
        let i = (x + skew).floor();
        let j = (y + skew).floor();

        let unskew = (i + j) * G2;
        let x0 = x - (i - unskew);
        let y0 = y - (j - unskew);

        // Lower or upper triangle of the skewed cell
        let (i1, j1) = if x0 > y0 { (1, 0) } else { (0, 1) };

        let x1 = x0 - f64::from(i1) + G2;
        let y1 = y0 - f64::from(j1) + G2;
        let x2 = x0 - 1.0 + 2.0 * G2;
        let y2 = y0 - 1.0 + 2.0 * G2;

        let ii = (i as i64 & 255) as usize;
        let jj = (j as i64 & 255) as usize;
        let i1 = i1 as usize;
        let j1 = j1 as usize;

        let g0 = self.hash(ii + self.hash(jj));
        let g1 = self.hash(ii + i1 + self.hash(jj + j1));
        let g2 = self.hash(ii + 1 + self.hash(jj + 1));

        70.0 * (corner(x0, y0, g0) + corner(x1, y1, g1) + corner(x2, y2, g2))
    }

    /// Samples noise at `(x, y)` mapped to `[0, 1]`.
    #[must_use]
    pub fn sample_unit(&self, x: f32, y: f32) -> f32 {
        let value = (self.sample(f64::from(x), f64::from(y)) + 1.0) * 0.5;
        value.clamp(0.0, 1.0) as f32
    }
}

/// Contribution of one simplex corner.
#[inline]
fn corner(x: f64, y: f64, hash: usize) -> f64 {
    let t = 0.5 - x * x - y * y;
    if t < 0.0 {
        return 0.0;
    }
    let [gx, gy] = GRADIENTS[hash % 12];
    let t2 = t * t;
    t2 * t2 * (x * f64::from(gx) + y * f64::from(gy))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_terrain() {
        let a = TerrainNoise::new(NoiseSeed::new(7));
        let b = TerrainNoise::new(NoiseSeed::new(7));
        for i in 0..200 {
            let x = f64::from(i) * 0.37;
            let y = f64::from(i) * 0.11;
            assert_eq!(a.sample(x, y), b.sample(x, y));
        }
    }

    #[test]
    fn test_seeds_differ() {
        let a = TerrainNoise::new(NoiseSeed::new(1));
        let b = TerrainNoise::new(NoiseSeed::new(2));
        let differs = (0..50).any(|i| {
            let p = f64::from(i) * 1.3 + 0.5;
            a.sample(p, p * 0.7) != b.sample(p, p * 0.7)
        });
        assert!(differs);
    }

    #[test]
    fn test_ranges() {
        let noise = TerrainNoise::new(NoiseSeed::default());
        for i in 0..20_000 {
            let x = f64::from(i) * 0.071 - 700.0;
            let y = f64::from(i) * 0.053 - 500.0;
            let raw = noise.sample(x, y);
            assert!((-1.0..=1.0).contains(&raw), "raw {raw} at ({x}, {y})");

            #[allow(clippy::cast_possible_truncation)]
            let unit = noise.sample_unit(x as f32, y as f32);
            assert!((0.0..=1.0).contains(&unit));
        }
    }

    #[test]
    fn test_smooth() {
        let noise = TerrainNoise::new(NoiseSeed::new(42));
        let v = noise.sample(12.5, 40.25);
        let dx = noise.sample(12.501, 40.25);
        let dy = noise.sample(12.5, 40.251);
        assert!((v - dx).abs() < 0.01);
        assert!((v - dy).abs() < 0.01);
    }
}
