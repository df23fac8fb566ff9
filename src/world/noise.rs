//! Seeded gradient noise for terrain synthesis.
//!
//! Every noise field used by the generator is an independently seeded
//! instance of this type, so the whole pipeline is a pure function of
//! the world seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// Unit gradients; the hashed corner picks one by its low three bits.
const GRADIENTS: [[f64; 2]; 8] = [
    [1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [-1.0, -1.0],
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
];

/// 2D gradient noise with a seeded permutation table.
pub struct PerlinNoise {
    // 256-entry permutation duplicated to 512 so corner hashing never wraps.
    perm: [usize; 512],
}

impl PerlinNoise {
    pub fn new(seed: i64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed as u64);

        let mut permutation: [usize; 256] = std::array::from_fn(|i| i);
        // Fisher-Yates shuffle driven by the seeded generator.
        for i in (1..256).rev() {
            let j = rng.gen_range(0..=i);
            permutation.swap(i, j);
        }

        let perm = std::array::from_fn(|i| permutation[i & 255]);
        Self { perm }
    }

    // Quintic fade: 6t^5 - 15t^4 + 10t^3.
    fn fade(t: f64) -> f64 {
        t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
    }

    fn lerp(t: f64, a: f64, b: f64) -> f64 {
        a + t * (b - a)
    }

    fn grad(hash: usize, x: f64, y: f64) -> f64 {
        let g = GRADIENTS[hash & 7];
        g[0] * x + g[1] * y
    }

    /// Single-point evaluation, returns a value in [-1, 1].
    pub fn noise(&self, x: f64, y: f64) -> f64 {
        let xi = (x.floor() as i64 & 255) as usize;
        let yi = (y.floor() as i64 & 255) as usize;

        let x = x - x.floor();
        let y = y - y.floor();

        let u = Self::fade(x);
        let v = Self::fade(y);

        let a = self.perm[xi] + yi;
        let aa = self.perm[a];
        let ab = self.perm[a + 1];
        let b = self.perm[xi + 1] + yi;
        let ba = self.perm[b];
        let bb = self.perm[b + 1];

        Self::lerp(
            v,
            Self::lerp(
                u,
                Self::grad(self.perm[aa], x, y),
                Self::grad(self.perm[ba], x - 1.0, y),
            ),
            Self::lerp(
                u,
                Self::grad(self.perm[ab], x, y - 1.0),
                Self::grad(self.perm[bb], x - 1.0, y - 1.0),
            ),
        )
    }

    /// Fractal octave sum, normalized to [0, 1].
    ///
    /// Frequency doubles and amplitude is multiplied by `persistence`
    /// each octave; the total is divided by the sum of amplitudes.
    pub fn octave(&self, x: f64, y: f64, octaves: u32, persistence: f64, scale: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = scale;
        let mut amplitude = 1.0;
        let mut max_value = 0.0;

        for _ in 0..octaves {
            total += self.noise(x * frequency, y * frequency) * amplitude;
            max_value += amplitude;
            amplitude *= persistence;
            frequency *= 2.0;
        }

        (total / max_value + 1.0) / 2.0
    }
}
