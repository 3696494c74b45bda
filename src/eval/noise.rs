// eval/noise.rs - Built-in seeded simplex noise resource
//
// Classic 2D/3D simplex noise over a Fisher-Yates shuffled permutation
// table, summed over fractal octaves. Each octave is clamped to [-1, 1]
// before weighting and the sum is clamped to the total weight, so the
// resource can report an exact symmetric bound to interval analysis.

use crate::eval::interval::Interval;
use crate::eval::resources::NoiseSource;

// ── Gradients ───────────────────────────────────────────────────────

/// Axis and diagonal directions for 2D lattice corners (unnormalized).
const GRAD2: [[f64; 2]; 8] = [
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [-1.0, -1.0],
];

/// Cube edge midpoints for 3D lattice corners.
const GRAD3: [[f64; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

pub const MAX_OCTAVES: u32 = 16;

// ── PRNG ────────────────────────────────────────────────────────────

/// Small deterministic 32-bit PRNG (Mulberry32). Seeds the permutation
/// table; also handy wherever reproducible pseudo-random input is needed.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: i32) -> Self {
        Mulberry32 { state: seed as u32 }
    }

    /// Next value in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6d2b_79f5);
        let s = self.state;
        let mut t = (s ^ (s >> 15)).wrapping_mul(s | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        f64::from(t ^ (t >> 14)) / 4_294_967_296.0
    }

    /// Next value in [lo, hi).
    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Next index in [0, n). `n` must be non-zero.
    pub fn index(&mut self, n: usize) -> usize {
        ((self.next_f64() * n as f64) as usize).min(n - 1)
    }
}

// ── Lattice hashing ─────────────────────────────────────────────────

/// Shuffled `0..=255`, stored twice so corner lookups never wrap.
pub fn build_perm_table(seed: i32) -> [u8; 512] {
    let mut rng = Mulberry32::new(seed);
    let mut shuffled: [u8; 256] = std::array::from_fn(|i| i as u8);
    for hi in (1..256usize).rev() {
        let pick = (rng.next_f64() * (hi + 1) as f64).floor() as usize;
        shuffled.swap(hi, pick);
    }

    let mut perm = [0u8; 512];
    perm[..256].copy_from_slice(&shuffled);
    perm[256..].copy_from_slice(&shuffled);
    perm
}

/// Hash the lattice corner `cell + offset`, innermost axis last.
#[inline]
fn corner_hash(perm: &[u8; 512], cell: &[usize], offset: &[usize]) -> usize {
    cell.iter()
        .zip(offset)
        .rev()
        .fold(0usize, |h, (c, o)| perm[c + o + h] as usize)
}

/// Radial falloff `max(0, r - |d|²)^4` times the gradient dot product.
#[inline]
fn falloff(radius: f64, d: &[f64], grad: &[f64]) -> f64 {
    let t = d.iter().fold(radius, |acc, v| acc - v * v);
    if t < 0.0 {
        return 0.0;
    }
    let dot: f64 = d.iter().zip(grad).map(|(a, b)| a * b).sum();
    let t2 = t * t;
    t2 * t2 * dot
}

// ── Simplex kernels ─────────────────────────────────────────────────

const SKEW_2D: f64 = 0.366_025_403_784_438_6; // (sqrt(3) - 1) / 2
const UNSKEW_2D: f64 = 0.211_324_865_405_187_1; // (3 - sqrt(3)) / 6
const SKEW_3D: f64 = 1.0 / 3.0;
const UNSKEW_3D: f64 = 1.0 / 6.0;

/// 2D simplex noise, approximately in [-1, 1]. Non-finite input gives 0.
pub fn simplex_2d(perm: &[u8; 512], x: f64, y: f64) -> f64 {
    if !(x.is_finite() && y.is_finite()) {
        return 0.0;
    }
    let skew = (x + y) * SKEW_2D;
    let cell = [(x + skew).floor() as i64, (y + skew).floor() as i64];
    let unskew = cell[0].wrapping_add(cell[1]) as f64 * UNSKEW_2D;
    let origin = [x - (cell[0] as f64 - unskew), y - (cell[1] as f64 - unskew)];

    let middle: [usize; 2] = if origin[0] > origin[1] { [1, 0] } else { [0, 1] };
    let lattice = cell.map(|c| (c & 255) as usize);

    let mut total = 0.0;
    for (k, offset) in [[0, 0], middle, [1, 1]].iter().enumerate() {
        let shift = k as f64 * UNSKEW_2D;
        let d = [
            origin[0] - offset[0] as f64 + shift,
            origin[1] - offset[1] as f64 + shift,
        ];
        let g = corner_hash(perm, &lattice, offset) % GRAD2.len();
        total += falloff(0.5, &d, &GRAD2[g]);
    }
    70.0 * total
}

/// 3D simplex noise, approximately in [-1, 1]. Non-finite input gives 0.
pub fn simplex_3d(perm: &[u8; 512], x: f64, y: f64, z: f64) -> f64 {
    if !(x.is_finite() && y.is_finite() && z.is_finite()) {
        return 0.0;
    }
    let skew = (x + y + z) * SKEW_3D;
    let cell = [
        (x + skew).floor() as i64,
        (y + skew).floor() as i64,
        (z + skew).floor() as i64,
    ];
    let unskew = cell[0].wrapping_add(cell[1]).wrapping_add(cell[2]) as f64 * UNSKEW_3D;
    let o = [
        x - (cell[0] as f64 - unskew),
        y - (cell[1] as f64 - unskew),
        z - (cell[2] as f64 - unskew),
    ];

    // second and third corners of the simplex containing the point
    let (second, third): ([usize; 3], [usize; 3]) = match (o[0] >= o[1], o[1] >= o[2], o[0] >= o[2]) {
        (true, true, _) => ([1, 0, 0], [1, 1, 0]),
        (true, false, true) => ([1, 0, 0], [1, 0, 1]),
        (true, false, false) => ([0, 0, 1], [1, 0, 1]),
        (false, false, _) => ([0, 0, 1], [0, 1, 1]),
        (false, true, false) => ([0, 1, 0], [0, 1, 1]),
        (false, true, true) => ([0, 1, 0], [1, 1, 0]),
    };
    let lattice = cell.map(|c| (c & 255) as usize);

    let mut total = 0.0;
    for (k, offset) in [[0, 0, 0], second, third, [1, 1, 1]].iter().enumerate() {
        let shift = k as f64 * UNSKEW_3D;
        let d = [
            o[0] - offset[0] as f64 + shift,
            o[1] - offset[1] as f64 + shift,
            o[2] - offset[2] as f64 + shift,
        ];
        let g = corner_hash(perm, &lattice, offset) % GRAD3.len();
        total += falloff(0.6, &d, &GRAD3[g]);
    }
    32.0 * total
}

/// Clamp to [-1, 1]. NaN maps to -1.
#[inline]
fn unit(v: f64) -> f64 {
    v.max(-1.0).min(1.0)
}

// ── Fractal noise resource ──────────────────────────────────────────

/// Seeded fractal simplex noise.
#[derive(Debug, Clone)]
pub struct SimplexNoise {
    seed: i32,
    perm: [u8; 512],
    frequency: f64,
    octaves: u32,
    lacunarity: f64,
    gain: f64,
    /// Sum of absolute octave weights.
    amplitude: f64,
}

impl SimplexNoise {
    pub fn new(seed: i32) -> Self {
        let mut noise = SimplexNoise {
            seed,
            perm: build_perm_table(seed),
            frequency: 0.01,
            octaves: 4,
            lacunarity: 2.0,
            gain: 0.5,
            amplitude: 0.0,
        };
        noise.update_amplitude();
        noise
    }

    pub fn with_frequency(mut self, frequency: f64) -> Self {
        if frequency.is_finite() {
            self.frequency = frequency;
        }
        self
    }

    /// Octave count, clamped to `1..=MAX_OCTAVES`.
    pub fn with_octaves(mut self, octaves: u32) -> Self {
        self.octaves = octaves.clamp(1, MAX_OCTAVES);
        self.update_amplitude();
        self
    }

    pub fn with_lacunarity(mut self, lacunarity: f64) -> Self {
        if lacunarity.is_finite() {
            self.lacunarity = lacunarity;
        }
        self
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        if gain.is_finite() {
            self.gain = gain;
            self.update_amplitude();
        }
        self
    }

    fn update_amplitude(&mut self) {
        let mut amp = 1.0_f64;
        let mut total = 0.0;
        for _ in 0..self.octaves {
            total += amp.abs();
            amp *= self.gain;
        }
        self.amplitude = total;
    }

    pub fn seed(&self) -> i32 {
        self.seed
    }

    pub fn octaves(&self) -> u32 {
        self.octaves
    }

    #[inline]
    fn finish(&self, sum: f64) -> f64 {
        sum.max(-self.amplitude).min(self.amplitude)
    }
}

impl NoiseSource for SimplexNoise {
    fn sample_2d(&self, x: f64, y: f64) -> f64 {
        let mut sum = 0.0;
        let mut amp = 1.0;
        let mut f = self.frequency;
        for _ in 0..self.octaves {
            sum += unit(simplex_2d(&self.perm, x * f, y * f)) * amp;
            f *= self.lacunarity;
            amp *= self.gain;
        }
        self.finish(sum)
    }

    fn sample_3d(&self, x: f64, y: f64, z: f64) -> f64 {
        let mut sum = 0.0;
        let mut amp = 1.0;
        let mut f = self.frequency;
        for _ in 0..self.octaves {
            sum += unit(simplex_3d(&self.perm, x * f, y * f, z * f)) * amp;
            f *= self.lacunarity;
            amp *= self.gain;
        }
        self.finish(sum)
    }

    fn range(&self) -> Interval {
        Interval::new(-self.amplitude, self.amplitude)
    }
}
