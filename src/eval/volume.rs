// eval/volume.rs - Block generation with interval shortcuts and rayon
//
// Fills one block of voxels from a compiled program:
//
//   1. bounds alone decide the block     → uniform fill from the bounds
//   2. interval analysis over the block  → uniform fill when the scaled
//      bound is entirely outside, entirely inside, or a single value
//   3. otherwise evaluate every voxel, Y slices in parallel with rayon,
//      one `EvalState` per worker
//   4. per-voxel bounds override for blocks straddling the bounds
//
// Layout is Y-major: `index = (y * size_z + z) * size_x + x`.

use crate::eval::bounds::Bounds;
use crate::eval::compiled::Program;
use crate::eval::interval::{Aabb, Interval};
use crate::eval::nodes::EvalState;
use crate::schema::GeneratorSettings;
use log::{debug, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Largest level of detail; keeps the voxel step within `i32`.
pub const MAX_LOD: u8 = 30;

/// A block of voxels to generate. Voxel `(x, y, z)` sits at
/// `origin + (x, y, z) * (1 << lod)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRequest {
    pub origin: [i32; 3],
    pub size: [u32; 3],
    pub lod: u8,
}

impl BlockRequest {
    /// Levels of detail above `MAX_LOD` are generated at `MAX_LOD`; the
    /// generator refuses them outright.
    pub fn new(origin: [i32; 3], size: [u32; 3], lod: u8) -> Self {
        if lod > MAX_LOD {
            warn!("block at {origin:?} requests lod {lod}, generated at lod {MAX_LOD}");
        }
        BlockRequest { origin, size, lod }
    }

    /// A cube of `size` voxels at full detail.
    pub fn cube(origin: [i32; 3], size: u32) -> Self {
        Self::new(origin, [size; 3], 0)
    }

    #[inline]
    pub fn step(&self) -> i64 {
        1i64 << self.lod.min(MAX_LOD)
    }

    pub fn voxel_count(&self) -> usize {
        self.size.iter().map(|&s| s as usize).product()
    }

    /// World position of a voxel, saturated to the `i32` range.
    #[inline]
    pub fn voxel_position(&self, x: u32, y: u32, z: u32) -> [i32; 3] {
        let step = self.step();
        let at = |axis: usize, i: u32| {
            (self.origin[axis] as i64 + i as i64 * step).clamp(i32::MIN as i64, i32::MAX as i64) as i32
        };
        [at(0, x), at(1, y), at(2, z)]
    }

    /// Inclusive corners of the voxel positions. Only meaningful for a
    /// non-empty block.
    pub fn corners(&self) -> ([i32; 3], [i32; 3]) {
        let last = |s: u32| s.saturating_sub(1);
        (
            self.voxel_position(0, 0, 0),
            self.voxel_position(last(self.size[0]), last(self.size[1]), last(self.size[2])),
        )
    }

    pub fn aabb(&self) -> Aabb {
        let (min, max) = self.corners();
        Aabb::new(
            [min[0] as f64, min[1] as f64, min[2] as f64],
            [max[0] as f64, max[1] as f64, max[2] as f64],
        )
    }
}

// ── Block buffer ────────────────────────────────────────────────────

/// One channel of a block: a single value for every voxel, or one value
/// per voxel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ChannelData<T> {
    Uniform(T),
    Dense(Vec<T>),
}

impl<T: Copy + PartialEq> ChannelData<T> {
    #[inline]
    pub fn get(&self, index: usize) -> T {
        match self {
            ChannelData::Uniform(v) => *v,
            ChannelData::Dense(values) => values[index],
        }
    }

    pub fn is_uniform(&self) -> bool {
        matches!(self, ChannelData::Uniform(_))
    }

    pub fn uniform_value(&self) -> Option<T> {
        match self {
            ChannelData::Uniform(v) => Some(*v),
            ChannelData::Dense(_) => None,
        }
    }

    /// Write one voxel, expanding a uniform channel of `len` voxels when
    /// the value differs.
    fn set(&mut self, index: usize, value: T, len: usize) {
        if let ChannelData::Uniform(u) = *self {
            if u == value {
                return;
            }
            *self = ChannelData::Dense(vec![u; len]);
        }
        if let ChannelData::Dense(values) = self {
            values[index] = value;
        }
    }
}

/// Generated SDF and voxel type channels for one block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockBuffer {
    pub size: [u32; 3],
    pub sdf: ChannelData<f32>,
    pub types: ChannelData<u64>,
}

impl BlockBuffer {
    pub fn uniform(size: [u32; 3], sdf: f32, voxel_type: u64) -> Self {
        BlockBuffer {
            size,
            sdf: ChannelData::Uniform(sdf),
            types: ChannelData::Uniform(voxel_type),
        }
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        (y as usize * self.size[2] as usize + z as usize) * self.size[0] as usize + x as usize
    }

    pub fn len(&self) -> usize {
        self.size.iter().map(|&s| s as usize).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sdf_at(&self, x: u32, y: u32, z: u32) -> f32 {
        self.sdf.get(self.index(x, y, z))
    }

    pub fn type_at(&self, x: u32, y: u32, z: u32) -> u64 {
        self.types.get(self.index(x, y, z))
    }
}

// ── Generation ──────────────────────────────────────────────────────

/// Decide a uniform fill from the scaled output bound, if possible.
/// Thresholds that fail settings validation never take a shortcut.
fn classify(range: Interval, clip_threshold: f64) -> Option<f32> {
    if !(clip_threshold.is_finite() && clip_threshold >= 0.0) {
        return None;
    }
    if range.lo > clip_threshold {
        Some(clip_threshold as f32)
    } else if range.hi < -clip_threshold {
        Some(-clip_threshold as f32)
    } else if range.is_single_value() {
        Some(range.lo as f32)
    } else {
        None
    }
}

/// Generate one block.
pub fn generate_block(program: &Program, settings: &GeneratorSettings, request: &BlockRequest) -> BlockBuffer {
    if request.lod > MAX_LOD {
        warn!("block at {:?} requests lod {}, generated at lod {MAX_LOD}", request.origin, request.lod);
    }
    let bounds = &settings.bounds;
    let len = request.voxel_count();
    if len == 0 {
        return BlockBuffer::uniform(request.size, settings.clip_threshold as f32, 0);
    }

    let (min, max) = request.corners();
    if let Some(o) = bounds.region_override(min, max) {
        debug!("block {:?} lies entirely outside bounds", request.origin);
        return BlockBuffer::uniform(request.size, o.sdf, o.voxel_type);
    }

    let range = program.analyze(&request.aabb()) * settings.iso_scale;
    let mut buffer = match classify(range, settings.clip_threshold) {
        Some(sdf) => {
            debug!(
                "block {:?} filled uniformly with {sdf} (bound [{}, {}])",
                request.origin, range.lo, range.hi
            );
            BlockBuffer::uniform(request.size, sdf, 0)
        }
        None => {
            trace!(
                "block {:?} needs per-voxel evaluation (bound [{}, {}])",
                request.origin,
                range.lo,
                range.hi
            );
            BlockBuffer {
                size: request.size,
                sdf: ChannelData::Dense(evaluate_voxels(program, settings.iso_scale, request)),
                types: ChannelData::Uniform(0),
            }
        }
    };

    if !bounds.region_inside(min, max) {
        apply_bounds(&mut buffer, bounds, request);
    }
    buffer
}

/// Evaluate every voxel of the block. Y slices run in parallel.
fn evaluate_voxels(program: &Program, iso_scale: f64, request: &BlockRequest) -> Vec<f32> {
    let [sx, sy, sz] = request.size;
    let slice_len = sx as usize * sz as usize;

    let slices: Vec<Vec<f32>> = (0..sy)
        .into_par_iter()
        .map_init(
            || (EvalState::new(), Vec::<[f64; 3]>::new(), Vec::<f64>::new()),
            |(state, positions, values), y| {
                positions.clear();
                for z in 0..sz {
                    for x in 0..sx {
                        let p = request.voxel_position(x, y, z);
                        positions.push([p[0] as f64, p[1] as f64, p[2] as f64]);
                    }
                }
                values.clear();
                values.resize(slice_len, 0.0);
                program.run_with(positions, values, state);
                values.iter().map(|&v| (v * iso_scale) as f32).collect()
            },
        )
        .collect();

    let mut sdf = Vec::with_capacity(slice_len * sy as usize);
    for slice in slices {
        sdf.extend(slice);
    }
    sdf
}

fn apply_bounds(buffer: &mut BlockBuffer, bounds: &Bounds, request: &BlockRequest) {
    let len = buffer.len();
    let [sx, sy, sz] = request.size;
    for y in 0..sy {
        for z in 0..sz {
            for x in 0..sx {
                if let Some(o) = bounds.override_at(request.voxel_position(x, y, z)) {
                    let i = buffer.index(x, y, z);
                    buffer.sdf.set(i, o.sdf, len);
                    buffer.types.set(i, o.voxel_type, len);
                }
            }
        }
    }
}

/// Scaled SDF at one voxel position, with bounds applied.
pub fn generate_single(program: &Program, settings: &GeneratorSettings, position: [i32; 3]) -> f64 {
    if let Some(o) = settings.bounds.override_at(position) {
        return o.sdf as f64;
    }
    let p = [position[0] as f64, position[1] as f64, position[2] as f64];
    program.evaluate_point(p) * settings.iso_scale
}
