// eval/curves.rs - Built-in curve resource
//
// A curve is a set of control points baked into a dense, x-sorted sample
// table, either by straight lines or by a Catmull-Rom spline with 32
// segments per span. Sampling clamps the input to the control point domain
// and linearly interpolates the table. Because every sample lies between
// two table entries, the table min/max is an exact global bound, and a scan
// over the entries covering an input range gives a tight local bound.

use crate::eval::interval::Interval;
use crate::eval::resources::CurveSource;

/// Catmull-Rom samples per span between two control points.
pub const CATMULL_ROM_SEGMENTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveInterpolation {
    Linear,
    CatmullRom,
}

#[derive(Debug, Clone)]
pub struct Curve {
    points: Vec<CurvePoint>,
    interpolation: CurveInterpolation,
    baked: Vec<CurvePoint>,
    range: Interval,
}

// ── Construction ────────────────────────────────────────────────────

/// Sort by x and drop non-finite points.
fn normalize_points(points: &[(f64, f64)]) -> Vec<CurvePoint> {
    let mut pts: Vec<CurvePoint> = points
        .iter()
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|&(x, y)| CurvePoint { x, y })
        .collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x));
    pts
}

/// One coordinate of a uniform Catmull-Rom segment at `t` in [0, 1).
#[inline]
fn spline_basis(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let linear = p2 - p0;
    let quadratic = 2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3;
    let cubic = 3.0 * (p1 - p2) + p3 - p0;
    0.5 * (2.0 * p1 + t * (linear + t * (quadratic + t * cubic)))
}

/// Sample the spline through sorted control points: `segments` samples per
/// span, then the last point. End spans reuse their outer point as the
/// missing neighbour.
pub fn bake_catmull_rom(points: &[CurvePoint], segments: usize) -> Vec<CurvePoint> {
    if points.len() < 2 {
        return points.to_vec();
    }
    let last = points.len() - 1;
    let at = |i: usize, shift: isize| points[(i as isize + shift).clamp(0, last as isize) as usize];

    let mut baked = Vec::with_capacity(last * segments + 1);
    for span in 0..last {
        let (p0, p1, p2, p3) = (at(span, -1), at(span, 0), at(span, 1), at(span, 2));
        baked.extend((0..segments).map(|step| {
            let t = step as f64 / segments as f64;
            CurvePoint {
                x: spline_basis(p0.x, p1.x, p2.x, p3.x, t),
                y: spline_basis(p0.y, p1.y, p2.y, p3.y, t),
            }
        }));
    }
    baked.push(points[last]);
    baked
}

impl Curve {
    pub fn new(points: &[(f64, f64)], interpolation: CurveInterpolation) -> Self {
        let points = normalize_points(points);
        let mut baked = match interpolation {
            CurveInterpolation::Linear => points.clone(),
            CurveInterpolation::CatmullRom => bake_catmull_rom(&points, CATMULL_ROM_SEGMENTS),
        };
        // Unevenly spaced control points can make the spline double back in x
        baked.retain(|p| p.x.is_finite() && p.y.is_finite());
        baked.sort_by(|a, b| a.x.total_cmp(&b.x));

        let range = if baked.is_empty() {
            Interval::ZERO
        } else {
            let lo = baked.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
            let hi = baked.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
            Interval::new(lo, hi)
        };

        Curve {
            points,
            interpolation,
            baked,
            range,
        }
    }

    pub fn linear(points: &[(f64, f64)]) -> Self {
        Self::new(points, CurveInterpolation::Linear)
    }

    pub fn catmull_rom(points: &[(f64, f64)]) -> Self {
        Self::new(points, CurveInterpolation::CatmullRom)
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn interpolation(&self) -> CurveInterpolation {
        self.interpolation
    }

    /// Clamp `x` into the baked domain. NaN maps to the lower end.
    #[inline]
    fn clamp_to_domain(&self, x: f64) -> f64 {
        let first = self.baked[0].x;
        let last = self.baked[self.baked.len() - 1].x;
        x.max(first).min(last)
    }
}

impl CurveSource for Curve {
    fn sample(&self, x: f64) -> f64 {
        if self.baked.is_empty() {
            return 0.0;
        }
        let x = self.clamp_to_domain(x);
        let i = self.baked.partition_point(|p| p.x <= x);
        if i >= self.baked.len() {
            return self.baked[self.baked.len() - 1].y;
        }
        let p0 = self.baked[i - 1];
        let p1 = self.baked[i];
        let dx = p1.x - p0.x;
        let t = if dx == 0.0 { 0.0 } else { (x - p0.x) / dx };
        let y = p0.y + (p1.y - p0.y) * t;
        y.max(p0.y.min(p1.y)).min(p0.y.max(p1.y))
    }

    fn range(&self) -> Interval {
        self.range
    }

    fn range_over(&self, input: Interval) -> Interval {
        if self.baked.is_empty() {
            return Interval::ZERO;
        }
        let lo = self.clamp_to_domain(input.lo);
        let hi = self.clamp_to_domain(input.hi);
        let first = self.baked.partition_point(|p| p.x <= lo).saturating_sub(1);
        let last = self
            .baked
            .partition_point(|p| p.x <= hi)
            .min(self.baked.len() - 1);

        let span = &self.baked[first..=last.max(first)];
        let min = span.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max = span.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        Interval::new(min, max)
    }
}
