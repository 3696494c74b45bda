// eval/interval.rs - Interval arithmetic over compiled programs
//
// Runs a compiled program once in "interval mode" over an axis-aligned box
// instead of once per voxel. The result is a conservative range [lo, hi]
// that contains every value the program can produce inside the box:
//
//   - `lo > threshold`  → the whole box is outside the surface
//   - `hi < -threshold` → the whole box is inside the surface
//   - otherwise         → the surface may cross the box, evaluate per voxel
//
// Every transfer function may over-approximate but never under-approximate.
// Non-finite inputs collapse to `Interval::EVERYTHING` rather than NaN.
//
// The scalar path can only produce NaN after some intermediate overflowed
// to infinity, and nodes such as `clamp` and `sqrt` turn that NaN back into
// a finite value. So as soon as any bound stops being finite the analyzer
// answers `EVERYTHING` for the whole program.

use crate::eval::compiled::{Op, Operand, Program};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::f64::consts::{FRAC_PI_2, TAU};
use std::ops::{Add, Mul, Neg, Sub};

/// Magnitude up to which `sin` searches for interior peaks.
const SIN_PRECISE_LIMIT: f64 = 1e9;

/// A closed range of possible values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    /// The whole real line. Used when nothing is known about a value.
    pub const EVERYTHING: Self = Self {
        lo: f64::NEG_INFINITY,
        hi: f64::INFINITY,
    };

    pub const ZERO: Self = Self { lo: 0.0, hi: 0.0 };

    /// Build an interval, ordering the bounds. A NaN bound widens to
    /// `EVERYTHING` so a bad intermediate never produces a false shortcut.
    #[inline]
    pub fn new(a: f64, b: f64) -> Self {
        if a.is_nan() || b.is_nan() {
            return Self::EVERYTHING;
        }
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    #[inline]
    pub fn point(v: f64) -> Self {
        Self::new(v, v)
    }

    #[inline]
    pub fn contains(self, v: f64) -> bool {
        v >= self.lo && v <= self.hi
    }

    #[inline]
    pub fn is_single_value(self) -> bool {
        self.lo == self.hi
    }

    /// Both bounds finite. Values inside such a range can never be NaN.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.lo.is_finite() && self.hi.is_finite()
    }

    #[inline]
    pub fn width(self) -> f64 {
        self.hi - self.lo
    }

    /// Smallest interval containing both.
    #[inline]
    pub fn union(self, other: Self) -> Self {
        Self::new(self.lo.min(other.lo), self.hi.max(other.hi))
    }

    pub fn abs(self) -> Self {
        if self.lo >= 0.0 {
            self
        } else if self.hi <= 0.0 {
            Self::new(-self.hi, -self.lo)
        } else {
            Self::new(0.0, self.hi.max(-self.lo))
        }
    }

    /// Square root with the negative part of the domain clamped to zero,
    /// matching the scalar `sqrt` node.
    pub fn sqrt(self) -> Self {
        Self::new(self.lo.max(0.0).sqrt(), self.hi.max(0.0).sqrt())
    }

    pub fn sqr(self) -> Self {
        if self.lo >= 0.0 {
            Self::new(self.lo * self.lo, self.hi * self.hi)
        } else if self.hi <= 0.0 {
            Self::new(self.hi * self.hi, self.lo * self.lo)
        } else {
            Self::new(0.0, (self.lo * self.lo).max(self.hi * self.hi))
        }
    }

    pub fn floor(self) -> Self {
        Self::new(self.lo.floor(), self.hi.floor())
    }

    /// Sine bound: endpoints plus any peak or trough inside the range.
    pub fn sin(self) -> Self {
        // `!(w < TAU)` also catches infinite and NaN widths. Far from zero
        // the peak positions below can no longer be located precisely.
        if !(self.width() < TAU) || self.lo.abs().max(self.hi.abs()) > SIN_PRECISE_LIMIT {
            return Self::new(-1.0, 1.0);
        }
        let a = self.lo.sin();
        let b = self.hi.sin();
        let mut lo = a.min(b);
        let mut hi = a.max(b);

        let k = ((self.lo - FRAC_PI_2) / TAU).ceil();
        if FRAC_PI_2 + k * TAU <= self.hi {
            hi = 1.0;
        }
        let k = ((self.lo + FRAC_PI_2) / TAU).ceil();
        if -FRAC_PI_2 + k * TAU <= self.hi {
            lo = -1.0;
        }
        Self::new(lo, hi)
    }

    /// Clamp each bound into `[min, max]` independently. Uses the same
    /// `max(min).min(max)` order as the scalar node, so an inverted pair
    /// behaves identically in both modes.
    pub fn clamp(self, min: f64, max: f64) -> Self {
        Self::new(self.lo.max(min).min(max), self.hi.max(min).min(max))
    }

    /// Linear interpolation `a + (b - a) * t` in interval arithmetic.
    pub fn mix(a: Self, b: Self, t: Self) -> Self {
        a + (b - a) * t
    }
}

impl Add for Interval {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.lo + rhs.lo, self.hi + rhs.hi)
    }
}

impl Sub for Interval {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.lo - rhs.hi, self.hi - rhs.lo)
    }
}

impl Mul for Interval {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let corners = [
            self.lo * rhs.lo,
            self.lo * rhs.hi,
            self.hi * rhs.lo,
            self.hi * rhs.hi,
        ];
        // `0 * inf` is NaN in the scalar path too, so it must not shrink
        // to zero here. `f64::min` would silently skip it.
        if corners.iter().any(|c| c.is_nan()) {
            return Self::EVERYTHING;
        }
        let lo = corners.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = corners.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self::new(lo, hi)
    }
}

impl Mul<f64> for Interval {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f64) -> Self {
        self * Interval::point(rhs)
    }
}

impl Neg for Interval {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.hi, -self.lo)
    }
}

// ── Axis-aligned box ────────────────────────────────────────────────

/// An axis-aligned region of world space, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    pub fn new(a: [f64; 3], b: [f64; 3]) -> Self {
        Self {
            min: [a[0].min(b[0]), a[1].min(b[1]), a[2].min(b[2])],
            max: [a[0].max(b[0]), a[1].max(b[1]), a[2].max(b[2])],
        }
    }

    /// Interval covered along one axis (0 = X, 1 = Y, 2 = Z).
    #[inline]
    pub fn axis(&self, axis: usize) -> Interval {
        Interval::new(self.min[axis], self.max[axis])
    }

    pub fn contains(&self, p: [f64; 3]) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }
}

// ── Transfer functions ──────────────────────────────────────────────

/// Euclidean distance between two points given as interval coordinates:
/// `coords = [a0, a1, .., b0, b1, ..]`.
fn distance_interval(coords: &[Interval]) -> Interval {
    let dims = coords.len() / 2;
    let mut sum = Interval::ZERO;
    for i in 0..dims {
        sum = sum + (coords[dims + i] - coords[i]).sqr();
    }
    sum.sqrt()
}

/// Interval counterpart of the scalar operation semantics in `nodes.rs`.
pub(crate) fn op_interval(op: &Op, args: &[Interval]) -> Interval {
    match op {
        Op::Output => args[0],
        Op::Add => args[0] + args[1],
        Op::Subtract => args[0] - args[1],
        Op::Multiply => args[0] * args[1],
        Op::Sine => args[0].sin(),
        Op::Floor => args[0].floor(),
        Op::Abs => args[0].abs(),
        Op::Sqrt => args[0].sqrt(),
        Op::Distance2D | Op::Distance3D => distance_interval(args),
        Op::Clamp { min, max } => args[0].clamp(*min, *max),
        Op::Mix => Interval::mix(args[0], args[1], args[2]),
        Op::Remap { min0, scale, min1 } => {
            (args[0] - Interval::point(*min0)) * *scale + Interval::point(*min1)
        }
        Op::Curve(curve) => curve.range_over(args[0]),
        Op::Noise2D(noise) | Op::Noise3D(noise) => noise.range(),
        Op::Image2D(image) => image.range(),
    }
}

impl Program {
    /// Conservative bound of the program output over `region`.
    ///
    /// Each instruction is evaluated once. Scratch storage is local to the
    /// call, so any number of analyses may run concurrently on one program.
    ///
    /// Returns `EVERYTHING` once the region or any intermediate bound is not
    /// finite: past that point the scalar path may hit NaN, and NaN does not
    /// respect any bound downstream.
    pub fn analyze(&self, region: &Aabb) -> Interval {
        let axes = [region.axis(0), region.axis(1), region.axis(2)];
        if !axes.iter().all(|a| a.is_finite()) {
            return Interval::EVERYTHING;
        }

        let instructions = self.instructions();
        let mut slots: Vec<Interval> = Vec::with_capacity(instructions.len());
        let mut args: SmallVec<[Interval; 6]> = SmallVec::new();

        for instruction in instructions {
            args.clear();
            args.extend(instruction.operands.iter().map(|operand| match *operand {
                Operand::Constant(v) => Interval::point(v),
                Operand::Input(axis) => axes[axis as usize],
                Operand::Slot(s) => slots[s as usize],
            }));
            let range = op_interval(&instruction.op, &args);
            if !range.is_finite() {
                return Interval::EVERYTHING;
            }
            slots.push(range);
        }

        slots.last().copied().unwrap_or(Interval::EVERYTHING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::compiled::compile;
    use crate::eval::graph::{NodeId, ProgramGraph};
    use crate::eval::node_types::NodeTypeId;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn new_orders_bounds() {
        let i = Interval::new(3.0, -1.0);
        assert_eq!(i.lo, -1.0);
        assert_eq!(i.hi, 3.0);
    }

    #[test]
    fn nan_widens_to_everything() {
        assert_eq!(Interval::new(f64::NAN, 1.0), Interval::EVERYTHING);
    }

    #[test]
    fn add_sub() {
        let a = Interval::new(1.0, 2.0);
        let b = Interval::new(-3.0, 5.0);
        assert_eq!(a + b, Interval::new(-2.0, 7.0));
        assert_eq!(a - b, Interval::new(-4.0, 5.0));
    }

    #[test]
    fn mul_handles_sign_changes() {
        let a = Interval::new(-2.0, 3.0);
        let b = Interval::new(-4.0, 1.0);
        // corners: 8, -2, -12, 3
        assert_eq!(a * b, Interval::new(-12.0, 8.0));
    }

    #[test]
    fn mul_zero_times_infinity_widens() {
        assert_eq!(Interval::ZERO * Interval::EVERYTHING, Interval::EVERYTHING);
        assert_eq!(Interval::point(f64::INFINITY) * 0.0, Interval::EVERYTHING);
        assert_eq!(
            Interval::point(f64::INFINITY) * Interval::new(0.0, 1.0),
            Interval::EVERYTHING
        );
    }

    #[test]
    fn finiteness() {
        assert!(Interval::new(-1e300, 1e300).is_finite());
        assert!(!Interval::new(0.0, f64::INFINITY).is_finite());
        assert!(!Interval::EVERYTHING.is_finite());
    }

    #[test]
    fn scalar_mul_negative_flips() {
        let r = Interval::new(1.0, 2.0) * -2.0;
        assert_eq!(r, Interval::new(-4.0, -2.0));
    }

    #[test]
    fn abs_cases() {
        assert_eq!(Interval::new(1.0, 2.0).abs(), Interval::new(1.0, 2.0));
        assert_eq!(Interval::new(-3.0, -1.0).abs(), Interval::new(1.0, 3.0));
        assert_eq!(Interval::new(-3.0, 2.0).abs(), Interval::new(0.0, 3.0));
    }

    #[test]
    fn sqrt_clamps_negative_domain() {
        assert_eq!(Interval::new(-4.0, 9.0).sqrt(), Interval::new(0.0, 3.0));
        assert_eq!(Interval::new(-4.0, -1.0).sqrt(), Interval::ZERO);
    }

    #[test]
    fn floor_is_monotonic() {
        assert_eq!(Interval::new(-1.5, 2.7).floor(), Interval::new(-2.0, 2.0));
    }

    #[test]
    fn sin_wide_interval_is_unit() {
        let r = Interval::new(0.0, 7.0).sin();
        assert_eq!(r, Interval::new(-1.0, 1.0));
        assert_eq!(Interval::EVERYTHING.sin(), Interval::new(-1.0, 1.0));
    }

    #[test]
    fn sin_monotonic_piece() {
        let r = Interval::new(0.0, 1.0).sin();
        assert!(approx(r.lo, 0.0));
        assert!(approx(r.hi, 1.0_f64.sin()));
    }

    #[test]
    fn sin_with_interior_peak() {
        let r = Interval::new(1.0, 2.0).sin();
        assert_eq!(r.hi, 1.0);
        assert!(approx(r.lo, 1.0_f64.sin().min(2.0_f64.sin())));
    }

    #[test]
    fn sin_with_interior_trough() {
        let r = Interval::new(4.0, 5.0).sin();
        assert_eq!(r.lo, -1.0);
        assert!(approx(r.hi, 4.0_f64.sin().max(5.0_f64.sin())));
    }

    #[test]
    fn sin_far_from_zero_is_unit() {
        let r = Interval::new(1e15, 1e15 + 2.0).sin();
        assert_eq!(r, Interval::new(-1.0, 1.0));
    }

    #[test]
    fn sin_contains_samples() {
        let ranges = [(-10.0, -9.0), (-0.3, 0.4), (2.5, 6.0), (100.0, 104.0)];
        for (lo, hi) in ranges {
            let r = Interval::new(lo, hi).sin();
            for i in 0..=64 {
                let x = lo + (hi - lo) * i as f64 / 64.0;
                let v = x.sin();
                assert!(v >= r.lo - 1e-12 && v <= r.hi + 1e-12, "sin({x}) = {v} not in {r:?}");
            }
        }
    }

    #[test]
    fn clamp_bounds_independently() {
        assert_eq!(
            Interval::new(-5.0, 0.5).clamp(0.0, 1.0),
            Interval::new(0.0, 0.5)
        );
        assert_eq!(Interval::point(-5.0).clamp(0.0, 1.0), Interval::ZERO);
    }

    #[test]
    fn distance_from_origin_in_unit_box() {
        let b = Interval::new(-1.0, 1.0);
        let zero = Interval::ZERO;
        let d = distance_interval(&[b, b, b, zero, zero, zero]);
        assert_eq!(d.lo, 0.0);
        assert!(approx(d.hi, 3.0_f64.sqrt()));
    }

    #[test]
    fn mix_with_constant_factor() {
        let r = Interval::mix(Interval::point(0.0), Interval::point(10.0), Interval::point(0.25));
        assert_eq!(r, Interval::point(2.5));
    }

    #[test]
    fn aabb_orders_corners() {
        let b = Aabb::new([1.0, -2.0, 3.0], [-1.0, 2.0, 0.0]);
        assert_eq!(b.min, [-1.0, -2.0, 0.0]);
        assert_eq!(b.max, [1.0, 2.0, 3.0]);
        assert_eq!(b.axis(2), Interval::new(0.0, 3.0));
        assert!(b.contains([0.0, 0.0, 1.0]));
        assert!(!b.contains([0.0, 3.0, 1.0]));
    }

    /// `absorb(1e200 * 1e200 * X)`: the constant product overflows, and at
    /// `x = 0` the scalar path computes `inf * 0 = NaN` before `absorb`
    /// turns it back into a finite value.
    fn overflow_graph(absorb: NodeTypeId) -> (ProgramGraph, NodeId) {
        let mut g = ProgramGraph::new();
        let a = g.create_node(NodeTypeId::Constant, [0.0, 0.0]);
        let b = g.create_node(NodeTypeId::Constant, [0.0, 0.0]);
        let big = g.create_node(NodeTypeId::Multiply, [0.0, 0.0]);
        let x = g.create_node(NodeTypeId::InputX, [0.0, 0.0]);
        let scaled = g.create_node(NodeTypeId::Multiply, [0.0, 0.0]);
        let last = g.create_node(absorb, [0.0, 0.0]);
        let out = g.create_node(NodeTypeId::OutputSdf, [0.0, 0.0]);
        g.set_node_param(a, 0, 1e200).unwrap();
        g.set_node_param(b, 0, 1e200).unwrap();
        g.add_connection(a, 0, big, 0).unwrap();
        g.add_connection(b, 0, big, 1).unwrap();
        g.add_connection(big, 0, scaled, 0).unwrap();
        g.add_connection(x, 0, scaled, 1).unwrap();
        g.add_connection(scaled, 0, last, 0).unwrap();
        g.add_connection(last, 0, out, 0).unwrap();
        (g, last)
    }

    #[test]
    fn overflow_into_clamp_stays_sound() {
        let (mut g, clamp) = overflow_graph(NodeTypeId::Clamp);
        g.set_node_param(clamp, 0, -5.0).unwrap();
        g.set_node_param(clamp, 1, -3.0).unwrap();
        let p = compile(&g).unwrap();

        let region = Aabb::new([0.0; 3], [1.0; 3]);
        let range = p.analyze(&region);
        let at_origin = p.evaluate_point([0.0; 3]);
        assert_eq!(at_origin, -5.0);
        assert!(range.contains(at_origin), "{at_origin} escapes {range:?}");
        assert!(range.contains(p.evaluate_point([1.0; 3])));
    }

    #[test]
    fn overflow_into_sqrt_stays_sound() {
        let (g, _) = overflow_graph(NodeTypeId::Sqrt);
        let p = compile(&g).unwrap();
        let range = p.analyze(&Aabb::new([0.0; 3], [1.0; 3]));
        assert_eq!(p.evaluate_point([0.0; 3]), 0.0);
        assert!(range.contains(0.0), "{range:?}");
    }

    #[test]
    fn unbounded_region_gives_up() {
        let mut g = ProgramGraph::new();
        let x = g.create_node(NodeTypeId::InputX, [0.0, 0.0]);
        let sin = g.create_node(NodeTypeId::Sine, [0.0, 0.0]);
        let out = g.create_node(NodeTypeId::OutputSdf, [0.0, 0.0]);
        g.add_connection(x, 0, sin, 0).unwrap();
        g.add_connection(sin, 0, out, 0).unwrap();
        let p = compile(&g).unwrap();

        let bounded = p.analyze(&Aabb::new([0.0; 3], [1.0; 3]));
        assert!(bounded.is_finite());
        // sin(inf) is NaN, so an infinite box cannot be bounded at all
        let region = Aabb::new([f64::NEG_INFINITY, 0.0, 0.0], [1.0; 3]);
        assert_eq!(p.analyze(&region), Interval::EVERYTHING);
    }
}
