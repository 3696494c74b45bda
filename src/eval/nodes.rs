// eval/nodes.rs - Program execution over batches of positions
//
// Scalar semantics of every operation live in `op_scalar`; the batch path,
// the single-point path and (through `interval.rs`) the analyzer all agree
// on them.
//
// Batch layout is instruction-major: slot `k` owns a contiguous run of
// `batch_len` values. Each instruction reads earlier runs and writes its
// own, so one pass over the instruction list evaluates the whole batch.
// Scratch storage lives in an `EvalState` owned by the caller; a program
// itself is never mutated and can be shared across threads.

use crate::eval::compiled::{Op, Operand, Program};
use smallvec::SmallVec;

/// Scalar semantics of one operation. `args` holds one value per input
/// port, in port order. Every input produces a defined value: domain
/// errors clamp instead of failing.
#[inline]
pub(crate) fn op_scalar(op: &Op, args: &[f64]) -> f64 {
    match op {
        Op::Output => args[0],
        Op::Add => args[0] + args[1],
        Op::Subtract => args[0] - args[1],
        Op::Multiply => args[0] * args[1],
        Op::Sine => args[0].sin(),
        Op::Floor => args[0].floor(),
        Op::Abs => args[0].abs(),
        Op::Sqrt => args[0].max(0.0).sqrt(),
        Op::Distance2D | Op::Distance3D => distance(args),
        // never `f64::clamp`, which panics when min > max
        Op::Clamp { min, max } => args[0].max(*min).min(*max),
        Op::Mix => args[0] + (args[1] - args[0]) * args[2],
        Op::Remap { min0, scale, min1 } => (args[0] - min0) * scale + min1,
        Op::Curve(curve) => curve.sample(args[0]),
        Op::Noise2D(noise) => noise.sample_2d(args[0], args[1]),
        Op::Noise3D(noise) => noise.sample_3d(args[0], args[1], args[2]),
        Op::Image2D(image) => image.sample(args[0], args[1]),
    }
}

/// Euclidean distance, `args = [a0, a1, .., b0, b1, ..]`.
#[inline]
fn distance(args: &[f64]) -> f64 {
    let dims = args.len() / 2;
    let mut sum = 0.0;
    for i in 0..dims {
        let d = args[dims + i] - args[i];
        sum += d * d;
    }
    sum.sqrt()
}

#[inline(always)]
fn fetch(operand: Operand, done: &[f64], positions: &[[f64; 3]], n: usize, j: usize) -> f64 {
    match operand {
        Operand::Constant(v) => v,
        Operand::Input(axis) => positions[j][axis as usize],
        Operand::Slot(s) => done[s as usize * n + j],
    }
}

// ── Per-thread scratch ──────────────────────────────────────────────

/// Reusable scratch buffers for batch execution. Keep one per thread.
#[derive(Debug, Default)]
pub struct EvalState {
    slots: Vec<f64>,
    args: SmallVec<[f64; 6]>,
}

impl EvalState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Program {
    /// Evaluate the program at every position. Output order matches input.
    pub fn run(&self, positions: &[[f64; 3]]) -> Vec<f64> {
        let mut out = vec![0.0; positions.len()];
        self.run_with(positions, &mut out, &mut EvalState::new());
        out
    }

    /// Batch evaluation into `out` using caller-owned scratch. Evaluates
    /// `min(positions.len(), out.len())` points.
    pub fn run_with(&self, positions: &[[f64; 3]], out: &mut [f64], state: &mut EvalState) {
        let n = positions.len().min(out.len());
        if n == 0 {
            return;
        }
        let count = self.instructions().len();
        if count == 0 {
            out[..n].fill(0.0);
            return;
        }

        let EvalState { slots, args } = state;
        slots.clear();
        slots.resize(count * n, 0.0);

        for (k, ins) in self.instructions().iter().enumerate() {
            let (done, rest) = slots.split_at_mut(k * n);
            let dst = &mut rest[..n];
            let ops = ins.operands.as_slice();

            match (&ins.op, ops) {
                (Op::Output, &[a]) => {
                    for (j, d) in dst.iter_mut().enumerate() {
                        *d = fetch(a, done, positions, n, j);
                    }
                }
                (Op::Add, &[a, b]) => {
                    for (j, d) in dst.iter_mut().enumerate() {
                        *d = fetch(a, done, positions, n, j) + fetch(b, done, positions, n, j);
                    }
                }
                (Op::Subtract, &[a, b]) => {
                    for (j, d) in dst.iter_mut().enumerate() {
                        *d = fetch(a, done, positions, n, j) - fetch(b, done, positions, n, j);
                    }
                }
                (Op::Multiply, &[a, b]) => {
                    for (j, d) in dst.iter_mut().enumerate() {
                        *d = fetch(a, done, positions, n, j) * fetch(b, done, positions, n, j);
                    }
                }
                (op, _) => {
                    for (j, d) in dst.iter_mut().enumerate() {
                        args.clear();
                        args.extend(ops.iter().map(|&o| fetch(o, done, positions, n, j)));
                        *d = op_scalar(op, args);
                    }
                }
            }
        }

        out[..n].copy_from_slice(&slots[(count - 1) * n..count * n]);
    }

    /// Evaluate a single position.
    pub fn evaluate_point(&self, position: [f64; 3]) -> f64 {
        let mut slots: SmallVec<[f64; 32]> = SmallVec::with_capacity(self.instructions().len());
        let mut args: SmallVec<[f64; 6]> = SmallVec::new();

        for ins in self.instructions() {
            args.clear();
            args.extend(ins.operands.iter().map(|o| match *o {
                Operand::Constant(v) => v,
                Operand::Input(axis) => position[axis as usize],
                Operand::Slot(s) => slots[s as usize],
            }));
            slots.push(op_scalar(&ins.op, &args));
        }

        slots.last().copied().unwrap_or(0.0)
    }
}
