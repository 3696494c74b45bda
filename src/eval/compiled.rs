// eval/compiled.rs - Graph → linear program compiler
//
// Lowers a `ProgramGraph` snapshot into a flat instruction list that the
// execution engine and the interval analyzer walk front to back.
//
// - Only nodes reachable backward from the single `OutputSdf` node are
//   compiled; everything else is dead code and dropped.
// - Constants and coordinate inputs never become instructions. They are
//   folded straight into the operands of their consumers.
// - Unconnected inputs become constant operands holding the port default.
// - Instructions are ordered with Kahn's algorithm, always picking the
//   ready node with the smallest id, so compiling the same graph twice
//   yields the same program.
// - Instruction `k` writes slot `k`; operands only name earlier slots.
//   The last instruction is the output and its slot is the result.

use crate::eval::error::CompileError;
use crate::eval::graph::{NodeId, ProgramGraph};
use crate::eval::node_types::NodeTypeId;
use crate::eval::resources::{CurveSource, ImageSource, NoiseSource, ParamValue};
use log::{debug, warn};
use smallvec::SmallVec;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Operation performed by one instruction, with its parameters resolved.
#[derive(Clone, Debug)]
pub enum Op {
    Output,
    Add,
    Subtract,
    Multiply,
    Sine,
    Floor,
    Abs,
    Sqrt,
    Distance2D,
    Distance3D,
    Clamp { min: f64, max: f64 },
    Mix,
    /// `(x - min0) * scale + min1`; `scale` is 0 for a degenerate source range.
    Remap { min0: f64, scale: f64, min1: f64 },
    Curve(Arc<dyn CurveSource>),
    Noise2D(Arc<dyn NoiseSource>),
    Noise3D(Arc<dyn NoiseSource>),
    Image2D(Arc<dyn ImageSource>),
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Output => "Output",
            Op::Add => "Add",
            Op::Subtract => "Subtract",
            Op::Multiply => "Multiply",
            Op::Sine => "Sine",
            Op::Floor => "Floor",
            Op::Abs => "Abs",
            Op::Sqrt => "Sqrt",
            Op::Distance2D => "Distance2D",
            Op::Distance3D => "Distance3D",
            Op::Clamp { .. } => "Clamp",
            Op::Mix => "Mix",
            Op::Remap { .. } => "Remap",
            Op::Curve(_) => "Curve",
            Op::Noise2D(_) => "Noise2D",
            Op::Noise3D(_) => "Noise3D",
            Op::Image2D(_) => "Image2D",
        }
    }
}

/// Where an instruction reads one of its inputs from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    Constant(f64),
    /// Coordinate component: 0 = X, 1 = Y, 2 = Z.
    Input(u8),
    /// Output of an earlier instruction.
    Slot(u32),
}

#[derive(Clone, Debug)]
pub struct Instruction {
    pub op: Op,
    /// One operand per input port of the source node, in port order.
    pub operands: SmallVec<[Operand; 6]>,
    /// Graph node this instruction was lowered from.
    pub node_id: NodeId,
}

/// An immutable compiled graph.
///
/// Only `compile` builds one, so every `Operand::Slot` refers to an earlier
/// instruction and the executors may index slots without checks.
#[derive(Clone, Debug)]
pub struct Program {
    instructions: Vec<Instruction>,
    revision: u64,
    dropped_nodes: usize,
}

impl Program {
    #[inline]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Revision of the graph this program was compiled from.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of graph nodes that did not contribute to the output.
    #[inline]
    pub fn dropped_nodes(&self) -> usize {
        self.dropped_nodes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Slot holding the program result.
    #[inline]
    pub fn result_slot(&self) -> Option<u32> {
        self.instructions.len().checked_sub(1).map(|s| s as u32)
    }

    /// True if any instruction reads the given coordinate axis.
    pub fn reads_axis(&self, axis: u8) -> bool {
        self.instructions
            .iter()
            .flat_map(|i| i.operands.iter())
            .any(|o| *o == Operand::Input(axis))
    }
}

// ── Compilation ─────────────────────────────────────────────────────

/// Compile `graph` into a program.
pub fn compile(graph: &ProgramGraph) -> Result<Program, CompileError> {
    let result = compile_inner(graph);
    match &result {
        Ok(program) => debug!(
            "compiled graph revision {}: {} instructions, {} nodes dropped",
            program.revision,
            program.len(),
            program.dropped_nodes
        ),
        Err(err) => warn!("graph compilation failed: {err}"),
    }
    result
}

fn compile_inner(graph: &ProgramGraph) -> Result<Program, CompileError> {
    let outputs = graph.output_nodes();
    let output = match outputs.as_slice() {
        [] => return Err(CompileError::MissingOutput),
        [single] => *single,
        _ => return Err(CompileError::MultipleOutputs(outputs)),
    };

    let capacity = graph.id_capacity();

    // ── 1. Live set: everything the output depends on ──
    let mut live = vec![false; capacity];
    let mut live_count = 0usize;
    let mut stack = vec![output];
    while let Some(id) = stack.pop() {
        if live[id as usize] {
            continue;
        }
        live[id as usize] = true;
        live_count += 1;
        if let Some(node) = graph.node(id) {
            stack.extend(node.inputs().iter().flatten().map(|src| src.node_id));
        }
    }

    // ── 2. In-degrees and dependents over the live subgraph ──
    let mut in_degree = vec![0u32; capacity];
    let mut dependents: Vec<SmallVec<[NodeId; 4]>> = vec![SmallVec::new(); capacity];
    for node in graph.nodes().filter(|n| live[n.id as usize]) {
        for src in node.inputs().iter().flatten() {
            in_degree[node.id as usize] += 1;
            dependents[src.node_id as usize].push(node.id);
        }
    }

    // ── 3. Kahn's algorithm, smallest id first ──
    let mut ready: BinaryHeap<Reverse<NodeId>> = graph
        .nodes()
        .filter(|n| live[n.id as usize] && in_degree[n.id as usize] == 0)
        .map(|n| Reverse(n.id))
        .collect();
    let mut order: Vec<NodeId> = Vec::with_capacity(live_count);
    while let Some(Reverse(id)) = ready.pop() {
        order.push(id);
        for &dst in &dependents[id as usize] {
            let d = &mut in_degree[dst as usize];
            *d -= 1;
            if *d == 0 {
                ready.push(Reverse(dst));
            }
        }
    }
    if order.len() < live_count {
        let stuck = graph
            .node_ids()
            .find(|&id| live[id as usize] && in_degree[id as usize] > 0)
            .unwrap_or(output);
        return Err(CompileError::Cycle { node_id: stuck });
    }

    // ── 4. Emit ──
    let mut values: Vec<Option<Operand>> = vec![None; capacity];
    let mut instructions: Vec<Instruction> = Vec::new();

    for id in order {
        let node = match graph.node(id) {
            Some(n) => n,
            None => continue,
        };
        let info = node.node_type.info();

        match node.node_type {
            NodeTypeId::Constant => {
                let v = node.params()[0].as_number().unwrap_or(0.0);
                values[id as usize] = Some(Operand::Constant(v));
                continue;
            }
            NodeTypeId::InputX | NodeTypeId::InputY | NodeTypeId::InputZ => {
                values[id as usize] = node.node_type.input_axis().map(Operand::Input);
                continue;
            }
            _ => {}
        }

        let mut operands: SmallVec<[Operand; 6]> = SmallVec::new();
        for (port, (spec, source)) in info.inputs.iter().zip(node.inputs()).enumerate() {
            let operand = match (source, spec.default) {
                (Some(src), _) => values[src.node_id as usize].ok_or(CompileError::Cycle {
                    node_id: src.node_id,
                })?,
                (None, Some(default)) => Operand::Constant(default),
                (None, None) => {
                    return Err(CompileError::UnconnectedInput {
                        node_id: id,
                        port_index: port as u32,
                        port_name: spec.name,
                    })
                }
            };
            operands.push(operand);
        }

        let op = lower_op(node.node_type, node.params(), id)?;
        let slot = instructions.len() as u32;
        instructions.push(Instruction {
            op,
            operands,
            node_id: id,
        });
        values[id as usize] = Some(Operand::Slot(slot));
    }

    Ok(Program {
        instructions,
        revision: graph.revision(),
        dropped_nodes: graph.node_count() - live_count,
    })
}

fn number(params: &[ParamValue], index: usize) -> f64 {
    params.get(index).and_then(|p| p.as_number()).unwrap_or(0.0)
}

fn missing(node_id: NodeId, node_type: NodeTypeId) -> CompileError {
    CompileError::MissingResource {
        node_id,
        param_name: node_type.info().params[0].name,
    }
}

/// Resolve a node's parameters into an `Op`.
fn lower_op(node_type: NodeTypeId, params: &[ParamValue], node_id: NodeId) -> Result<Op, CompileError> {
    let op = match node_type {
        NodeTypeId::OutputSdf => Op::Output,
        NodeTypeId::Add => Op::Add,
        NodeTypeId::Subtract => Op::Subtract,
        NodeTypeId::Multiply => Op::Multiply,
        NodeTypeId::Sine => Op::Sine,
        NodeTypeId::Floor => Op::Floor,
        NodeTypeId::Abs => Op::Abs,
        NodeTypeId::Sqrt => Op::Sqrt,
        NodeTypeId::Distance2D => Op::Distance2D,
        NodeTypeId::Distance3D => Op::Distance3D,
        NodeTypeId::Mix => Op::Mix,
        NodeTypeId::Clamp => Op::Clamp {
            min: number(params, 0),
            max: number(params, 1),
        },
        NodeTypeId::Remap => {
            let (min0, max0) = (number(params, 0), number(params, 1));
            let (min1, max1) = (number(params, 2), number(params, 3));
            let scale = if max0 == min0 {
                0.0
            } else {
                (max1 - min1) / (max0 - min0)
            };
            Op::Remap {
                min0,
                scale: if scale.is_finite() { scale } else { 0.0 },
                min1,
            }
        }
        NodeTypeId::Curve => match params.first() {
            Some(ParamValue::Curve(Some(c))) => Op::Curve(c.clone()),
            _ => return Err(missing(node_id, node_type)),
        },
        NodeTypeId::Noise2D | NodeTypeId::Noise3D => match params.first() {
            Some(ParamValue::Noise(Some(n))) if node_type == NodeTypeId::Noise2D => {
                Op::Noise2D(n.clone())
            }
            Some(ParamValue::Noise(Some(n))) => Op::Noise3D(n.clone()),
            _ => return Err(missing(node_id, node_type)),
        },
        NodeTypeId::Image2D => match params.first() {
            Some(ParamValue::Image(Some(i))) => Op::Image2D(i.clone()),
            _ => return Err(missing(node_id, node_type)),
        },
        // folded into operands by the caller
        NodeTypeId::Constant | NodeTypeId::InputX | NodeTypeId::InputY | NodeTypeId::InputZ => {
            unreachable!("constants and inputs never become instructions")
        }
    };
    Ok(op)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::curves::Curve;

    fn node(g: &mut ProgramGraph, ty: NodeTypeId) -> NodeId {
        g.create_node(ty, [0.0, 0.0])
    }

    #[test]
    fn constant_folds_into_output() {
        let mut g = ProgramGraph::new();
        let c = node(&mut g, NodeTypeId::Constant);
        let out = node(&mut g, NodeTypeId::OutputSdf);
        g.set_node_param(c, 0, 5.0).unwrap();
        g.add_connection(c, 0, out, 0).unwrap();

        let p = compile(&g).unwrap();
        assert_eq!(p.len(), 1);
        assert!(matches!(p.instructions[0].op, Op::Output));
        assert_eq!(p.instructions[0].operands[0], Operand::Constant(5.0));
        assert_eq!(p.instructions[0].node_id, out);
        assert_eq!(p.result_slot(), Some(0));
        assert_eq!(p.revision(), g.revision());
    }

    #[test]
    fn program_is_read_through_accessors() {
        let mut g = ProgramGraph::new();
        let x = node(&mut g, NodeTypeId::InputX);
        let abs = node(&mut g, NodeTypeId::Abs);
        let out = node(&mut g, NodeTypeId::OutputSdf);
        node(&mut g, NodeTypeId::Sine);
        g.add_connection(x, 0, abs, 0).unwrap();
        g.add_connection(abs, 0, out, 0).unwrap();

        let p = compile(&g).unwrap();
        let copy = p.clone();
        assert_eq!(copy.instructions().len(), p.len());
        assert_eq!(copy.dropped_nodes(), 1);
        assert_eq!(copy.revision(), g.revision());
        let last = &copy.instructions()[copy.len() - 1];
        assert_eq!(last.node_id, out);
        assert_eq!(last.operands.as_slice(), &[Operand::Slot(0)]);
    }

    #[test]
    fn missing_output() {
        let mut g = ProgramGraph::new();
        node(&mut g, NodeTypeId::Constant);
        assert_eq!(compile(&g).unwrap_err(), CompileError::MissingOutput);
    }

    #[test]
    fn multiple_outputs() {
        let mut g = ProgramGraph::new();
        let a = node(&mut g, NodeTypeId::OutputSdf);
        let b = node(&mut g, NodeTypeId::OutputSdf);
        assert_eq!(
            compile(&g).unwrap_err(),
            CompileError::MultipleOutputs(vec![a, b])
        );
    }

    #[test]
    fn unconnected_required_input() {
        let mut g = ProgramGraph::new();
        let out = node(&mut g, NodeTypeId::OutputSdf);
        assert_eq!(
            compile(&g).unwrap_err(),
            CompileError::UnconnectedInput {
                node_id: out,
                port_index: 0,
                port_name: "sdf"
            }
        );
    }

    #[test]
    fn unconnected_optional_inputs_use_defaults() {
        let mut g = ProgramGraph::new();
        let mix = node(&mut g, NodeTypeId::Mix);
        let out = node(&mut g, NodeTypeId::OutputSdf);
        g.add_connection(mix, 0, out, 0).unwrap();

        let p = compile(&g).unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(
            p.instructions[0].operands.as_slice(),
            &[
                Operand::Constant(0.0),
                Operand::Constant(0.0),
                Operand::Constant(0.5)
            ]
        );
        assert_eq!(p.instructions[1].operands[0], Operand::Slot(0));
    }

    #[test]
    fn missing_resource() {
        let mut g = ProgramGraph::new();
        let n = node(&mut g, NodeTypeId::Noise3D);
        let out = node(&mut g, NodeTypeId::OutputSdf);
        g.add_connection(n, 0, out, 0).unwrap();
        assert_eq!(
            compile(&g).unwrap_err(),
            CompileError::MissingResource {
                node_id: n,
                param_name: "noise"
            }
        );
    }

    #[test]
    fn dead_nodes_are_dropped() {
        let mut g = ProgramGraph::new();
        let x = node(&mut g, NodeTypeId::InputX);
        let dead = node(&mut g, NodeTypeId::Sine);
        let abs = node(&mut g, NodeTypeId::Abs);
        let out = node(&mut g, NodeTypeId::OutputSdf);
        g.add_connection(x, 0, dead, 0).unwrap();
        g.add_connection(x, 0, abs, 0).unwrap();
        g.add_connection(abs, 0, out, 0).unwrap();
        // unconnected resource node is dead and therefore not an error
        node(&mut g, NodeTypeId::Curve);

        let p = compile(&g).unwrap();
        assert_eq!(p.len(), 2);
        assert_eq!(p.dropped_nodes(), 2);
        assert_eq!(p.instructions[0].node_id, abs);
        assert_eq!(p.instructions[0].operands[0], Operand::Input(0));
        assert!(p.reads_axis(0));
        assert!(!p.reads_axis(1));
    }

    #[test]
    fn order_is_topological_with_smallest_id_first() {
        let mut g = ProgramGraph::new();
        let out = node(&mut g, NodeTypeId::OutputSdf);
        let add = node(&mut g, NodeTypeId::Add);
        let b = node(&mut g, NodeTypeId::Abs);
        let a = node(&mut g, NodeTypeId::Sine);
        g.add_connection(a, 0, add, 0).unwrap();
        g.add_connection(b, 0, add, 1).unwrap();
        g.add_connection(add, 0, out, 0).unwrap();

        let p = compile(&g).unwrap();
        let ids: Vec<NodeId> = p.instructions().iter().map(|i| i.node_id).collect();
        assert_eq!(ids, vec![b, a, add, out]);
        assert_eq!(p.instructions[2].operands.as_slice(), &[Operand::Slot(1), Operand::Slot(0)]);
        // every operand reads an earlier slot
        for (k, ins) in p.instructions().iter().enumerate() {
            for o in &ins.operands {
                if let Operand::Slot(s) = o {
                    assert!((*s as usize) < k);
                }
            }
        }
    }

    #[test]
    fn remap_and_clamp_params_are_resolved() {
        let mut g = ProgramGraph::new();
        let r = node(&mut g, NodeTypeId::Remap);
        let c = node(&mut g, NodeTypeId::Clamp);
        let out = node(&mut g, NodeTypeId::OutputSdf);
        g.set_node_param(r, 0, 0.0).unwrap();
        g.set_node_param(r, 1, 2.0).unwrap();
        g.set_node_param(r, 2, 10.0).unwrap();
        g.set_node_param(r, 3, 20.0).unwrap();
        g.set_node_param(c, 0, 0.0).unwrap();
        g.add_connection(r, 0, c, 0).unwrap();
        g.add_connection(c, 0, out, 0).unwrap();

        let p = compile(&g).unwrap();
        match p.instructions[0].op {
            Op::Remap { min0, scale, min1 } => {
                assert_eq!((min0, scale, min1), (0.0, 5.0, 10.0));
            }
            ref other => panic!("expected remap, got {}", other.name()),
        }
        match p.instructions[1].op {
            Op::Clamp { min, max } => assert_eq!((min, max), (0.0, 1.0)),
            ref other => panic!("expected clamp, got {}", other.name()),
        }
    }

    #[test]
    fn degenerate_remap_has_zero_scale() {
        let mut g = ProgramGraph::new();
        let r = node(&mut g, NodeTypeId::Remap);
        let out = node(&mut g, NodeTypeId::OutputSdf);
        g.set_node_param(r, 1, -1.0).unwrap();
        g.add_connection(r, 0, out, 0).unwrap();
        let p = compile(&g).unwrap();
        assert!(matches!(p.instructions[0].op, Op::Remap { scale, .. } if scale == 0.0));
    }

    #[test]
    fn resource_ops_share_the_resource() {
        let curve: Arc<dyn CurveSource> = Arc::new(Curve::linear(&[(0.0, 0.0), (1.0, 1.0)]));
        let mut g = ProgramGraph::new();
        let cv = node(&mut g, NodeTypeId::Curve);
        let out = node(&mut g, NodeTypeId::OutputSdf);
        g.set_node_param(cv, 0, ParamValue::Curve(Some(curve.clone())))
            .unwrap();
        g.add_connection(cv, 0, out, 0).unwrap();

        let p = compile(&g).unwrap();
        match &p.instructions[0].op {
            Op::Curve(c) => assert!(Arc::ptr_eq(c, &curve)),
            other => panic!("expected curve, got {}", other.name()),
        }
    }
}
