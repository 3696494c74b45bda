// eval/graph.rs - Editable node graph
//
// Nodes live in a dense arena indexed by their id. Removing a node leaves a
// tombstone, so ids stay stable and are never handed out twice. Each input
// port stores the output port that feeds it, which makes the single-writer
// rule structural: an input has at most one source by construction, while
// outputs fan out freely.
//
// Every edit is atomic. A rejected edit returns an error and leaves the
// graph exactly as it was. Successful edits stamp a new revision so a
// compiled program can tell whether it still describes this graph.

use crate::eval::error::{DocumentError, GraphError};
use crate::eval::node_types::NodeTypeId;
use crate::eval::resources::{ParamKind, ParamValue, ResourceLibrary};
use crate::schema::{ConnectionDocument, GraphDocument, NodeDocument};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable node identifier. Never reused within a graph.
pub type NodeId = u32;

/// Largest node id accepted from a document. Keeps a hostile document from
/// forcing a huge arena allocation.
const MAX_DOCUMENT_NODE_ID: NodeId = 1 << 20;

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

/// Revisions are unique across all graphs in the process, so a program
/// compiled from one graph can never match a different graph by accident.
fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// A port address: (node, index, direction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub node_id: NodeId,
    pub port_index: u32,
    pub direction: PortDirection,
}

impl PortRef {
    pub fn output(node_id: NodeId, port_index: u32) -> Self {
        Self {
            node_id,
            port_index,
            direction: PortDirection::Output,
        }
    }

    pub fn input(node_id: NodeId, port_index: u32) -> Self {
        Self {
            node_id,
            port_index,
            direction: PortDirection::Input,
        }
    }
}

/// The output port feeding an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputRef {
    pub node_id: NodeId,
    pub port_index: u32,
}

/// A directed edge from an output port to an input port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Connection {
    pub src_node: NodeId,
    pub src_port: u32,
    pub dst_node: NodeId,
    pub dst_port: u32,
}

/// A node in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeTypeId,
    /// Presentation only. Ignored by compilation and execution.
    pub gui_position: [f32; 2],
    params: SmallVec<[ParamValue; 4]>,
    inputs: SmallVec<[Option<OutputRef>; 6]>,
}

impl Node {
    fn new(id: NodeId, node_type: NodeTypeId, gui_position: [f32; 2]) -> Self {
        let info = node_type.info();
        Node {
            id,
            node_type,
            gui_position,
            params: info
                .params
                .iter()
                .map(|p| p.kind.default_value(p.default))
                .collect(),
            inputs: SmallVec::from_elem(None, info.inputs.len()),
        }
    }

    #[inline]
    pub fn params(&self) -> &[ParamValue] {
        &self.params
    }

    /// Source of every input port, in port order. `None` = unconnected.
    #[inline]
    pub fn inputs(&self) -> &[Option<OutputRef>] {
        &self.inputs
    }
}

/// The editable graph: a node arena plus the edges stored on input ports.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramGraph {
    nodes: Vec<Option<Node>>,
    revision: u64,
}

impl Default for ProgramGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramGraph {
    pub fn new() -> Self {
        ProgramGraph {
            nodes: Vec::new(),
            revision: next_revision(),
        }
    }

    /// Changes on every successful structural or parameter edit.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[inline]
    fn touch(&mut self) {
        self.revision = next_revision();
    }

    // ── Nodes ───────────────────────────────────────────────────────

    /// Add a node with default parameters and unconnected ports.
    pub fn create_node(&mut self, node_type: NodeTypeId, gui_position: [f32; 2]) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.nodes.push(Some(Node::new(id, node_type, gui_position)));
        self.touch();
        id
    }

    /// Add a node by catalogue name.
    pub fn create_node_by_name(
        &mut self,
        type_name: &str,
        gui_position: [f32; 2],
    ) -> Result<NodeId, GraphError> {
        let node_type = NodeTypeId::from_name(type_name)
            .ok_or_else(|| GraphError::UnknownNodeType(type_name.to_string()))?;
        Ok(self.create_node(node_type, gui_position))
    }

    /// Remove a node and every connection touching any of its ports.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.node(id).ok_or(GraphError::NodeNotFound(id))?;
        self.nodes[id as usize] = None;
        for node in self.nodes.iter_mut().flatten() {
            for input in node.inputs.iter_mut() {
                if input.map_or(false, |src| src.node_id == id) {
                    *input = None;
                }
            }
        }
        self.touch();
        Ok(())
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id as usize).and_then(|n| n.as_ref())
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes
            .get_mut(id as usize)
            .and_then(|n| n.as_mut())
            .ok_or(GraphError::NodeNotFound(id))
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node_type(&self, id: NodeId) -> Option<NodeTypeId> {
        self.node(id).map(|n| n.node_type)
    }

    /// Live node ids in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().flatten().map(|n| n.id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter().flatten()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// Upper bound (exclusive) of every id handed out so far.
    #[inline]
    pub fn id_capacity(&self) -> usize {
        self.nodes.len()
    }

    pub fn gui_position(&self, id: NodeId) -> Option<[f32; 2]> {
        self.node(id).map(|n| n.gui_position)
    }

    /// Move a node in the editor. Does not change the revision.
    pub fn set_gui_position(&mut self, id: NodeId, position: [f32; 2]) -> Result<(), GraphError> {
        self.node_mut(id)?.gui_position = position;
        Ok(())
    }

    // ── Connections ─────────────────────────────────────────────────

    /// Validate a prospective connection without applying it.
    pub fn check_connection(
        &self,
        src_node: NodeId,
        src_port: u32,
        dst_node: NodeId,
        dst_port: u32,
    ) -> Result<(), GraphError> {
        let src = self.node(src_node).ok_or(GraphError::NodeNotFound(src_node))?;
        let dst = self.node(dst_node).ok_or(GraphError::NodeNotFound(dst_node))?;

        if src_port as usize >= src.node_type.info().outputs.len() {
            return Err(GraphError::PortOutOfRange {
                node_id: src_node,
                port_index: src_port,
                direction: PortDirection::Output,
            });
        }
        if dst_port as usize >= dst.inputs.len() {
            return Err(GraphError::PortOutOfRange {
                node_id: dst_node,
                port_index: dst_port,
                direction: PortDirection::Input,
            });
        }
        if src_node == dst_node {
            return Err(GraphError::SelfLoop(src_node));
        }
        if dst.inputs[dst_port as usize].is_some() {
            return Err(GraphError::InputAlreadyConnected {
                node_id: dst_node,
                port_index: dst_port,
            });
        }
        if self.depends_on(src_node, dst_node) {
            return Err(GraphError::WouldCreateCycle {
                src: src_node,
                dst: dst_node,
            });
        }
        Ok(())
    }

    pub fn can_connect(&self, src_node: NodeId, src_port: u32, dst_node: NodeId, dst_port: u32) -> bool {
        self.check_connection(src_node, src_port, dst_node, dst_port)
            .is_ok()
    }

    /// Connect an output port to an unconnected input port.
    ///
    /// An input that is already connected is rejected; remove the old
    /// connection first.
    pub fn add_connection(
        &mut self,
        src_node: NodeId,
        src_port: u32,
        dst_node: NodeId,
        dst_port: u32,
    ) -> Result<(), GraphError> {
        self.check_connection(src_node, src_port, dst_node, dst_port)?;
        self.node_mut(dst_node)?.inputs[dst_port as usize] = Some(OutputRef {
            node_id: src_node,
            port_index: src_port,
        });
        self.touch();
        Ok(())
    }

    /// Like [`add_connection`](Self::add_connection), with explicit port
    /// directions checked first.
    pub fn connect_ports(&mut self, src: PortRef, dst: PortRef) -> Result<(), GraphError> {
        if src.direction != PortDirection::Output {
            return Err(GraphError::DirectionMismatch {
                node_id: src.node_id,
                expected: PortDirection::Output,
                got: src.direction,
            });
        }
        if dst.direction != PortDirection::Input {
            return Err(GraphError::DirectionMismatch {
                node_id: dst.node_id,
                expected: PortDirection::Input,
                got: dst.direction,
            });
        }
        self.add_connection(src.node_id, src.port_index, dst.node_id, dst.port_index)
    }

    /// Remove one edge. Returns `false` (and changes nothing) when the edge
    /// does not exist.
    pub fn remove_connection(
        &mut self,
        src_node: NodeId,
        src_port: u32,
        dst_node: NodeId,
        dst_port: u32,
    ) -> bool {
        let expected = OutputRef {
            node_id: src_node,
            port_index: src_port,
        };
        let removed = match self
            .nodes
            .get_mut(dst_node as usize)
            .and_then(|n| n.as_mut())
            .and_then(|n| n.inputs.get_mut(dst_port as usize))
        {
            Some(slot) if *slot == Some(expected) => {
                *slot = None;
                true
            }
            _ => false,
        };
        if removed {
            self.touch();
        }
        removed
    }

    /// Every edge exactly once, ordered by destination node then port.
    pub fn get_connections(&self) -> Vec<Connection> {
        let mut out = Vec::new();
        for node in self.nodes.iter().flatten() {
            for (port, input) in node.inputs.iter().enumerate() {
                if let Some(src) = input {
                    out.push(Connection {
                        src_node: src.node_id,
                        src_port: src.port_index,
                        dst_node: node.id,
                        dst_port: port as u32,
                    });
                }
            }
        }
        out
    }

    /// Source feeding an input port, if connected.
    pub fn input_source(&self, node_id: NodeId, port_index: u32) -> Option<OutputRef> {
        self.node(node_id)
            .and_then(|n| n.inputs.get(port_index as usize).copied().flatten())
    }

    /// True if `target` is `from` or lies upstream of it.
    fn depends_on(&self, from: NodeId, target: NodeId) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if id == target {
                return true;
            }
            let slot = id as usize;
            if visited[slot] {
                continue;
            }
            visited[slot] = true;
            if let Some(node) = self.node(id) {
                stack.extend(node.inputs.iter().flatten().map(|src| src.node_id));
            }
        }
        false
    }

    // ── Parameters ──────────────────────────────────────────────────

    pub fn get_node_param(&self, node_id: NodeId, param_index: u32) -> Result<&ParamValue, GraphError> {
        let node = self.node(node_id).ok_or(GraphError::NodeNotFound(node_id))?;
        node.params
            .get(param_index as usize)
            .ok_or(GraphError::ParamOutOfRange {
                node_id,
                param_index,
            })
    }

    /// Replace a parameter. The value must match the parameter's declared
    /// kind and numbers must be finite.
    pub fn set_node_param(
        &mut self,
        node_id: NodeId,
        param_index: u32,
        value: impl Into<ParamValue>,
    ) -> Result<(), GraphError> {
        let value = value.into();
        let node = self.node_mut(node_id)?;
        let spec = node
            .node_type
            .info()
            .params
            .get(param_index as usize)
            .ok_or(GraphError::ParamOutOfRange {
                node_id,
                param_index,
            })?;

        if value.kind() != spec.kind {
            return Err(GraphError::ParamKindMismatch {
                node_id,
                name: spec.name,
                expected: spec.kind.name(),
                got: value.kind().name(),
            });
        }
        if let ParamValue::Number(v) = value {
            if !v.is_finite() {
                return Err(GraphError::InvalidParamValue {
                    node_id,
                    name: spec.name,
                });
            }
        }

        node.params[param_index as usize] = value;
        self.touch();
        Ok(())
    }

    /// Output nodes, ascending by id.
    pub fn output_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .flatten()
            .filter(|n| n.node_type == NodeTypeId::OutputSdf)
            .map(|n| n.id)
            .collect()
    }

    // ── Documents ───────────────────────────────────────────────────

    /// Rebuild a graph from a document, resolving resource names through
    /// `library`. Every node, parameter and connection goes through the
    /// normal edit path, so a document cannot produce an invalid graph.
    pub fn from_document(doc: &GraphDocument, library: &ResourceLibrary) -> Result<Self, DocumentError> {
        let mut graph = ProgramGraph::new();

        for node_doc in &doc.nodes {
            let id = node_doc.id;
            if id > MAX_DOCUMENT_NODE_ID {
                return Err(DocumentError::NodeIdTooLarge(id));
            }
            if graph.has_node(id) {
                return Err(DocumentError::DuplicateNodeId(id));
            }
            let node_type = NodeTypeId::from_name(&node_doc.node_type)
                .ok_or_else(|| DocumentError::UnknownNodeType(node_doc.node_type.clone()))?;

            let slot = id as usize;
            if slot >= graph.nodes.len() {
                graph.nodes.resize(slot + 1, None);
            }
            graph.nodes[slot] = Some(Node::new(id, node_type, node_doc.position));

            let info = node_type.info();
            for (name, raw) in &node_doc.params {
                let index = info
                    .param_index(name)
                    .ok_or_else(|| DocumentError::UnknownParam {
                        node_id: id,
                        name: name.clone(),
                    })?;
                let kind = info.params[index as usize].kind;
                let value = param_from_json(id, name, kind, raw, library)?;
                graph.set_node_param(id, index, value)?;
            }
        }

        for c in &doc.connections {
            graph.add_connection(c.src_node, c.src_port, c.dst_node, c.dst_port)?;
        }

        graph.touch();
        Ok(graph)
    }

    /// Serialize the graph. Resources are written by their name in
    /// `library`; unassigned resources and resources the library does not
    /// know are written as `null`.
    pub fn to_document(&self, library: &ResourceLibrary) -> GraphDocument {
        let nodes = self
            .nodes()
            .map(|node| {
                let info = node.node_type.info();
                let params: BTreeMap<String, Value> = info
                    .params
                    .iter()
                    .zip(node.params.iter())
                    .map(|(spec, value)| {
                        let json = match value {
                            ParamValue::Number(v) => Value::from(*v),
                            other => library
                                .name_of(other)
                                .map(|n| Value::String(n.to_string()))
                                .unwrap_or(Value::Null),
                        };
                        (spec.name.to_string(), json)
                    })
                    .collect();
                NodeDocument {
                    id: node.id,
                    node_type: info.name.to_string(),
                    params,
                    position: node.gui_position,
                }
            })
            .collect();

        let connections = self
            .get_connections()
            .into_iter()
            .map(|c| ConnectionDocument {
                src_node: c.src_node,
                src_port: c.src_port,
                dst_node: c.dst_node,
                dst_port: c.dst_port,
            })
            .collect();

        GraphDocument { nodes, connections }
    }
}

fn param_from_json(
    node_id: NodeId,
    name: &str,
    kind: ParamKind,
    raw: &Value,
    library: &ResourceLibrary,
) -> Result<ParamValue, DocumentError> {
    let bad = |reason: &str| DocumentError::BadParamValue {
        node_id,
        name: name.to_string(),
        reason: reason.to_string(),
    };

    match (kind, raw) {
        (ParamKind::Number, Value::Number(n)) => n
            .as_f64()
            .map(ParamValue::Number)
            .ok_or_else(|| bad("number out of range")),
        (ParamKind::Number, _) => Err(bad("expected a number")),
        (_, Value::Null) => Ok(kind.default_value(0.0)),
        (_, Value::String(resource)) => library
            .resolve(kind, resource)
            .ok_or_else(|| DocumentError::UnknownResource(resource.clone())),
        (_, _) => Err(bad("expected a resource name")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::curves::Curve;
    use std::sync::Arc;

    fn make_node(graph: &mut ProgramGraph, ty: NodeTypeId) -> NodeId {
        graph.create_node(ty, [0.0, 0.0])
    }

    fn make_chain() -> (ProgramGraph, NodeId, NodeId, NodeId) {
        let mut g = ProgramGraph::new();
        let x = make_node(&mut g, NodeTypeId::InputX);
        let s = make_node(&mut g, NodeTypeId::Sine);
        let out = make_node(&mut g, NodeTypeId::OutputSdf);
        g.add_connection(x, 0, s, 0).unwrap();
        g.add_connection(s, 0, out, 0).unwrap();
        (g, x, s, out)
    }

    #[test]
    fn ids_are_sequential_and_never_reused() {
        let mut g = ProgramGraph::new();
        let a = make_node(&mut g, NodeTypeId::Constant);
        let b = make_node(&mut g, NodeTypeId::Constant);
        assert_eq!((a, b), (0, 1));
        g.remove_node(a).unwrap();
        let c = make_node(&mut g, NodeTypeId::Constant);
        assert_eq!(c, 2);
        assert!(!g.has_node(a));
        assert_eq!(g.node_ids().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn unknown_type_name_is_rejected() {
        let mut g = ProgramGraph::new();
        let err = g.create_node_by_name("Tangent", [0.0, 0.0]).unwrap_err();
        assert_eq!(err, GraphError::UnknownNodeType("Tangent".into()));
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn new_node_has_default_params() {
        let mut g = ProgramGraph::new();
        let c = make_node(&mut g, NodeTypeId::Clamp);
        assert_eq!(g.get_node_param(c, 0).unwrap(), &ParamValue::Number(-1.0));
        assert_eq!(g.get_node_param(c, 1).unwrap(), &ParamValue::Number(1.0));
        let n = make_node(&mut g, NodeTypeId::Noise2D);
        assert_eq!(g.get_node_param(n, 0).unwrap(), &ParamValue::Noise(None));
    }

    #[test]
    fn connect_and_enumerate() {
        let (g, x, s, out) = make_chain();
        let conns = g.get_connections();
        assert_eq!(conns.len(), 2);
        assert!(conns.contains(&Connection {
            src_node: x,
            src_port: 0,
            dst_node: s,
            dst_port: 0
        }));
        assert_eq!(
            g.input_source(out, 0),
            Some(OutputRef {
                node_id: s,
                port_index: 0
            })
        );
    }

    #[test]
    fn output_fans_out() {
        let mut g = ProgramGraph::new();
        let x = make_node(&mut g, NodeTypeId::InputX);
        let add = make_node(&mut g, NodeTypeId::Add);
        g.add_connection(x, 0, add, 0).unwrap();
        g.add_connection(x, 0, add, 1).unwrap();
        assert_eq!(g.get_connections().len(), 2);
    }

    #[test]
    fn occupied_input_is_rejected() {
        let (mut g, x, _s, out) = make_chain();
        let before = g.clone();
        let err = g.add_connection(x, 0, out, 0).unwrap_err();
        assert_eq!(
            err,
            GraphError::InputAlreadyConnected {
                node_id: out,
                port_index: 0
            }
        );
        assert_eq!(g, before);
    }

    #[test]
    fn cycle_is_rejected_and_graph_unchanged() {
        let mut g = ProgramGraph::new();
        let a = make_node(&mut g, NodeTypeId::Add);
        let b = make_node(&mut g, NodeTypeId::Add);
        let c = make_node(&mut g, NodeTypeId::Add);
        g.add_connection(a, 0, b, 0).unwrap();
        g.add_connection(b, 0, c, 0).unwrap();

        let before = g.clone();
        assert!(!g.can_connect(c, 0, a, 0));
        let err = g.add_connection(c, 0, a, 0).unwrap_err();
        assert_eq!(err, GraphError::WouldCreateCycle { src: c, dst: a });
        assert_eq!(g, before);
        assert_eq!(g.revision(), before.revision());
    }

    #[test]
    fn self_loop_is_rejected() {
        let mut g = ProgramGraph::new();
        let a = make_node(&mut g, NodeTypeId::Add);
        assert_eq!(g.add_connection(a, 0, a, 1), Err(GraphError::SelfLoop(a)));
    }

    #[test]
    fn port_ranges_are_checked() {
        let mut g = ProgramGraph::new();
        let x = make_node(&mut g, NodeTypeId::InputX);
        let out = make_node(&mut g, NodeTypeId::OutputSdf);
        assert_eq!(
            g.add_connection(x, 1, out, 0),
            Err(GraphError::PortOutOfRange {
                node_id: x,
                port_index: 1,
                direction: PortDirection::Output
            })
        );
        assert_eq!(
            g.add_connection(x, 0, out, 3),
            Err(GraphError::PortOutOfRange {
                node_id: out,
                port_index: 3,
                direction: PortDirection::Input
            })
        );
        // OutputSdf has no output ports at all
        assert!(!g.can_connect(out, 0, x, 0));
        assert_eq!(g.add_connection(x, 0, 42, 0), Err(GraphError::NodeNotFound(42)));
    }

    #[test]
    fn connect_ports_checks_direction() {
        let mut g = ProgramGraph::new();
        let x = make_node(&mut g, NodeTypeId::InputX);
        let out = make_node(&mut g, NodeTypeId::OutputSdf);
        let err = g
            .connect_ports(PortRef::input(x, 0), PortRef::input(out, 0))
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::DirectionMismatch {
                node_id: x,
                expected: PortDirection::Output,
                got: PortDirection::Input
            }
        );
        g.connect_ports(PortRef::output(x, 0), PortRef::input(out, 0))
            .unwrap();
        assert_eq!(g.get_connections().len(), 1);
    }

    #[test]
    fn remove_connection_is_noop_when_absent() {
        let (mut g, x, s, out) = make_chain();
        let rev = g.revision();
        assert!(!g.remove_connection(x, 0, out, 0));
        assert_eq!(g.revision(), rev);
        assert!(g.remove_connection(x, 0, s, 0));
        assert_ne!(g.revision(), rev);
        assert_eq!(g.get_connections().len(), 1);
    }

    #[test]
    fn remove_node_cascades() {
        let (mut g, x, s, out) = make_chain();
        let extra = make_node(&mut g, NodeTypeId::Abs);
        g.add_connection(x, 0, extra, 0).unwrap();

        g.remove_node(s).unwrap();
        assert_eq!(
            g.get_connections(),
            vec![Connection {
                src_node: x,
                src_port: 0,
                dst_node: extra,
                dst_port: 0
            }]
        );
        assert_eq!(g.input_source(out, 0), None);
        assert_eq!(g.remove_node(s), Err(GraphError::NodeNotFound(s)));
    }

    #[test]
    fn param_kinds_are_validated() {
        let mut g = ProgramGraph::new();
        let c = make_node(&mut g, NodeTypeId::Constant);
        let before = g.clone();

        let err = g.set_node_param(c, 0, ParamValue::Curve(None)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter 'value' of node 0 expects a number value, got curve"
        );
        assert_eq!(
            g.set_node_param(c, 1, 3.0),
            Err(GraphError::ParamOutOfRange {
                node_id: c,
                param_index: 1
            })
        );
        assert_eq!(
            g.set_node_param(c, 0, f64::NAN),
            Err(GraphError::InvalidParamValue {
                node_id: c,
                name: "value"
            })
        );
        assert_eq!(g, before);

        g.set_node_param(c, 0, 5.0).unwrap();
        assert_eq!(g.get_node_param(c, 0).unwrap().as_number(), Some(5.0));
    }

    #[test]
    fn gui_position_does_not_change_revision() {
        let mut g = ProgramGraph::new();
        let c = make_node(&mut g, NodeTypeId::Constant);
        let rev = g.revision();
        g.set_gui_position(c, [10.0, -4.0]).unwrap();
        assert_eq!(g.gui_position(c), Some([10.0, -4.0]));
        assert_eq!(g.revision(), rev);
    }

    #[test]
    fn document_round_trip_preserves_ids() {
        let curve: Arc<dyn crate::eval::resources::CurveSource> =
            Arc::new(Curve::linear(&[(0.0, 0.0), (1.0, 2.0)]));
        let mut lib = ResourceLibrary::new();
        lib.add_curve("ramp", curve.clone());

        let mut g = ProgramGraph::new();
        let gap = make_node(&mut g, NodeTypeId::Constant);
        let y = make_node(&mut g, NodeTypeId::InputY);
        let cv = make_node(&mut g, NodeTypeId::Curve);
        let out = make_node(&mut g, NodeTypeId::OutputSdf);
        g.remove_node(gap).unwrap();
        g.set_node_param(cv, 0, ParamValue::Curve(Some(curve))).unwrap();
        g.add_connection(y, 0, cv, 0).unwrap();
        g.add_connection(cv, 0, out, 0).unwrap();

        let doc = g.to_document(&lib);
        assert_eq!(doc.nodes[1].params["curve"], Value::String("ramp".into()));

        let back = ProgramGraph::from_document(&doc, &lib).unwrap();
        assert_eq!(back.node_ids().collect::<Vec<_>>(), vec![y, cv, out]);
        assert_eq!(back.get_connections(), g.get_connections());
        assert_eq!(back.get_node_param(cv, 0), g.get_node_param(cv, 0));
        // the tombstoned id stays unused
        let mut back = back;
        assert_eq!(make_node(&mut back, NodeTypeId::Abs), 4);
    }

    #[test]
    fn document_cannot_smuggle_cycle() {
        let json = r#"{
            "nodes": [
                {"id": 0, "type": "Add"},
                {"id": 1, "type": "Add"}
            ],
            "connections": [
                {"srcNode": 0, "srcPort": 0, "dstNode": 1, "dstPort": 0},
                {"srcNode": 1, "srcPort": 0, "dstNode": 0, "dstPort": 0}
            ]
        }"#;
        let doc: GraphDocument = serde_json::from_str(json).unwrap();
        let err = ProgramGraph::from_document(&doc, &ResourceLibrary::new()).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::Graph(GraphError::WouldCreateCycle { src: 1, dst: 0 })
        ));
    }

    #[test]
    fn document_errors() {
        let lib = ResourceLibrary::new();
        let parse = |json: &str| serde_json::from_str::<GraphDocument>(json).unwrap();

        let dup = parse(r#"{"nodes": [{"id": 3, "type": "Abs"}, {"id": 3, "type": "Abs"}]}"#);
        assert!(matches!(
            ProgramGraph::from_document(&dup, &lib),
            Err(DocumentError::DuplicateNodeId(3))
        ));

        let unknown = parse(r#"{"nodes": [{"id": 0, "type": "Cosine"}]}"#);
        assert!(matches!(
            ProgramGraph::from_document(&unknown, &lib),
            Err(DocumentError::UnknownNodeType(_))
        ));

        let missing = parse(r#"{"nodes": [{"id": 0, "type": "Curve", "params": {"curve": "nope"}}]}"#);
        assert!(matches!(
            ProgramGraph::from_document(&missing, &lib),
            Err(DocumentError::UnknownResource(_))
        ));

        let bad = parse(r#"{"nodes": [{"id": 0, "type": "Constant", "params": {"value": "five"}}]}"#);
        assert!(matches!(
            ProgramGraph::from_document(&bad, &lib),
            Err(DocumentError::BadParamValue { .. })
        ));

        let huge = parse(r#"{"nodes": [{"id": 4000000000, "type": "Abs"}]}"#);
        assert!(matches!(
            ProgramGraph::from_document(&huge, &lib),
            Err(DocumentError::NodeIdTooLarge(_))
        ));
    }
}
