// eval/error.rs - Error types for graph editing, compilation and generation
//
// Edit errors and compile errors are separate enums so an interactive
// editor can tell "my edit was rejected" apart from "my graph does not
// compile yet".

use crate::eval::graph::{NodeId, PortDirection};

/// A rejected structural or parameter edit. The graph is left unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("no node with id {0}")]
    NodeNotFound(NodeId),

    #[error("node {node_id} has no {direction} port {port_index}")]
    PortOutOfRange {
        node_id: NodeId,
        port_index: u32,
        direction: PortDirection,
    },

    #[error("expected an {expected} port on node {node_id}, got an {got} port")]
    DirectionMismatch {
        node_id: NodeId,
        expected: PortDirection,
        got: PortDirection,
    },

    #[error("node {0} cannot be connected to itself")]
    SelfLoop(NodeId),

    #[error("connecting node {src} to node {dst} would create a cycle")]
    WouldCreateCycle { src: NodeId, dst: NodeId },

    #[error("input port {port_index} of node {node_id} is already connected")]
    InputAlreadyConnected { node_id: NodeId, port_index: u32 },

    #[error("node {node_id} has no parameter {param_index}")]
    ParamOutOfRange { node_id: NodeId, param_index: u32 },

    #[error("parameter '{name}' of node {node_id} expects a {expected} value, got {got}")]
    ParamKindMismatch {
        node_id: NodeId,
        name: &'static str,
        expected: &'static str,
        got: &'static str,
    },

    #[error("parameter '{name}' of node {node_id} must be finite")]
    InvalidParamValue { node_id: NodeId, name: &'static str },
}

/// Why a graph could not be lowered into a program.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("graph has no output node")]
    MissingOutput,

    #[error("graph has more than one output node: {0:?}")]
    MultipleOutputs(Vec<NodeId>),

    #[error("required input '{port_name}' (port {port_index}) of node {node_id} is not connected")]
    UnconnectedInput {
        node_id: NodeId,
        port_index: u32,
        port_name: &'static str,
    },

    #[error("parameter '{param_name}' of node {node_id} has no resource assigned")]
    MissingResource {
        node_id: NodeId,
        param_name: &'static str,
    },

    #[error("cycle detected through node {node_id}")]
    Cycle { node_id: NodeId },
}

/// Rejected bounds configuration. The previous bounds stay active.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BoundsError {
    #[error("bounds on axis {axis} are inverted: min {min} > max {max}")]
    Inverted { axis: char, min: i32, max: i32 },

    #[error("bounds replacement values must be finite")]
    NonFiniteValue,
}

/// Rejected generator settings. The previous settings stay active.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("iso scale must be finite, got {0}")]
    NonFiniteIsoScale(f64),

    #[error("clip threshold must be finite and non-negative, got {0}")]
    InvalidClipThreshold(f64),

    #[error(transparent)]
    Bounds(#[from] BoundsError),
}

/// Generation was refused.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerateError {
    #[error("graph is not compiled, or was edited since the last successful compile")]
    NotCompiled,

    #[error("level of detail {lod} exceeds the maximum of {max}")]
    LodTooLarge { lod: u8, max: u8 },
}

/// Invalid image construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ImageError {
    #[error("image of {width}x{height} needs {expected} pixels, got {got}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        got: usize,
    },

    #[error("image dimensions must be non-zero")]
    Empty,
}

/// Failure while loading a graph document or generator settings.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    #[error("node {node_id} has no parameter named '{name}'")]
    UnknownParam { node_id: NodeId, name: String },

    #[error("parameter '{name}' of node {node_id}: {reason}")]
    BadParamValue {
        node_id: NodeId,
        name: String,
        reason: String,
    },

    #[error("no resource named '{0}' in the library")]
    UnknownResource(String),

    #[error("duplicate node id {0}")]
    DuplicateNodeId(NodeId),

    #[error("node id {0} is too large")]
    NodeIdTooLarge(NodeId),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}
