// eval/node_types.rs - The closed catalogue of node types
//
// Every node type has a fixed list of input ports, output ports and typed
// parameters. The tables here are the single source of truth for port
// counts, port defaults and parameter kinds; the graph validates edits
// against them and the compiler reads defaults from them.

use crate::eval::resources::ParamKind;

/// Identifies one of the built-in operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum NodeTypeId {
    Constant = 0,
    InputX,
    InputY,
    InputZ,
    OutputSdf,
    Add,
    Subtract,
    Multiply,
    Sine,
    Floor,
    Abs,
    Sqrt,
    Distance2D,
    Distance3D,
    Clamp,
    Mix,
    Remap,
    Curve,
    Noise2D,
    Noise3D,
    Image2D,
}

/// An input or output port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortSpec {
    pub name: &'static str,
    /// Value used when an input is left unconnected. `None` marks a
    /// required input. Always `None` for outputs.
    pub default: Option<f64>,
}

/// A node parameter slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    /// Initial value for number parameters; ignored for resources.
    pub default: f64,
}

/// Static description of a node type.
#[derive(Debug, Clone, Copy)]
pub struct NodeTypeInfo {
    pub id: NodeTypeId,
    pub name: &'static str,
    pub inputs: &'static [PortSpec],
    pub outputs: &'static [PortSpec],
    pub params: &'static [ParamSpec],
}

// ── Port and parameter tables ───────────────────────────────────────

const fn input(name: &'static str, default: f64) -> PortSpec {
    PortSpec {
        name,
        default: Some(default),
    }
}

const fn output(name: &'static str) -> PortSpec {
    PortSpec {
        name,
        default: None,
    }
}

const fn number(name: &'static str, default: f64) -> ParamSpec {
    ParamSpec {
        name,
        kind: ParamKind::Number,
        default,
    }
}

const fn resource(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        default: 0.0,
    }
}

const NONE: &[PortSpec] = &[];
const NO_PARAMS: &[ParamSpec] = &[];
const OUT: &[PortSpec] = &[output("out")];
const OUT_VALUE: &[PortSpec] = &[output("value")];
const OUT_X: &[PortSpec] = &[output("x")];
const OUT_Y: &[PortSpec] = &[output("y")];
const OUT_Z: &[PortSpec] = &[output("z")];

const IN_X: &[PortSpec] = &[input("x", 0.0)];
const IN_AB: &[PortSpec] = &[input("a", 0.0), input("b", 0.0)];
const IN_XY: &[PortSpec] = &[input("x", 0.0), input("y", 0.0)];
const IN_XYZ: &[PortSpec] = &[input("x", 0.0), input("y", 0.0), input("z", 0.0)];
const IN_SDF: &[PortSpec] = &[PortSpec {
    name: "sdf",
    default: None,
}];
const IN_DIST2: &[PortSpec] = &[
    input("x0", 0.0),
    input("y0", 0.0),
    input("x1", 0.0),
    input("y1", 0.0),
];
const IN_DIST3: &[PortSpec] = &[
    input("x0", 0.0),
    input("y0", 0.0),
    input("z0", 0.0),
    input("x1", 0.0),
    input("y1", 0.0),
    input("z1", 0.0),
];
const IN_MIX: &[PortSpec] = &[input("a", 0.0), input("b", 0.0), input("ratio", 0.5)];

const P_CONSTANT: &[ParamSpec] = &[number("value", 0.0)];
const P_CLAMP: &[ParamSpec] = &[number("min", -1.0), number("max", 1.0)];
const P_REMAP: &[ParamSpec] = &[
    number("min0", -1.0),
    number("max0", 1.0),
    number("min1", -1.0),
    number("max1", 1.0),
];
const P_CURVE: &[ParamSpec] = &[resource("curve", ParamKind::Curve)];
const P_NOISE: &[ParamSpec] = &[resource("noise", ParamKind::Noise)];
const P_IMAGE: &[ParamSpec] = &[resource("image", ParamKind::Image)];

const fn info(
    id: NodeTypeId,
    name: &'static str,
    inputs: &'static [PortSpec],
    outputs: &'static [PortSpec],
    params: &'static [ParamSpec],
) -> NodeTypeInfo {
    NodeTypeInfo {
        id,
        name,
        inputs,
        outputs,
        params,
    }
}

/// All node types, indexed by `NodeTypeId as usize`.
static CATALOGUE: [NodeTypeInfo; NodeTypeId::COUNT] = [
    info(NodeTypeId::Constant, "Constant", NONE, OUT_VALUE, P_CONSTANT),
    info(NodeTypeId::InputX, "InputX", NONE, OUT_X, NO_PARAMS),
    info(NodeTypeId::InputY, "InputY", NONE, OUT_Y, NO_PARAMS),
    info(NodeTypeId::InputZ, "InputZ", NONE, OUT_Z, NO_PARAMS),
    info(NodeTypeId::OutputSdf, "OutputSdf", IN_SDF, NONE, NO_PARAMS),
    info(NodeTypeId::Add, "Add", IN_AB, OUT, NO_PARAMS),
    info(NodeTypeId::Subtract, "Subtract", IN_AB, OUT, NO_PARAMS),
    info(NodeTypeId::Multiply, "Multiply", IN_AB, OUT, NO_PARAMS),
    info(NodeTypeId::Sine, "Sine", IN_X, OUT, NO_PARAMS),
    info(NodeTypeId::Floor, "Floor", IN_X, OUT, NO_PARAMS),
    info(NodeTypeId::Abs, "Abs", IN_X, OUT, NO_PARAMS),
    info(NodeTypeId::Sqrt, "Sqrt", IN_X, OUT, NO_PARAMS),
    info(NodeTypeId::Distance2D, "Distance2D", IN_DIST2, OUT, NO_PARAMS),
    info(NodeTypeId::Distance3D, "Distance3D", IN_DIST3, OUT, NO_PARAMS),
    info(NodeTypeId::Clamp, "Clamp", IN_X, OUT, P_CLAMP),
    info(NodeTypeId::Mix, "Mix", IN_MIX, OUT, NO_PARAMS),
    info(NodeTypeId::Remap, "Remap", IN_X, OUT, P_REMAP),
    info(NodeTypeId::Curve, "Curve", IN_X, OUT, P_CURVE),
    info(NodeTypeId::Noise2D, "Noise2D", IN_XY, OUT, P_NOISE),
    info(NodeTypeId::Noise3D, "Noise3D", IN_XYZ, OUT, P_NOISE),
    info(NodeTypeId::Image2D, "Image2D", IN_XY, OUT, P_IMAGE),
];

impl NodeTypeId {
    pub const COUNT: usize = 21;

    pub const ALL: [NodeTypeId; Self::COUNT] = [
        NodeTypeId::Constant,
        NodeTypeId::InputX,
        NodeTypeId::InputY,
        NodeTypeId::InputZ,
        NodeTypeId::OutputSdf,
        NodeTypeId::Add,
        NodeTypeId::Subtract,
        NodeTypeId::Multiply,
        NodeTypeId::Sine,
        NodeTypeId::Floor,
        NodeTypeId::Abs,
        NodeTypeId::Sqrt,
        NodeTypeId::Distance2D,
        NodeTypeId::Distance3D,
        NodeTypeId::Clamp,
        NodeTypeId::Mix,
        NodeTypeId::Remap,
        NodeTypeId::Curve,
        NodeTypeId::Noise2D,
        NodeTypeId::Noise3D,
        NodeTypeId::Image2D,
    ];

    #[inline]
    pub fn info(self) -> &'static NodeTypeInfo {
        &CATALOGUE[self as usize]
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Look up a node type by its catalogue name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Constant" => Some(NodeTypeId::Constant),
            "InputX" => Some(NodeTypeId::InputX),
            "InputY" => Some(NodeTypeId::InputY),
            "InputZ" => Some(NodeTypeId::InputZ),
            "OutputSdf" => Some(NodeTypeId::OutputSdf),
            "Add" => Some(NodeTypeId::Add),
            "Subtract" => Some(NodeTypeId::Subtract),
            "Multiply" => Some(NodeTypeId::Multiply),
            "Sine" => Some(NodeTypeId::Sine),
            "Floor" => Some(NodeTypeId::Floor),
            "Abs" => Some(NodeTypeId::Abs),
            "Sqrt" => Some(NodeTypeId::Sqrt),
            "Distance2D" => Some(NodeTypeId::Distance2D),
            "Distance3D" => Some(NodeTypeId::Distance3D),
            "Clamp" => Some(NodeTypeId::Clamp),
            "Mix" => Some(NodeTypeId::Mix),
            "Remap" => Some(NodeTypeId::Remap),
            "Curve" => Some(NodeTypeId::Curve),
            "Noise2D" => Some(NodeTypeId::Noise2D),
            "Noise3D" => Some(NodeTypeId::Noise3D),
            "Image2D" => Some(NodeTypeId::Image2D),
            _ => None,
        }
    }

    /// Coordinate axis produced by an input node (0 = X, 1 = Y, 2 = Z).
    #[inline]
    pub fn input_axis(self) -> Option<u8> {
        match self {
            NodeTypeId::InputX => Some(0),
            NodeTypeId::InputY => Some(1),
            NodeTypeId::InputZ => Some(2),
            _ => None,
        }
    }
}

/// Ports and parameters of a node type, for building editors.
pub fn node_type_info(id: NodeTypeId) -> &'static NodeTypeInfo {
    id.info()
}

impl NodeTypeInfo {
    pub fn input_index(&self, name: &str) -> Option<u32> {
        self.inputs
            .iter()
            .position(|p| p.name == name)
            .map(|i| i as u32)
    }

    pub fn param_index(&self, name: &str) -> Option<u32> {
        self.params
            .iter()
            .position(|p| p.name == name)
            .map(|i| i as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_is_indexed_by_id() {
        for id in NodeTypeId::ALL {
            assert_eq!(id.info().id, id);
        }
    }

    #[test]
    fn names_round_trip() {
        for id in NodeTypeId::ALL {
            assert_eq!(NodeTypeId::from_name(id.name()), Some(id));
        }
        assert_eq!(NodeTypeId::from_name("Tangent"), None);
    }

    #[test]
    fn output_sdf_input_is_required() {
        let info = NodeTypeId::OutputSdf.info();
        assert_eq!(info.inputs.len(), 1);
        assert_eq!(info.inputs[0].default, None);
        assert!(info.outputs.is_empty());
    }

    #[test]
    fn mix_ratio_defaults_to_half() {
        let info = NodeTypeId::Mix.info();
        assert_eq!(info.input_index("ratio"), Some(2));
        assert_eq!(info.inputs[2].default, Some(0.5));
    }

    #[test]
    fn param_tables() {
        let clamp = NodeTypeId::Clamp.info();
        assert_eq!(clamp.params.len(), 2);
        assert_eq!(clamp.params[0].default, -1.0);
        assert_eq!(clamp.params[1].default, 1.0);
        assert_eq!(NodeTypeId::Remap.info().param_index("max1"), Some(3));
        assert_eq!(NodeTypeId::Noise3D.info().params[0].kind, ParamKind::Noise);
        assert!(NodeTypeId::InputY.info().params.is_empty());
    }

    #[test]
    fn distance_port_counts() {
        assert_eq!(NodeTypeId::Distance2D.info().inputs.len(), 4);
        assert_eq!(NodeTypeId::Distance3D.info().inputs.len(), 6);
    }

    #[test]
    fn input_axes() {
        assert_eq!(NodeTypeId::InputX.input_axis(), Some(0));
        assert_eq!(NodeTypeId::InputZ.input_axis(), Some(2));
        assert_eq!(NodeTypeId::Add.input_axis(), None);
    }
}
