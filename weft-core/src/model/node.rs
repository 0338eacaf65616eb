//! Graph Nodes
//!
//! This module defines the nodes that live in a layer or property graph.
//!
//! A node's behaviour during resolution is decided by its [`NodeKind`]. Only
//! a handful of kinds matter to the resolver (expressions, property
//! inputs/outputs and the composition frame source); the remaining kinds are
//! pure computations whose dependencies are fully described by their input
//! pointers.

use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use super::ids::{GraphId, LayerId, NodeId, PropertyId};

/// Type tag carried by inputs, outputs and leaf properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Number,
    Vec2,
    Rect,
    Color,
    Any,
}

/// Reference from an input to one output slot of another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPointer {
    /// The node supplying the value.
    pub node: NodeId,
    /// Index into that node's outputs.
    pub output: usize,
}

/// An input socket of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub name: String,
    pub value_type: ValueType,
    /// When `None` the input uses its locally stored literal.
    #[serde(default)]
    pub pointer: Option<OutputPointer>,
}

impl Input {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            pointer: None,
        }
    }
}

/// An output socket of a node. Only used for display and type checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub value_type: ValueType,
}

impl Output {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }
}

pub type Inputs = SmallVec<[Input; 4]>;
pub type Outputs = SmallVec<[Output; 2]>;

/// The kind of a node, with any kind-specific state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Empty,

    /// Evaluates `expression`, binding each input by name.
    Expression { expression: String },

    /// Reads the current value of a property, possibly on another layer.
    PropertyInput {
        layer: Option<LayerId>,
        property: Option<PropertyId>,
    },

    /// Writes the computed value to a property of the graph's layer.
    /// These are the externally visible results of a graph.
    PropertyOutput { property: Option<PropertyId> },

    /// Emits composition-level values, including the frame index.
    /// This is the only frame source.
    Composition,

    ArrayModifierIndex,
    NumberInput,
    NumberCap,
    NumberLerp,
    DegToRad,
    RadToDeg,
    Vec2Input,
    Vec2Add,
    Vec2Factors,
    Vec2Lerp,
    ColorInput,
    ColorFromRgbaFactors,
    ColorToRgbaFactors,
    RectTranslate,
}

impl NodeKind {
    /// Human-readable label shown in the node editor.
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Empty => "Empty",
            NodeKind::Expression { .. } => "Expression",
            NodeKind::PropertyInput { .. } => "Property Input",
            NodeKind::PropertyOutput { .. } => "Property Output",
            NodeKind::Composition => "Composition",
            NodeKind::ArrayModifierIndex => "Index",
            NodeKind::NumberInput => "Number input",
            NodeKind::NumberCap => "Cap number",
            NodeKind::NumberLerp => "Number interpolation",
            NodeKind::DegToRad => "Degrees to Radians",
            NodeKind::RadToDeg => "Radians to Degrees",
            NodeKind::Vec2Input => "Vec2 Input",
            NodeKind::Vec2Add => "Add Vec2",
            NodeKind::Vec2Factors => "Vec2 Factors",
            NodeKind::Vec2Lerp => "Vec2 interpolation",
            NodeKind::ColorInput => "Color Input",
            NodeKind::ColorFromRgbaFactors => "Color from RGBA",
            NodeKind::ColorToRgbaFactors => "RGBA from Color",
            NodeKind::RectTranslate => "Translate Rect",
        }
    }

    /// Whether this node emits the frame index.
    pub fn is_frame_source(&self) -> bool {
        matches!(self, NodeKind::Composition)
    }

    /// Whether this node is a graph output.
    pub fn is_property_output(&self) -> bool {
        matches!(self, NodeKind::PropertyOutput { .. })
    }

    /// The inputs and outputs a freshly created node of this kind starts with.
    ///
    /// Expression and property nodes start out bare; their sockets depend on
    /// the expression variables or the selected property and are added by
    /// the editing surface.
    pub fn default_io(&self) -> (Inputs, Outputs) {
        use ValueType::{Color, Number, Rect, Vec2};

        let num = |name: &str| Input::new(name, Number);

        match self {
            NodeKind::Empty | NodeKind::PropertyInput { .. } | NodeKind::PropertyOutput { .. } => {
                (SmallVec::new(), SmallVec::new())
            }
            NodeKind::Expression { .. } => {
                (SmallVec::new(), smallvec![Output::new("Result", Number)])
            }
            NodeKind::Composition => (
                SmallVec::new(),
                smallvec![
                    Output::new("Frame Index", Number),
                    Output::new("Width", Number),
                    Output::new("Height", Number),
                ],
            ),
            NodeKind::ArrayModifierIndex => {
                (SmallVec::new(), smallvec![Output::new("Index", Number)])
            }
            NodeKind::NumberInput => {
                (smallvec![num("Value")], smallvec![Output::new("Value", Number)])
            }
            NodeKind::NumberCap => (
                smallvec![num("Value"), num("Min"), num("Max")],
                smallvec![Output::new("Value", Number)],
            ),
            NodeKind::NumberLerp => (
                smallvec![num("A"), num("B"), num("t")],
                smallvec![Output::new("Value", Number)],
            ),
            NodeKind::DegToRad => {
                (smallvec![num("Degrees")], smallvec![Output::new("Radians", Number)])
            }
            NodeKind::RadToDeg => {
                (smallvec![num("Radians")], smallvec![Output::new("Degrees", Number)])
            }
            NodeKind::Vec2Input => (
                smallvec![Input::new("Vec2", Vec2)],
                smallvec![Output::new("Vec2", Vec2)],
            ),
            NodeKind::Vec2Add => (
                smallvec![Input::new("A", Vec2), Input::new("B", Vec2)],
                smallvec![Output::new("Vec2", Vec2)],
            ),
            NodeKind::Vec2Factors => (
                smallvec![Input::new("Vec2", Vec2)],
                smallvec![Output::new("X", Number), Output::new("Y", Number)],
            ),
            NodeKind::Vec2Lerp => (
                smallvec![Input::new("A", Vec2), Input::new("B", Vec2), num("t")],
                smallvec![Output::new("Vec2", Vec2)],
            ),
            NodeKind::ColorInput => (
                smallvec![Input::new("Color", Color)],
                smallvec![Output::new("Color", Color)],
            ),
            NodeKind::ColorFromRgbaFactors => (
                smallvec![num("R"), num("G"), num("B"), num("A")],
                smallvec![Output::new("Color", Color)],
            ),
            NodeKind::ColorToRgbaFactors => {
                let outputs = ["R", "G", "B", "A"]
                    .into_iter()
                    .map(|name| Output::new(name, Number))
                    .collect();
                (smallvec![Input::new("Color", Color)], outputs)
            }
            NodeKind::RectTranslate => (
                smallvec![Input::new("Rect", Rect), Input::new("Translation", Vec2)],
                smallvec![Output::new("Rect", Rect)],
            ),
        }
    }
}

/// A node in a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node.
    id: NodeId,

    /// The graph that lists this node.
    graph: GraphId,

    /// What kind of node this is.
    kind: NodeKind,

    inputs: Inputs,
    outputs: Outputs,
}

impl Node {
    /// Create a node of the given kind with the kind's default sockets.
    pub fn new(graph: GraphId, kind: NodeKind) -> Self {
        let (inputs, outputs) = kind.default_io();
        Self {
            id: NodeId::new(),
            graph,
            kind,
            inputs,
            outputs,
        }
    }

    /// Get the node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Get the id of the graph this node claims to belong to.
    pub fn graph_id(&self) -> GraphId {
        self.graph
    }

    /// Get the node's kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Iterate over the pointers of all connected inputs, in input order.
    pub fn pointers(&self) -> impl Iterator<Item = OutputPointer> + '_ {
        self.inputs.iter().filter_map(|input| input.pointer)
    }

    pub(crate) fn push_input(&mut self, input: Input) -> usize {
        self.inputs.push(input);
        self.inputs.len() - 1
    }

    pub(crate) fn push_output(&mut self, output: Output) -> usize {
        self.outputs.push(output);
        self.outputs.len() - 1
    }

    pub(crate) fn input_mut(&mut self, index: usize) -> Option<&mut Input> {
        self.inputs.get_mut(index)
    }
}
