//! Error types.

use std::fmt;

use thiserror::Error;

use crate::model::{CompositionId, GraphId, LayerId, NodeId, PropertyId};

/// Any entity a reference in the model can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reference {
    Node(NodeId),
    /// One output slot of a node.
    Output { node: NodeId, output: usize },
    Graph(GraphId),
    Layer(LayerId),
    Property(PropertyId),
    Composition(CompositionId),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Node(id) => fmt::Display::fmt(id, f),
            Reference::Output { node, output } => write!(f, "output {output} of {node}"),
            Reference::Graph(id) => fmt::Display::fmt(id, f),
            Reference::Layer(id) => fmt::Display::fmt(id, f),
            Reference::Property(id) => fmt::Display::fmt(id, f),
            Reference::Composition(id) => fmt::Display::fmt(id, f),
        }
    }
}

/// A fatal failure of a resolution pass. No partial result accompanies it.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A node was reached twice on the same descent path.
    #[error("circular node dependency at {0}")]
    CircularDependency(NodeId),

    #[error("expression of {node} failed to compile: {reason}")]
    ExpressionCompilation {
        node: NodeId,
        #[source]
        reason: CompileError,
    },

    /// Only raised under [`DanglingPolicy::Fail`](crate::config::DanglingPolicy).
    #[error("{origin} references missing {target}")]
    DanglingReference { origin: Reference, target: Reference },

    #[error("{node} is listed by {listed_by} but claims to belong to {claims}")]
    GraphMismatch {
        node: NodeId,
        listed_by: GraphId,
        claims: GraphId,
    },

    /// An ordinary input pointer crossed a graph boundary. Cross-graph
    /// dependencies only exist through property input/output nodes.
    #[error("an input of {node} points at {target} in another graph")]
    CrossGraphPointer { node: NodeId, target: NodeId },

    #[error("unknown {0}")]
    UnknownComposition(CompositionId),

    /// The expression backend could not be set up for the host.
    #[error("expression compiler unavailable: {0}")]
    CompilerUnavailable(#[source] CompileError),
}

impl ResolveError {
    /// The node the failure is attributed to, if any.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            ResolveError::CircularDependency(node)
            | ResolveError::ExpressionCompilation { node, .. }
            | ResolveError::GraphMismatch { node, .. }
            | ResolveError::CrossGraphPointer { node, .. } => Some(*node),
            ResolveError::DanglingReference {
                origin: Reference::Node(node),
                ..
            } => Some(*node),
            ResolveError::DanglingReference { .. }
            | ResolveError::UnknownComposition(_)
            | ResolveError::CompilerUnavailable(_) => None,
        }
    }
}

/// Failure to turn expression source into an executable function.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("`{function}` takes {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    /// The compiled function was called with the wrong number of inputs.
    #[error("expected {expected} input(s), got {found}")]
    InputCount { expected: usize, found: usize },

    #[error("invalid trace: {0}")]
    Trace(String),

    #[error("failed to build target isa: {0}")]
    Isa(String),

    #[error("code generation failed: {0}")]
    Codegen(String),
}

/// Failure of a construction call on [`Snapshot`](crate::model::Snapshot).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("unknown {0}")]
    Unknown(Reference),

    #[error("{0} is already present")]
    DuplicateId(Reference),

    #[error("{0} is not a group property")]
    NotAGroup(PropertyId),

    #[error("{layer} already has {graph} attached")]
    LayerHasGraph { layer: LayerId, graph: GraphId },

    #[error("{node} has no input {index}")]
    InputOutOfRange { node: NodeId, index: usize },

    #[error("{node} has no output {index}")]
    OutputOutOfRange { node: NodeId, index: usize },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("msgpack encode: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("msgpack decode: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}
