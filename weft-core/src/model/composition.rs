//! Graphs, layers and compositions.

use serde::{Deserialize, Serialize};

use super::ids::{CompositionId, GraphId, LayerId, NodeId, PropertyId};

/// What a graph is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum GraphBinding {
    /// A layer graph, driving properties of that layer.
    Layer(LayerId),
    /// A property graph, driving a single property.
    Property(PropertyId),
}

/// A set of nodes bound to a layer or a property.
///
/// The graph only lists its members; the nodes themselves live in the
/// snapshot and point back at the graph through their `graph_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub id: GraphId,
    pub binding: GraphBinding,
    pub nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub composition: CompositionId,
    pub name: String,
    /// The layer graph, if one is attached.
    #[serde(default)]
    pub graph: Option<GraphId>,
    /// Top-level properties, in display order.
    pub properties: Vec<PropertyId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composition {
    pub id: CompositionId,
    pub name: String,
    /// Layers, in stacking order.
    pub layers: Vec<LayerId>,
}
