//! Model Snapshot
//!
//! A [`Snapshot`] holds every composition, layer, property, graph and node
//! the engine needs for one resolution pass. The editing surfaces build and
//! mutate it between passes; a pass only ever borrows it immutably.
//!
//! All maps are insertion ordered, so iterating a snapshot (and therefore
//! resolving it) is deterministic.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::composition::{Composition, Graph, GraphBinding, Layer};
use super::ids::{CompositionId, GraphId, LayerId, NodeId, PropertyId};
use super::node::{Input, Node, NodeKind, Output, OutputPointer, ValueType};
use super::property::{CompoundKind, Property, PropertyKind};
use crate::error::{ModelError, Reference, SnapshotError};

/// Where a new leaf or compound property is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyParent {
    Layer(LayerId),
    Group(PropertyId),
}

impl From<LayerId> for PropertyParent {
    fn from(layer: LayerId) -> Self {
        PropertyParent::Layer(layer)
    }
}

/// Read-only view of the composition and graph model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "SnapshotMaps")]
pub struct Snapshot {
    compositions: IndexMap<CompositionId, Composition>,
    layers: IndexMap<LayerId, Layer>,
    properties: IndexMap<PropertyId, Property>,
    graphs: IndexMap<GraphId, Graph>,
    nodes: IndexMap<NodeId, Node>,
}

/// Deserialized form of a [`Snapshot`].
#[derive(Deserialize)]
struct SnapshotMaps {
    compositions: IndexMap<CompositionId, Composition>,
    layers: IndexMap<LayerId, Layer>,
    properties: IndexMap<PropertyId, Property>,
    graphs: IndexMap<GraphId, Graph>,
    nodes: IndexMap<NodeId, Node>,
}

impl From<SnapshotMaps> for Snapshot {
    fn from(maps: SnapshotMaps) -> Self {
        let snapshot = Snapshot {
            compositions: maps.compositions,
            layers: maps.layers,
            properties: maps.properties,
            graphs: maps.graphs,
            nodes: maps.nodes,
        };
        // A snapshot from another process may hold ids this process has not
        // issued yet.
        snapshot.reserve_ids();
        snapshot
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    // Queries

    pub fn composition(&self, id: CompositionId) -> Option<&Composition> {
        self.compositions.get(&id)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(&id)
    }

    pub fn property(&self, id: PropertyId) -> Option<&Property> {
        self.properties.get(&id)
    }

    pub fn graph(&self, id: GraphId) -> Option<&Graph> {
        self.graphs.get(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The property output nodes of a graph, in membership order.
    ///
    /// Members missing from the snapshot are skipped here; the resolver
    /// reports them according to its dangling reference policy.
    pub fn output_nodes<'a>(
        &'a self,
        graph: &'a Graph,
    ) -> impl Iterator<Item = &'a Node> + 'a {
        graph
            .nodes
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|node| node.kind().is_property_output())
    }

    /// The layer a graph ultimately belongs to. Property graphs belong to
    /// the layer of their property.
    pub fn graph_layer(&self, graph: GraphId) -> Option<LayerId> {
        match self.graphs.get(&graph)?.binding {
            GraphBinding::Layer(layer) => Some(layer),
            GraphBinding::Property(property) => self.properties.get(&property).map(|p| p.layer),
        }
    }

    /// The property ids a property input node selecting `property` reads.
    ///
    /// A group yields its direct children; anything else yields itself.
    pub fn referenced_property_ids(&self, property: PropertyId) -> Vec<PropertyId> {
        match self.properties.get(&property) {
            Some(Property {
                kind: PropertyKind::Group { properties },
                ..
            }) => properties.clone(),
            Some(_) => vec![property],
            None => Vec::new(),
        }
    }

    /// `property` followed by every property it contains: group members,
    /// and the sub-leaves of compounds (whether referenced directly or
    /// through a group).
    pub fn contained_property_ids(&self, property: PropertyId) -> Vec<PropertyId> {
        let Some(root) = self.properties.get(&property) else {
            return Vec::new();
        };

        let mut ids = vec![property];
        for &child in root.children() {
            ids.push(child);
            if let Some(p) = self.properties.get(&child) {
                if !p.is_group() {
                    ids.extend_from_slice(p.children());
                }
            }
        }
        ids
    }

    /// Every `(node, input index)` in `node`'s graph whose pointer targets
    /// `node`.
    pub fn inputs_referencing(&self, node: NodeId) -> Vec<(NodeId, usize)> {
        let Some(graph) = self
            .nodes
            .get(&node)
            .and_then(|n| self.graphs.get(&n.graph_id()))
        else {
            return Vec::new();
        };

        let mut refs = Vec::new();
        for candidate in graph.nodes.iter().filter_map(|id| self.nodes.get(id)) {
            for (index, input) in candidate.inputs().iter().enumerate() {
                if input.pointer.is_some_and(|p| p.node == node) {
                    refs.push((candidate.id(), index));
                }
            }
        }
        refs
    }

    // Construction

    pub fn add_composition(&mut self, name: impl Into<String>) -> CompositionId {
        let id = CompositionId::new();
        self.compositions.insert(
            id,
            Composition {
                id,
                name: name.into(),
                layers: Vec::new(),
            },
        );
        id
    }

    /// Append a new layer to a composition.
    pub fn add_layer(
        &mut self,
        composition: CompositionId,
        name: impl Into<String>,
    ) -> Result<LayerId, ModelError> {
        let comp = self
            .compositions
            .get_mut(&composition)
            .ok_or(ModelError::Unknown(Reference::Composition(composition)))?;

        let id = LayerId::new();
        comp.layers.push(id);
        self.layers.insert(
            id,
            Layer {
                id,
                composition,
                name: name.into(),
                graph: None,
                properties: Vec::new(),
            },
        );
        Ok(id)
    }

    pub fn add_leaf(
        &mut self,
        parent: impl Into<PropertyParent>,
        name: impl Into<String>,
        value_type: ValueType,
    ) -> Result<PropertyId, ModelError> {
        self.attach_property(parent.into(), name.into(), PropertyKind::Leaf { value_type })
    }

    /// Add a compound property together with its fixed sub-leaves.
    pub fn add_compound(
        &mut self,
        parent: impl Into<PropertyParent>,
        name: impl Into<String>,
        kind: CompoundKind,
    ) -> Result<PropertyId, ModelError> {
        let parent = parent.into();
        let layer = self.parent_layer(parent)?;

        let leaves: Vec<PropertyId> = kind
            .leaf_names()
            .iter()
            .map(|leaf_name| {
                let id = PropertyId::new();
                self.properties.insert(
                    id,
                    Property {
                        id,
                        layer,
                        name: (*leaf_name).to_string(),
                        kind: PropertyKind::Leaf {
                            value_type: ValueType::Number,
                        },
                    },
                );
                id
            })
            .collect();

        self.attach_property(
            parent,
            name.into(),
            PropertyKind::Compound {
                kind,
                properties: leaves,
            },
        )
    }

    /// Add an empty group. Groups only attach to layers.
    pub fn add_group(
        &mut self,
        layer: LayerId,
        name: impl Into<String>,
    ) -> Result<PropertyId, ModelError> {
        self.attach_property(
            PropertyParent::Layer(layer),
            name.into(),
            PropertyKind::Group {
                properties: Vec::new(),
            },
        )
    }

    /// Create a graph. A layer binding also attaches the graph to the layer.
    pub fn add_graph(&mut self, binding: GraphBinding) -> Result<GraphId, ModelError> {
        let id = GraphId::new();
        match binding {
            GraphBinding::Layer(layer_id) => {
                let layer = self
                    .layers
                    .get_mut(&layer_id)
                    .ok_or(ModelError::Unknown(Reference::Layer(layer_id)))?;
                if let Some(graph) = layer.graph {
                    return Err(ModelError::LayerHasGraph {
                        layer: layer_id,
                        graph,
                    });
                }
                layer.graph = Some(id);
            }
            GraphBinding::Property(property) => {
                if !self.properties.contains_key(&property) {
                    return Err(ModelError::Unknown(Reference::Property(property)));
                }
            }
        }

        self.graphs.insert(
            id,
            Graph {
                id,
                binding,
                nodes: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Create a node of `kind`, with the kind's default sockets, in `graph`.
    pub fn add_node(&mut self, graph: GraphId, kind: NodeKind) -> Result<NodeId, ModelError> {
        self.attach_node(graph, Node::new(graph, kind))
    }

    /// List an already built node under `graph`.
    ///
    /// The node's own graph id is taken as is; a mismatch is reported by the
    /// resolver, not here. A node whose id is already present is refused.
    pub fn attach_node(&mut self, graph: GraphId, node: Node) -> Result<NodeId, ModelError> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(ModelError::DuplicateId(Reference::Node(id)));
        }

        let members = &mut self
            .graphs
            .get_mut(&graph)
            .ok_or(ModelError::Unknown(Reference::Graph(graph)))?
            .nodes;
        members.push(id);
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Append an unconnected input. Returns its index.
    pub fn add_input(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        value_type: ValueType,
    ) -> Result<usize, ModelError> {
        Ok(self.node_mut(node)?.push_input(Input::new(name, value_type)))
    }

    /// Append an output. Returns its index.
    pub fn add_output(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        value_type: ValueType,
    ) -> Result<usize, ModelError> {
        Ok(self.node_mut(node)?.push_output(Output::new(name, value_type)))
    }

    /// Point input `input` of `to` at output `output` of `from`.
    pub fn connect(
        &mut self,
        from: NodeId,
        output: usize,
        to: NodeId,
        input: usize,
    ) -> Result<(), ModelError> {
        let source = self
            .nodes
            .get(&from)
            .ok_or(ModelError::Unknown(Reference::Node(from)))?;
        if output >= source.outputs().len() {
            return Err(ModelError::OutputOutOfRange {
                node: from,
                index: output,
            });
        }

        let slot = self
            .node_mut(to)?
            .input_mut(input)
            .ok_or(ModelError::InputOutOfRange { node: to, index: input })?;
        slot.pointer = Some(OutputPointer { node: from, output });
        Ok(())
    }

    /// Reset an input to its local literal.
    pub fn disconnect(&mut self, node: NodeId, input: usize) -> Result<(), ModelError> {
        let slot = self
            .node_mut(node)?
            .input_mut(input)
            .ok_or(ModelError::InputOutOfRange { node, index: input })?;
        slot.pointer = None;
        Ok(())
    }

    // Serialization

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(rmp_serde::to_vec_named(self)?)
    }

    fn reserve_ids(&self) {
        self.compositions.keys().for_each(CompositionId::reserve);
        self.layers.keys().for_each(LayerId::reserve);
        self.properties.keys().for_each(PropertyId::reserve);
        self.graphs.keys().for_each(GraphId::reserve);
        self.nodes.keys().for_each(NodeId::reserve);
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ModelError> {
        self.nodes
            .get_mut(&id)
            .ok_or(ModelError::Unknown(Reference::Node(id)))
    }

    fn parent_layer(&self, parent: PropertyParent) -> Result<LayerId, ModelError> {
        match parent {
            PropertyParent::Layer(layer) => self
                .layers
                .contains_key(&layer)
                .then_some(layer)
                .ok_or(ModelError::Unknown(Reference::Layer(layer))),
            PropertyParent::Group(group) => match self.properties.get(&group) {
                Some(p) if p.is_group() => Ok(p.layer),
                Some(_) => Err(ModelError::NotAGroup(group)),
                None => Err(ModelError::Unknown(Reference::Property(group))),
            },
        }
    }

    fn attach_property(
        &mut self,
        parent: PropertyParent,
        name: String,
        kind: PropertyKind,
    ) -> Result<PropertyId, ModelError> {
        let layer = self.parent_layer(parent)?;
        let id = PropertyId::new();

        // parent_layer validated both branches above
        match parent {
            PropertyParent::Layer(layer) => {
                if let Some(l) = self.layers.get_mut(&layer) {
                    l.properties.push(id);
                }
            }
            PropertyParent::Group(group) => {
                if let Some(Property {
                    kind: PropertyKind::Group { properties },
                    ..
                }) = self.properties.get_mut(&group)
                {
                    properties.push(id);
                }
            }
        }

        self.properties.insert(
            id,
            Property {
                id,
                layer,
                name,
                kind,
            },
        );
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer_with_group() -> (Snapshot, LayerId, PropertyId) {
        let mut snapshot = Snapshot::new();
        let comp = snapshot.add_composition("main");
        let layer = snapshot.add_layer(comp, "shape").unwrap();
        let group = snapshot.add_group(layer, "transform").unwrap();
        (snapshot, layer, group)
    }

    #[test]
    fn compound_gets_fixed_leaves() {
        let (mut snapshot, layer, _) = layer_with_group();
        let position = snapshot.add_compound(layer, "position", CompoundKind::Vec2).unwrap();

        let property = snapshot.property(position).unwrap();
        assert_eq!(property.children().len(), 2);
        for child in property.children() {
            let leaf = snapshot.property(*child).unwrap();
            assert!(leaf.is_leaf());
            assert_eq!(leaf.layer, layer);
        }
        // Sub-leaves are not top-level properties of the layer.
        assert_eq!(snapshot.layer(layer).unwrap().properties.len(), 2);
    }

    #[test]
    fn properties_only_nest_in_groups() {
        let (mut snapshot, layer, group) = layer_with_group();
        let leaf = snapshot.add_leaf(layer, "opacity", ValueType::Number).unwrap();

        let err = snapshot
            .add_leaf(PropertyParent::Group(leaf), "nested", ValueType::Number)
            .unwrap_err();
        assert_eq!(err, ModelError::NotAGroup(leaf));

        let member = snapshot
            .add_leaf(PropertyParent::Group(group), "rotation", ValueType::Number)
            .unwrap();
        assert_eq!(snapshot.property(group).unwrap().children(), [member]);
    }

    #[test]
    fn group_reference_yields_children() {
        let (mut snapshot, _, group) = layer_with_group();
        let a = snapshot.add_leaf(PropertyParent::Group(group), "a", ValueType::Number).unwrap();
        let c = snapshot
            .add_compound(PropertyParent::Group(group), "c", CompoundKind::Vec2)
            .unwrap();

        assert_eq!(snapshot.referenced_property_ids(group), [a, c]);
        assert_eq!(snapshot.referenced_property_ids(a), [a]);
        assert!(snapshot.referenced_property_ids(PropertyId::new()).is_empty());

        let leaves = snapshot.property(c).unwrap().children().to_vec();
        assert_eq!(
            snapshot.contained_property_ids(group),
            [group, a, c, leaves[0], leaves[1]]
        );
    }

    #[test]
    fn layer_accepts_one_graph() {
        let (mut snapshot, layer, _) = layer_with_group();
        let graph = snapshot.add_graph(GraphBinding::Layer(layer)).unwrap();
        assert_eq!(snapshot.layer(layer).unwrap().graph, Some(graph));

        let err = snapshot.add_graph(GraphBinding::Layer(layer)).unwrap_err();
        assert_eq!(err, ModelError::LayerHasGraph { layer, graph });
    }

    #[test]
    fn property_graph_belongs_to_property_layer() {
        let (mut snapshot, layer, _) = layer_with_group();
        let opacity = snapshot.add_leaf(layer, "opacity", ValueType::Number).unwrap();
        let graph = snapshot.add_graph(GraphBinding::Property(opacity)).unwrap();
        assert_eq!(snapshot.graph_layer(graph), Some(layer));
    }

    #[test]
    fn connect_validates_sockets() {
        let (mut snapshot, layer, _) = layer_with_group();
        let graph = snapshot.add_graph(GraphBinding::Layer(layer)).unwrap();
        let a = snapshot.add_node(graph, NodeKind::NumberInput).unwrap();
        let b = snapshot.add_node(graph, NodeKind::NumberCap).unwrap();

        snapshot.connect(a, 0, b, 2).unwrap();
        assert_eq!(snapshot.inputs_referencing(a), [(b, 2)]);

        assert_eq!(
            snapshot.connect(a, 3, b, 0),
            Err(ModelError::OutputOutOfRange { node: a, index: 3 })
        );
        assert_eq!(
            snapshot.connect(a, 0, b, 9),
            Err(ModelError::InputOutOfRange { node: b, index: 9 })
        );

        snapshot.disconnect(b, 2).unwrap();
        assert!(snapshot.inputs_referencing(a).is_empty());
    }

    #[test]
    fn output_nodes_in_membership_order() {
        let (mut snapshot, layer, _) = layer_with_group();
        let graph = snapshot.add_graph(GraphBinding::Layer(layer)).unwrap();
        let first = snapshot
            .add_node(graph, NodeKind::PropertyOutput { property: None })
            .unwrap();
        snapshot.add_node(graph, NodeKind::NumberInput).unwrap();
        let second = snapshot
            .add_node(graph, NodeKind::PropertyOutput { property: None })
            .unwrap();

        let graph = snapshot.graph(graph).unwrap();
        let outputs: Vec<_> = snapshot.output_nodes(graph).map(Node::id).collect();
        assert_eq!(outputs, [first, second]);
    }

    #[test]
    fn loaded_snapshot_hands_out_fresh_ids() {
        let (mut snapshot, layer, _) = layer_with_group();
        let graph = snapshot.add_graph(GraphBinding::Layer(layer)).unwrap();
        let original = snapshot.add_node(graph, NodeKind::NumberInput).unwrap();

        // Renumber the node to an id this process has not issued, as a
        // snapshot written by another process would.
        let far = NodeId::new().raw() + 1_000;
        let mut value: serde_json::Value =
            serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        let mut node = value["nodes"]
            .as_object_mut()
            .unwrap()
            .remove(&original.raw().to_string())
            .unwrap();
        node["id"] = far.into();
        value["nodes"][far.to_string()] = node;
        value["graphs"][graph.raw().to_string()]["nodes"] = serde_json::json!([far]);

        let mut loaded = Snapshot::from_json(&value.to_string()).unwrap();
        let far = NodeId::from(far);
        let fresh = loaded.add_node(graph, NodeKind::Composition).unwrap();

        assert!(fresh > far);
        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.node(far).unwrap().kind(), &NodeKind::NumberInput);
        assert_eq!(loaded.graph(graph).unwrap().nodes, [far, fresh]);
    }

    #[test]
    fn attach_refuses_present_id() {
        let (mut snapshot, layer, _) = layer_with_group();
        let graph = snapshot.add_graph(GraphBinding::Layer(layer)).unwrap();
        let id = snapshot.add_node(graph, NodeKind::NumberInput).unwrap();
        let copy = snapshot.node(id).unwrap().clone();

        assert_eq!(
            snapshot.attach_node(graph, copy),
            Err(ModelError::DuplicateId(Reference::Node(id)))
        );
        assert_eq!(snapshot.graph(graph).unwrap().nodes, [id]);
    }

    #[test]
    fn snapshot_survives_msgpack_and_json() {
        let (mut snapshot, layer, _) = layer_with_group();
        let graph = snapshot.add_graph(GraphBinding::Layer(layer)).unwrap();
        snapshot
            .add_node(graph, NodeKind::Expression { expression: "x * 2".into() })
            .unwrap();

        let bytes = snapshot.to_msgpack().unwrap();
        assert_eq!(Snapshot::from_msgpack(&bytes).unwrap(), snapshot);

        let json = snapshot.to_json().unwrap();
        assert_eq!(Snapshot::from_json(&json).unwrap(), snapshot);
    }
}
