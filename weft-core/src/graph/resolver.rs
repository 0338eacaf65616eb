//! Dependency Resolver
//!
//! Walks every layer graph of a composition depth first, starting at the
//! graph's property output nodes, and emits each node after everything it
//! depends on (post-order). The walk produces:
//!
//! - the compute order,
//! - the forward edges (who reads from whom), including edges into nodes that
//!   were already resolved by an earlier descent,
//! - the compiled expressions of every reached expression node,
//! - the reached time sources and the frame-varying properties derived from
//!   them.
//!
//! # Cycles
//!
//! Two visited sets are kept. The pass-wide set stops a node from being
//! resolved twice. The trip set holds the nodes on the current descent path
//! only; each call extends a copy of it for its own descendants, so siblings
//! sharing an ancestor never see each other. Reaching a node that is on the
//! current trip is a cycle.
//!
//! # Cross-layer edges
//!
//! A property input node that reads a property of another layer depends on
//! every property output node of that layer's graph that writes (part of)
//! that property. Those output nodes are resolved first, on the same trip,
//! which threads all layer graphs into one order.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use super::edges::ForwardEdges;
use super::frame::frame_varying_properties;
use super::matcher::affects;
use super::order::ComputeOrder;
use crate::config::{DanglingPolicy, ResolveOptions};
use crate::error::{CompileError, Reference, ResolveError};
use crate::jit::{CompiledExpression, ExpressionCache, ExpressionCompiler, JitCompiler};
use crate::model::{
    Composition, CompositionId, Graph, GraphId, LayerId, Node, NodeId, NodeKind, PropertyId,
    Snapshot,
};

/// Nodes on the current descent path.
type Trip = HashSet<NodeId>;

/// The result of a successful resolution pass.
#[derive(Debug)]
pub struct Resolution<E> {
    /// Every reachable node, dependencies first.
    pub order: ComputeOrder,
    /// For each node, the nodes that read from it.
    pub forward_edges: ForwardEdges,
    /// Compiled handles of the reached expression nodes.
    pub expressions: IndexMap<NodeId, E>,
    /// Reached nodes that emit the frame index.
    pub time_sources: Vec<NodeId>,
    /// Per layer, the properties that must be recomputed on every frame.
    pub frame_varying: IndexMap<LayerId, Vec<PropertyId>>,
    /// For each property id, the property input nodes reading it.
    pub inputs_by_property: IndexMap<PropertyId, Vec<NodeId>>,
}

impl<E> Resolution<E> {
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.order.index_of(node)
    }

    pub fn compare(&self, a: NodeId, b: NodeId) -> std::cmp::Ordering {
        self.order.compare(a, b)
    }

    pub fn is_frame_varying(&self, layer: LayerId, property: PropertyId) -> bool {
        self.frame_varying
            .get(&layer)
            .is_some_and(|ids| ids.contains(&property))
    }

    /// Nodes reading `property` through a property input node.
    pub fn affected_inputs(&self, property: PropertyId) -> &[NodeId] {
        self.inputs_by_property
            .get(&property)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The diamond-safe recompute subset after `changed` changed.
    pub fn recompute_plan(&self, changed: &[NodeId]) -> Vec<NodeId> {
        self.order.recompute_plan(&self.forward_edges, changed)
    }
}

/// Resolves compositions of one snapshot.
pub struct Resolver<'s, C = JitCompiler> {
    snapshot: &'s Snapshot,
    options: ResolveOptions,
    compiler: C,
}

impl<'s> Resolver<'s> {
    /// Create a resolver compiling expressions with Cranelift for the host.
    pub fn new(snapshot: &'s Snapshot, options: ResolveOptions) -> Result<Self, CompileError> {
        let compiler = JitCompiler::new(&options.jit)?;
        Ok(Self::with_compiler(snapshot, options, compiler))
    }
}

impl<'s, C: ExpressionCompiler> Resolver<'s, C> {
    pub fn with_compiler(snapshot: &'s Snapshot, options: ResolveOptions, compiler: C) -> Self {
        Self {
            snapshot,
            options,
            compiler,
        }
    }

    /// Run one resolution pass over `composition`.
    ///
    /// Any error aborts the pass; no partial result is returned.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn resolve(
        &self,
        composition: CompositionId,
    ) -> Result<Resolution<C::Compiled>, ResolveError> {
        let snapshot = self.snapshot;
        let composition = snapshot
            .composition(composition)
            .ok_or(ResolveError::UnknownComposition(composition))?;

        let mut pass = Pass::new(snapshot, self.options.dangling, &self.compiler);
        let graphs = pass.attached_graphs(composition)?;

        for graph in graphs {
            for output in snapshot.output_nodes(graph) {
                pass.visit(output, &Trip::new())?;
            }
        }

        Ok(pass.finish())
    }
}

/// Resolve `composition` with default options and the host JIT.
pub fn resolve(
    snapshot: &Snapshot,
    composition: CompositionId,
) -> Result<Resolution<CompiledExpression>, ResolveError> {
    Resolver::new(snapshot, ResolveOptions::default())
        .map_err(ResolveError::CompilerUnavailable)?
        .resolve(composition)
}

/// State of a single resolution pass.
struct Pass<'p, C: ExpressionCompiler> {
    snapshot: &'p Snapshot,
    dangling: DanglingPolicy,
    visited: HashMap<GraphId, HashSet<NodeId>>,
    order: Vec<NodeId>,
    edges: ForwardEdges,
    cache: ExpressionCache<&'p C>,
    time_sources: Vec<NodeId>,
    inputs_by_property: IndexMap<PropertyId, Vec<NodeId>>,
}

impl<'p, C: ExpressionCompiler> Pass<'p, C> {
    fn new(snapshot: &'p Snapshot, dangling: DanglingPolicy, compiler: &'p C) -> Self {
        Self {
            snapshot,
            dangling,
            visited: HashMap::new(),
            order: Vec::new(),
            edges: ForwardEdges::new(),
            cache: ExpressionCache::new(compiler),
            time_sources: Vec::new(),
            inputs_by_property: IndexMap::new(),
        }
    }

    /// The graphs attached to the layers of `composition`, in layer order.
    ///
    /// Every member node gets a forward edge entry up front.
    fn attached_graphs(
        &mut self,
        composition: &'p Composition,
    ) -> Result<Vec<&'p Graph>, ResolveError> {
        let snapshot = self.snapshot;
        let mut graphs = Vec::new();

        for &layer_id in &composition.layers {
            let Some(layer) = snapshot.layer(layer_id) else {
                let origin = Reference::Composition(composition.id);
                self.dangling(origin, Reference::Layer(layer_id))?;
                continue;
            };
            let Some(graph_id) = layer.graph else {
                continue;
            };
            let Some(graph) = snapshot.graph(graph_id) else {
                self.dangling(Reference::Layer(layer_id), Reference::Graph(graph_id))?;
                continue;
            };

            for &member in &graph.nodes {
                match snapshot.node(member) {
                    Some(node) => {
                        check_membership(graph, node)?;
                        self.edges.ensure(member);
                    }
                    None => self.dangling(Reference::Graph(graph_id), Reference::Node(member))?,
                }
            }
            graphs.push(graph);
        }

        Ok(graphs)
    }

    fn visit(&mut self, node: &'p Node, trip: &Trip) -> Result<(), ResolveError> {
        let id = node.id();

        let visited = self.visited.entry(node.graph_id()).or_default();
        if !visited.insert(id) {
            if trip.contains(&id) {
                return Err(ResolveError::CircularDependency(id));
            }
            return Ok(());
        }
        tracing::trace!(node = %id, kind = node.kind().label(), "visit");

        let mut trip = trip.clone();
        trip.insert(id);

        for pointer in node.pointers() {
            let Some(dependency) = self.lookup_node(Reference::Node(id), pointer.node)? else {
                continue;
            };
            if dependency.graph_id() != node.graph_id() {
                return Err(ResolveError::CrossGraphPointer {
                    node: id,
                    target: pointer.node,
                });
            }
            if pointer.output >= dependency.outputs().len() {
                let target = Reference::Output {
                    node: pointer.node,
                    output: pointer.output,
                };
                self.dangling(Reference::Node(id), target)?;
                continue;
            }
            self.edges.record(pointer.node, id);
            self.visit(dependency, &trip)?;
        }

        if node.kind().is_frame_source() {
            self.time_sources.push(id);
        }

        match node.kind() {
            NodeKind::PropertyInput { layer, property } => {
                self.visit_property_input(node, *layer, *property, &trip)?;
            }
            NodeKind::PropertyOutput {
                property: Some(property),
            } => {
                if self.snapshot.property(*property).is_none() {
                    self.dangling(Reference::Node(id), Reference::Property(*property))?;
                }
            }
            NodeKind::Expression { expression } => {
                let names: Vec<&str> =
                    node.inputs().iter().map(|input| input.name.as_str()).collect();
                self.cache
                    .get_or_compile(id, expression, &names)
                    .map_err(|reason| ResolveError::ExpressionCompilation { node: id, reason })?;
            }
            NodeKind::PropertyOutput { property: None }
            | NodeKind::Composition
            | NodeKind::Empty
            | NodeKind::ArrayModifierIndex
            | NodeKind::NumberInput
            | NodeKind::NumberCap
            | NodeKind::NumberLerp
            | NodeKind::DegToRad
            | NodeKind::RadToDeg
            | NodeKind::Vec2Input
            | NodeKind::Vec2Add
            | NodeKind::Vec2Factors
            | NodeKind::Vec2Lerp
            | NodeKind::ColorInput
            | NodeKind::ColorFromRgbaFactors
            | NodeKind::ColorToRgbaFactors
            | NodeKind::RectTranslate => {}
        }

        self.order.push(id);
        Ok(())
    }

    /// Thread a property input node into the output nodes of the layer it
    /// reads from. Reads from the node's own layer use the raw property
    /// value and add no edges.
    fn visit_property_input(
        &mut self,
        node: &'p Node,
        layer: Option<LayerId>,
        property: Option<PropertyId>,
        trip: &Trip,
    ) -> Result<(), ResolveError> {
        let snapshot = self.snapshot;
        let origin = Reference::Node(node.id());

        let Some(property) = property else {
            return Ok(());
        };
        if snapshot.property(property).is_none() {
            return self.dangling(origin, Reference::Property(property));
        }
        for referenced in snapshot.referenced_property_ids(property) {
            self.inputs_by_property
                .entry(referenced)
                .or_default()
                .push(node.id());
        }

        let Some(layer_id) = layer else {
            return Ok(());
        };
        if snapshot.graph_layer(node.graph_id()) == Some(layer_id) {
            return Ok(());
        }
        let Some(target) = snapshot.layer(layer_id) else {
            return self.dangling(origin, Reference::Layer(layer_id));
        };
        let Some(graph_id) = target.graph else {
            return Ok(());
        };
        let Some(graph) = snapshot.graph(graph_id) else {
            return self.dangling(Reference::Layer(layer_id), Reference::Graph(graph_id));
        };

        for output in snapshot.output_nodes(graph) {
            check_membership(graph, output)?;
            if !affects(property, output, snapshot) {
                continue;
            }
            self.edges.record(output.id(), node.id());
            self.visit(output, trip)?;
        }
        Ok(())
    }

    fn lookup_node(
        &self,
        origin: Reference,
        id: NodeId,
    ) -> Result<Option<&'p Node>, ResolveError> {
        match self.snapshot.node(id) {
            Some(node) => Ok(Some(node)),
            None => self.dangling(origin, Reference::Node(id)).map(|()| None),
        }
    }

    /// Apply the dangling reference policy. `Ok` means skip and continue.
    fn dangling(&self, origin: Reference, target: Reference) -> Result<(), ResolveError> {
        match self.dangling {
            DanglingPolicy::Fail => Err(ResolveError::DanglingReference { origin, target }),
            DanglingPolicy::Ignore => {
                tracing::warn!(%origin, %target, "ignoring dangling reference");
                Ok(())
            }
        }
    }

    fn finish(self) -> Resolution<C::Compiled> {
        let frame_varying =
            frame_varying_properties(self.snapshot, &self.time_sources, &self.edges);

        let resolution = Resolution {
            order: ComputeOrder::new(self.order),
            forward_edges: self.edges,
            expressions: self.cache.into_compiled(),
            time_sources: self.time_sources,
            frame_varying,
            inputs_by_property: self.inputs_by_property,
        };

        tracing::debug!(
            nodes = resolution.order.len(),
            edges = resolution.forward_edges.edge_count(),
            expressions = resolution.expressions.len(),
            frame_varying = resolution.frame_varying.values().map(Vec::len).sum::<usize>(),
            "resolved composition"
        );
        resolution
    }
}

fn check_membership(graph: &Graph, node: &Node) -> Result<(), ResolveError> {
    if node.graph_id() == graph.id {
        return Ok(());
    }
    Err(ResolveError::GraphMismatch {
        node: node.id(),
        listed_by: graph.id,
        claims: node.graph_id(),
    })
}
