//! Forward Edges
//!
//! The inverse of the pointer relation: for every node, the nodes that read
//! from it. Edges are recorded by the resolver as it discovers them, which
//! includes edges into nodes it does not descend into again.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;

use crate::model::NodeId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardEdges {
    next: IndexMap<NodeId, Vec<NodeId>>,
}

impl ForwardEdges {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `node` has an entry, even if nothing depends on it.
    pub fn ensure(&mut self, node: NodeId) {
        self.next.entry(node).or_default();
    }

    /// Add a dependency edge: `dependent` reads from `dependency`.
    pub fn record(&mut self, dependency: NodeId, dependent: NodeId) {
        let dependents = self.next.entry(dependency).or_default();
        if !dependents.contains(&dependent) {
            dependents.push(dependent);
        }
        self.ensure(dependent);
    }

    /// Nodes that read directly from `node`, in discovery order.
    pub fn dependents(&self, node: NodeId) -> &[NodeId] {
        self.next.get(&node).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.next.contains_key(&node)
    }

    /// Number of nodes with an entry.
    pub fn node_count(&self) -> usize {
        self.next.len()
    }

    pub fn edge_count(&self) -> usize {
        self.next.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &[NodeId])> + '_ {
        self.next.iter().map(|(node, next)| (*node, next.as_slice()))
    }

    /// Every node transitively downstream of `sources`, breadth first.
    ///
    /// A source only appears in the result if it is itself downstream of
    /// another source.
    pub fn downstream(&self, sources: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
        let mut reached = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        for source in sources {
            queue.extend(self.dependents(source).iter().copied());
        }

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            reached.push(node);
            queue.extend(self.dependents(node).iter().copied());
        }

        reached
    }
}
