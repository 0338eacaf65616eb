//! Compute Order
//!
//! The final answer of a resolution pass: a linear order in which every node
//! comes after everything it reads from.
//!
//! When only part of a composition changes, callers recompute the nodes
//! downstream of the change. That subset has to be evaluated in compute
//! order. Given
//!
//! ```text
//! A -> B -> C
//!   \         \
//!    +-> D ----+-> E
//! ```
//!
//! walking down from `A` may reach `E` through `C` before `D` has been
//! recomputed, and `E` would read a stale `D`. Sorting the subset by
//! [`ComputeOrder::compare`] avoids that.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::edges::ForwardEdges;
use crate::model::NodeId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputeOrder {
    order: Vec<NodeId>,
    index: HashMap<NodeId, usize>,
}

impl ComputeOrder {
    pub fn new(order: Vec<NodeId>) -> Self {
        let index = order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        Self { order, index }
    }

    pub fn as_slice(&self) -> &[NodeId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.index.contains_key(&node)
    }

    /// Position of `node` in the order.
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.index.get(&node).copied()
    }

    /// Order two nodes by their position. Nodes outside the order sort last.
    pub fn compare(&self, a: NodeId, b: NodeId) -> Ordering {
        self.rank(a).cmp(&self.rank(b))
    }

    /// Sort a subset of nodes into compute order.
    pub fn sort(&self, nodes: &mut [NodeId]) {
        nodes.sort_by_key(|node| self.rank(*node));
    }

    /// The nodes to recompute after `changed` changed: the changed nodes
    /// themselves plus everything downstream of them, restricted to nodes in
    /// this order and sorted by it.
    pub fn recompute_plan(&self, edges: &ForwardEdges, changed: &[NodeId]) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut plan: Vec<NodeId> = changed
            .iter()
            .copied()
            .chain(edges.downstream(changed.iter().copied()))
            .filter(|node| self.contains(*node) && seen.insert(*node))
            .collect();
        self.sort(&mut plan);
        plan
    }

    fn rank(&self, node: NodeId) -> usize {
        self.index_of(node).unwrap_or(usize::MAX)
    }
}

impl<'a> IntoIterator for &'a ComputeOrder {
    type Item = &'a NodeId;
    type IntoIter = std::slice::Iter<'a, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<const N: usize>() -> [NodeId; N] {
        std::array::from_fn(|_| NodeId::new())
    }

    #[test]
    fn compare_follows_position() {
        let [a, b, c] = ids();
        let order = ComputeOrder::new(vec![a, b, c]);

        assert_eq!(order.index_of(b), Some(1));
        assert_eq!(order.compare(a, c), Ordering::Less);
        assert_eq!(order.compare(c, b), Ordering::Greater);
        assert_eq!(order.compare(b, b), Ordering::Equal);

        let outsider = NodeId::new();
        assert_eq!(order.index_of(outsider), None);
        assert_eq!(order.compare(outsider, c), Ordering::Greater);
    }

    #[test]
    fn diamond_recompute_plan_is_ordered() {
        // a -> b -> c -> e, a -> d -> e
        let [a, b, c, d, e] = ids();
        let mut edges = ForwardEdges::new();
        edges.record(a, b);
        edges.record(b, c);
        edges.record(c, e);
        edges.record(a, d);
        edges.record(d, e);
        let order = ComputeOrder::new(vec![a, b, c, d, e]);

        let plan = order.recompute_plan(&edges, &[a]);
        assert_eq!(plan, [a, b, c, d, e]);

        // Breadth-first discovery alone would put `e` before `c`.
        assert_eq!(edges.downstream([a]), [b, d, c, e]);

        let plan = order.recompute_plan(&edges, &[d]);
        assert_eq!(plan, [d, e]);
    }

    #[test]
    fn plan_skips_nodes_outside_the_order() {
        let [a, b, dead] = ids();
        let mut edges = ForwardEdges::new();
        edges.record(a, b);
        edges.record(a, dead);
        let order = ComputeOrder::new(vec![a, b]);

        assert_eq!(order.recompute_plan(&edges, &[a]), [a, b]);
    }
}
