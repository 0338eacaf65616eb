//! Frame-Time Propagation
//!
//! Finds the properties whose value depends on the frame index. Those cannot
//! be cached between frames and have to be recomputed on every frame change.

use indexmap::{IndexMap, IndexSet};

use super::edges::ForwardEdges;
use crate::model::{LayerId, NodeId, NodeKind, PropertyId, Snapshot};

/// Properties downstream of any of `time_sources`, grouped by layer.
///
/// A property is frame varying when a property input node that reads it (or
/// a group or compound containing it) is reachable over `edges` from a time
/// source. Layers and properties appear in discovery order.
pub fn frame_varying_properties(
    snapshot: &Snapshot,
    time_sources: &[NodeId],
    edges: &ForwardEdges,
) -> IndexMap<LayerId, Vec<PropertyId>> {
    let mut by_layer: IndexMap<LayerId, IndexSet<PropertyId>> = IndexMap::new();

    for node in edges.downstream(time_sources.iter().copied()) {
        let Some(NodeKind::PropertyInput {
            property: Some(property),
            ..
        }) = snapshot.node(node).map(|n| n.kind())
        else {
            continue;
        };

        for id in snapshot.contained_property_ids(*property) {
            if let Some(p) = snapshot.property(id) {
                by_layer.entry(p.layer).or_default().insert(id);
            }
        }
    }

    by_layer
        .into_iter()
        .map(|(layer, ids)| (layer, ids.into_iter().collect()))
        .collect()
}
