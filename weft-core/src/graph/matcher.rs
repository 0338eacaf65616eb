//! Property Reference Matcher
//!
//! Decides whether a property output node writes to a property that a
//! property input node elsewhere reads. Writing to a compound writes its
//! sub-leaves; writing to a group writes its members and their sub-leaves.

use crate::model::{Node, NodeKind, PropertyId, PropertyKind, Snapshot};

/// Whether `output` writes (part of) the property `query`.
///
/// Returns false for nodes that are not property outputs, for outputs with
/// no property selected, and for selections missing from the snapshot.
pub fn affects(query: PropertyId, output: &Node, snapshot: &Snapshot) -> bool {
    let NodeKind::PropertyOutput {
        property: Some(target),
    } = output.kind()
    else {
        return false;
    };
    let Some(target) = snapshot.property(*target) else {
        return false;
    };

    match &target.kind {
        PropertyKind::Leaf { .. } => target.id == query,
        PropertyKind::Compound { properties, .. } => {
            target.id == query || properties.contains(&query)
        }
        PropertyKind::Group { properties } => properties
            .iter()
            .filter_map(|id| snapshot.property(*id))
            .any(|member| match &member.kind {
                PropertyKind::Leaf { .. } => member.id == query,
                PropertyKind::Compound { properties, .. } => {
                    member.id == query || properties.contains(&query)
                }
                // Groups never nest.
                PropertyKind::Group { .. } => false,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CompoundKind, GraphBinding, GraphId, PropertyParent, ValueType};

    struct Fixture {
        snapshot: Snapshot,
        graph: GraphId,
        group: PropertyId,
        compound: PropertyId,
        x: PropertyId,
        y: PropertyId,
        z: PropertyId,
        w: PropertyId,
    }

    fn fixture() -> Fixture {
        let mut snapshot = Snapshot::new();
        let comp = snapshot.add_composition("main");
        let layer = snapshot.add_layer(comp, "l1").unwrap();
        let group = snapshot.add_group(layer, "g").unwrap();
        let compound = snapshot
            .add_compound(PropertyParent::Group(group), "c", CompoundKind::Vec2)
            .unwrap();
        let z = snapshot
            .add_leaf(PropertyParent::Group(group), "z", ValueType::Number)
            .unwrap();
        let w = snapshot.add_leaf(layer, "w", ValueType::Number).unwrap();
        let leaves = snapshot.property(compound).unwrap().children().to_vec();
        let graph = snapshot.add_graph(GraphBinding::Layer(layer)).unwrap();

        Fixture {
            snapshot,
            graph,
            group,
            compound,
            x: leaves[0],
            y: leaves[1],
            z,
            w,
        }
    }

    fn output_for(f: &mut Fixture, property: Option<PropertyId>) -> Node {
        let id = f
            .snapshot
            .add_node(f.graph, NodeKind::PropertyOutput { property })
            .unwrap();
        f.snapshot.node(id).unwrap().clone()
    }

    #[test]
    fn group_output_affects_members_and_sub_leaves() {
        let mut f = fixture();
        let target = Some(f.group);
        let output = output_for(&mut f, target);

        for query in [f.x, f.y, f.z, f.compound] {
            assert!(affects(query, &output, &f.snapshot));
        }
        assert!(!affects(f.w, &output, &f.snapshot));
    }

    #[test]
    fn compound_output_affects_itself_and_sub_leaves() {
        let mut f = fixture();
        let target = Some(f.compound);
        let output = output_for(&mut f, target);

        assert!(affects(f.compound, &output, &f.snapshot));
        assert!(affects(f.x, &output, &f.snapshot));
        assert!(!affects(f.z, &output, &f.snapshot));
    }

    #[test]
    fn leaf_output_matches_only_itself() {
        let mut f = fixture();
        let target = Some(f.w);
        let output = output_for(&mut f, target);

        assert!(affects(f.w, &output, &f.snapshot));
        assert!(!affects(f.z, &output, &f.snapshot));
    }

    #[test]
    fn unselected_or_foreign_nodes_affect_nothing() {
        let mut f = fixture();
        let unselected = output_for(&mut f, None);
        assert!(!affects(f.w, &unselected, &f.snapshot));

        let missing = output_for(&mut f, Some(PropertyId::new()));
        assert!(!affects(f.w, &missing, &f.snapshot));

        let input = Node::new(
            f.graph,
            NodeKind::PropertyInput {
                layer: None,
                property: Some(f.w),
            },
        );
        assert!(!affects(f.w, &input, &f.snapshot));
    }
}
