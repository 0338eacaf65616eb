//! Resolution benchmarks.
//!
//! Each layer reads the previous layer's output property, so every pass
//! threads one long cross-layer chain.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use weft_core::model::{
    CompositionId, GraphBinding, LayerId, NodeKind, PropertyId, Snapshot, ValueType,
};
use weft_core::{ResolveOptions, Resolver};

fn layer_chain(layers: usize) -> (Snapshot, CompositionId) {
    let mut snapshot = Snapshot::new();
    let comp = snapshot.add_composition("bench");
    let mut previous: Option<(LayerId, PropertyId)> = None;

    for i in 0..layers {
        let layer = snapshot.add_layer(comp, format!("layer {i}")).unwrap();
        let value = snapshot.add_leaf(layer, "value", ValueType::Number).unwrap();
        let graph = snapshot.add_graph(GraphBinding::Layer(layer)).unwrap();

        let source = match previous {
            Some((layer, property)) => {
                let node = snapshot
                    .add_node(
                        graph,
                        NodeKind::PropertyInput {
                            layer: Some(layer),
                            property: Some(property),
                        },
                    )
                    .unwrap();
                snapshot.add_output(node, "Value", ValueType::Number).unwrap();
                node
            }
            None => snapshot.add_node(graph, NodeKind::Composition).unwrap(),
        };

        let expr = snapshot
            .add_node(graph, NodeKind::Expression { expression: "v * 0.5 + 1".into() })
            .unwrap();
        snapshot.add_input(expr, "v", ValueType::Number).unwrap();
        let out = snapshot
            .add_node(graph, NodeKind::PropertyOutput { property: Some(value) })
            .unwrap();
        snapshot.add_input(out, "Value", ValueType::Number).unwrap();

        snapshot.connect(source, 0, expr, 0).unwrap();
        snapshot.connect(expr, 0, out, 0).unwrap();
        previous = Some((layer, value));
    }

    (snapshot, comp)
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");

    for layers in [10, 50, 200] {
        let (snapshot, comp) = layer_chain(layers);
        let resolver = Resolver::new(&snapshot, ResolveOptions::default()).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(layers), &comp, |b, comp| {
            b.iter(|| resolver.resolve(black_box(*comp)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolve);
criterion_main!(benches);
