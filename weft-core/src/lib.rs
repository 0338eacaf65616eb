//! Weft Core
//!
//! This crate decides in which order the node graphs of a layered, time-based
//! composition have to be evaluated. It implements:
//!
//! - The graph data model (compositions, layers, properties, graphs, nodes)
//! - Dependency resolution with cycle detection and cross-layer edges
//! - Frame-time propagation (which properties change with the frame index)
//! - JIT compilation of expression nodes via Cranelift
//!
//! Evaluating the nodes is left to the caller; this crate produces the order,
//! the edges and the compiled expressions an evaluator needs.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `model`: The snapshot of compositions and graphs a pass reads
//! - `graph`: Resolver, property matcher, frame analysis and compute order
//! - `jit`: Expression parsing and Cranelift code generation
//! - `config`: Resolution options
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::model::{GraphBinding, NodeKind, Snapshot, ValueType};
//!
//! let mut snapshot = Snapshot::new();
//! let comp = snapshot.add_composition("main");
//! let layer = snapshot.add_layer(comp, "circle")?;
//! let radius = snapshot.add_leaf(layer, "radius", ValueType::Number)?;
//! let graph = snapshot.add_graph(GraphBinding::Layer(layer))?;
//!
//! let clock = snapshot.add_node(graph, NodeKind::Composition)?;
//! let expression = "10 + frame / 2".into();
//! let expr = snapshot.add_node(graph, NodeKind::Expression { expression })?;
//! snapshot.add_input(expr, "frame", ValueType::Number)?;
//! let out = snapshot.add_node(graph, NodeKind::PropertyOutput { property: Some(radius) })?;
//! snapshot.add_input(out, "Value", ValueType::Number)?;
//! snapshot.connect(clock, 0, expr, 0)?;
//! snapshot.connect(expr, 0, out, 0)?;
//!
//! let resolution = weft_core::resolve(&snapshot, comp)?;
//! assert_eq!(resolution.order.as_slice(), [clock, expr, out]);
//! assert_eq!(resolution.expressions[&expr].call(&[4.0])?, 12.0);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod jit;
pub mod model;

pub use config::{DanglingPolicy, ResolveOptions};
pub use error::{CompileError, ModelError, ResolveError, SnapshotError};
pub use graph::{resolve, ComputeOrder, ForwardEdges, Resolution, Resolver};
pub use model::Snapshot;
