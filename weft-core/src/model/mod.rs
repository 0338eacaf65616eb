//! Graph Data Model
//!
//! This module defines the shapes the resolver reads: compositions made of
//! layers, layers owning properties and at most one graph, and graphs listing
//! nodes whose inputs point at other nodes' outputs.
//!
//! # Ownership
//!
//! Everything lives flat in a [`Snapshot`], keyed by id. Relations are ids,
//! not references:
//!
//! - a graph lists its node ids, and each node names its graph,
//! - a layer names its graph and its top-level property ids,
//! - a compound or group names its child property ids.
//!
//! The model performs no validation beyond what its construction API makes
//! unrepresentable. Structural violations in a snapshot that was built some
//! other way (deserialized, for example) surface as resolver errors.

mod composition;
mod ids;
mod node;
mod property;
mod snapshot;

pub use composition::{Composition, Graph, GraphBinding, Layer};
pub use ids::{CompositionId, GraphId, LayerId, NodeId, PropertyId};
pub use node::{Input, Node, NodeKind, Output, OutputPointer, ValueType};
pub use property::{CompoundKind, Property, PropertyKind};
pub use snapshot::{PropertyParent, Snapshot};
