//! Dependency Graph
//!
//! This module turns the per-layer node graphs of a composition into one
//! global evaluation order.
//!
//! # Overview
//!
//! Inside a graph, an edge runs from the node an input points at to the node
//! owning the input. Across graphs, an edge runs from a property output node
//! to every property input node on another layer that reads the property it
//! writes.
//!
//! - `resolver` walks the graphs depth first and builds the order and edges
//! - `matcher` decides whether an output node writes a queried property
//! - `frame` finds the properties driven by the frame index
//! - `order` answers position queries and sorts recompute subsets
//!
//! # Design Decisions
//!
//! 1. A pass borrows the [`Snapshot`](crate::model::Snapshot) immutably and
//!    owns all of its working state, so passes are independent of each other.
//!
//! 2. Forward edges are kept in insertion order, which makes the result of a
//!    pass a pure function of the snapshot.

mod edges;
mod frame;
mod matcher;
mod order;
mod resolver;

pub use edges::ForwardEdges;
pub use frame::frame_varying_properties;
pub use matcher::affects;
pub use order::ComputeOrder;
pub use resolver::{resolve, Resolution, Resolver};
