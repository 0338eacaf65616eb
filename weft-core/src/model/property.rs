//! Layer Properties
//!
//! Properties come in three shapes:
//!
//! - a *leaf* holds a single animatable value,
//! - a *compound* bundles a fixed set of leaves decided by its
//!   [`CompoundKind`] (a 2D vector is two numeric leaves),
//! - a *group* is a user-extensible list of leaves and compounds.
//!
//! Groups never contain groups. The construction API on
//! [`Snapshot`](super::Snapshot) only attaches groups directly to layers, so
//! that invariant cannot be broken through it.

use serde::{Deserialize, Serialize};

use super::ids::{LayerId, PropertyId};
use super::node::ValueType;

/// The fixed shapes a compound property can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompoundKind {
    Vec2,
    Rect,
    Color,
}

impl CompoundKind {
    /// Names of the leaf sub-properties, in order.
    pub fn leaf_names(&self) -> &'static [&'static str] {
        match self {
            CompoundKind::Vec2 => &["x", "y"],
            CompoundKind::Rect => &["left", "top", "width", "height"],
            CompoundKind::Color => &["r", "g", "b", "a"],
        }
    }
}

/// The variant-specific part of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyKind {
    Leaf {
        value_type: ValueType,
    },
    Compound {
        kind: CompoundKind,
        properties: Vec<PropertyId>,
    },
    Group {
        properties: Vec<PropertyId>,
    },
}

/// A property of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    /// The layer that owns this property.
    pub layer: LayerId,
    pub name: String,
    pub kind: PropertyKind,
}

impl Property {
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, PropertyKind::Leaf { .. })
    }

    pub fn is_group(&self) -> bool {
        matches!(self.kind, PropertyKind::Group { .. })
    }

    /// Direct children: the sub-leaves of a compound or the members of a
    /// group. Leaves have none.
    pub fn children(&self) -> &[PropertyId] {
        match &self.kind {
            PropertyKind::Leaf { .. } => &[],
            PropertyKind::Compound { properties, .. } | PropertyKind::Group { properties } => {
                properties
            }
        }
    }
}
