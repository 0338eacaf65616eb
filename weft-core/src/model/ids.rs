//! Identifiers
//!
//! Every entity in a snapshot is addressed by a small `Copy` id. Ids are
//! generated from process-wide counters, so two snapshots built in the same
//! process never hand out the same id twice. Loading a snapshot moves the
//! counters past every id it contains.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Generate a new unique id.
            pub fn new() -> Self {
                Self(Self::counter().fetch_add(1, Ordering::Relaxed))
            }

            /// Make sure ids generated from now on are greater than this one.
            pub(crate) fn reserve(&self) {
                Self::counter().fetch_max(self.0.saturating_add(1), Ordering::Relaxed);
            }

            fn counter() -> &'static AtomicU64 {
                static COUNTER: AtomicU64 = AtomicU64::new(0);
                &COUNTER
            }

            /// Get the raw id value.
            pub fn raw(&self) -> u64 {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

define_id!(
    /// Unique identifier for a node in a graph.
    NodeId,
    "node"
);
define_id!(
    /// Unique identifier for a graph.
    GraphId,
    "graph"
);
define_id!(
    /// Unique identifier for a layer.
    LayerId,
    "layer"
);
define_id!(
    /// Unique identifier for a property (leaf, compound or group).
    PropertyId,
    "property"
);
define_id!(
    /// Unique identifier for a composition.
    CompositionId,
    "composition"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = NodeId::new();
        let b = NodeId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn reserve_moves_counter_past_id() {
        let far = GraphId::from(GraphId::new().raw() + 500);
        far.reserve();
        assert!(GraphId::new() > far);

        // Reserving a smaller id never moves the counter back.
        GraphId::from(0).reserve();
        assert!(GraphId::new() > far);
    }

    #[test]
    fn display_carries_kind_prefix() {
        assert_eq!(NodeId::from(7).to_string(), "node#7");
        assert_eq!(PropertyId::from(3).to_string(), "property#3");
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&LayerId::from(42)).unwrap();
        assert_eq!(json, "42");
        let back: LayerId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.raw(), 42);
    }
}
