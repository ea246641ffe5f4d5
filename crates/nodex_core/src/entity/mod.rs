//! Entity references.

mod id;

pub use id::EntityId;

use crate::types::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a node or relationship in the graph store.
///
/// Indexes pass entity references through untouched; the kind is only
/// checked against the kind an index was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Node or relationship.
    pub kind: EntityKind,
    /// Store identifier.
    pub id: EntityId,
}

impl EntityRef {
    /// Creates a reference to a node.
    #[must_use]
    pub const fn node(id: EntityId) -> Self {
        Self {
            kind: EntityKind::Node,
            id,
        }
    }

    /// Creates a reference to a relationship.
    #[must_use]
    pub const fn relationship(id: EntityId) -> Self {
        Self {
            kind: EntityKind::Relationship,
            id,
        }
    }

    /// Creates a reference to a new random node.
    #[must_use]
    pub fn new_node() -> Self {
        Self::node(EntityId::new())
    }

    /// Creates a reference to a new random relationship.
    #[must_use]
    pub fn new_relationship() -> Self {
        Self::relationship(EntityId::new())
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
