//! Typed entity identifiers
//!
//! Every entity is addressed by a typed id wrapping a process-unique counter
//! value. The counter is shared by all kinds, so two entities never carry the
//! same raw value. The display name of an entity is derived from its id.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entity::TopoEntity;

/// Id type bound to the entity kind it addresses
pub trait TypedId:
    Copy + Ord + Eq + fmt::Debug + fmt::Display + Into<EntityId> + Send + Sync + 'static
{
    type Entity: TopoEntity<Id = Self>;

    /// Entity kind addressed by this id type
    const KIND: EntityKind;

    /// Raw counter value
    fn raw(self) -> u64;

    /// Build an id from a raw counter value
    fn from_raw(raw: u64) -> Self;
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $entity:ident, $kind:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl TypedId for $name {
            type Entity = crate::entity::$entity;
            const KIND: EntityKind = EntityKind::$kind;

            fn raw(self) -> u64 {
                self.0
            }

            fn from_raw(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for EntityId {
            fn from(id: $name) -> Self {
                EntityId::$kind(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{:04}", $prefix, self.0)
            }
        }
    };
}

entity_id!(
    /// Id of a [`crate::entity::Vertex`]
    VertexId, Vertex, Vertex, "Vtx"
);
entity_id!(
    /// Id of a [`crate::entity::CoEdge`]
    CoEdgeId, CoEdge, CoEdge, "CoEdge"
);
entity_id!(
    /// Id of a [`crate::entity::Edge`]
    EdgeId, Edge, Edge, "Edge"
);
entity_id!(
    /// Id of a [`crate::entity::CoFace`]
    CoFaceId, CoFace, CoFace, "CoFace"
);
entity_id!(
    /// Id of a [`crate::entity::Face`]
    FaceId, Face, Face, "Face"
);
entity_id!(
    /// Id of a [`crate::entity::Block`]
    BlockId, Block, Block, "Block"
);

/// Entity kinds, ordered by dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Vertex,
    CoEdge,
    Edge,
    CoFace,
    Face,
    Block,
}

impl EntityKind {
    /// Topological dimension of the kind
    pub fn dim(&self) -> u8 {
        match self {
            EntityKind::Vertex => 0,
            EntityKind::CoEdge | EntityKind::Edge => 1,
            EntityKind::CoFace | EntityKind::Face => 2,
            EntityKind::Block => 3,
        }
    }

    /// Get display name for UI and reports
    pub fn display_name(&self) -> &'static str {
        match self {
            EntityKind::Vertex => "Vertex",
            EntityKind::CoEdge => "CoEdge",
            EntityKind::Edge => "Edge",
            EntityKind::CoFace => "CoFace",
            EntityKind::Face => "Face",
            EntityKind::Block => "Block",
        }
    }

    /// All kinds, leaves first
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::Vertex,
            EntityKind::CoEdge,
            EntityKind::Edge,
            EntityKind::CoFace,
            EntityKind::Face,
            EntityKind::Block,
        ]
    }
}

/// Id of any entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityId {
    Vertex(VertexId),
    CoEdge(CoEdgeId),
    Edge(EdgeId),
    CoFace(CoFaceId),
    Face(FaceId),
    Block(BlockId),
}

impl EntityId {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityId::Vertex(_) => EntityKind::Vertex,
            EntityId::CoEdge(_) => EntityKind::CoEdge,
            EntityId::Edge(_) => EntityKind::Edge,
            EntityId::CoFace(_) => EntityKind::CoFace,
            EntityId::Face(_) => EntityKind::Face,
            EntityId::Block(_) => EntityKind::Block,
        }
    }

    pub fn raw(&self) -> u64 {
        match self {
            EntityId::Vertex(id) => id.0,
            EntityId::CoEdge(id) => id.0,
            EntityId::Edge(id) => id.0,
            EntityId::CoFace(id) => id.0,
            EntityId::Face(id) => id.0,
            EntityId::Block(id) => id.0,
        }
    }

    pub fn dim(&self) -> u8 {
        self.kind().dim()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Vertex(id) => id.fmt(f),
            EntityId::CoEdge(id) => id.fmt(f),
            EntityId::Edge(id) => id.fmt(f),
            EntityId::CoFace(id) => id.fmt(f),
            EntityId::Face(id) => id.fmt(f),
            EntityId::Block(id) => id.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_names() {
        assert_eq!(VertexId(3).to_string(), "Vtx0003");
        assert_eq!(EntityId::from(CoFaceId(12)).to_string(), "CoFace0012");
    }

    #[test]
    fn test_kind_and_dim() {
        let id: EntityId = BlockId(1).into();
        assert_eq!(id.kind(), EntityKind::Block);
        assert_eq!(id.dim(), 3);
        assert_eq!(EntityId::from(EdgeId(1)).dim(), 1);
        assert_eq!(EntityKind::all().len(), 6);
    }
}
