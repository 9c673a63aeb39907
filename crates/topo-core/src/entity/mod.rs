//! Topological entities
//!
//! Entities live in the [`TopoStore`] arena and reference each other by id.
//! Forward links (a coface's ordered edges) are owned by the referencing
//! entity. Back links (an edge's cofaces) are sets kept in sync by
//! [`TopoStore::rewire`]; they are never recomputed.

mod block;
mod coedge;
mod coface;
mod edge;
mod face;
mod vertex;

pub use block::Block;
pub use coedge::CoEdge;
pub use coface::CoFace;
pub use edge::Edge;
pub use face::Face;
pub use vertex::Vertex;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::id::{EntityId, TypedId};
use crate::provider::{GeomRef, MeshData};
use crate::store::{Slot, TopoStore};

/// Lifecycle of an entity slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Part of the graph
    Live,
    /// Freed, but a transaction log still needs its prior state
    Destroyed,
    /// Freed and no longer retained by any log; may be deallocated
    Reclaimable,
}

impl Lifecycle {
    pub fn is_destroyed(&self) -> bool {
        !matches!(self, Lifecycle::Live)
    }
}

/// Properties shared by every entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Group memberships
    pub groups: BTreeSet<String>,
    /// Associated CAD entity, used for projection
    pub geom: Option<GeomRef>,
    /// Discretization written into the mesh store
    pub mesh: Option<MeshData>,
}

impl Header {
    pub fn is_meshed(&self) -> bool {
        self.mesh.is_some()
    }
}

/// Behaviour shared by all entity kinds
pub trait TopoEntity: Clone + std::fmt::Debug + PartialEq + Send + Sync + 'static {
    type Id: TypedId<Entity = Self>;

    fn id(&self) -> Self::Id;

    fn header(&self) -> &Header;

    fn header_mut(&mut self) -> &mut Header;

    /// Derived display name
    fn name(&self) -> String {
        self.id().to_string()
    }

    #[doc(hidden)]
    fn arena(store: &TopoStore) -> &BTreeMap<Self::Id, Slot<Self>>;

    #[doc(hidden)]
    fn arena_mut(store: &mut TopoStore) -> &mut BTreeMap<Self::Id, Slot<Self>>;

    fn into_record(self) -> EntityRecord;

    fn from_record(record: EntityRecord) -> Option<Self>;
}

macro_rules! topo_entity {
    ($ty:ident, $id:ident, $field:ident) => {
        impl TopoEntity for $ty {
            type Id = crate::id::$id;

            fn id(&self) -> Self::Id {
                self.id
            }

            fn header(&self) -> &Header {
                &self.header
            }

            fn header_mut(&mut self) -> &mut Header {
                &mut self.header
            }

            fn arena(store: &TopoStore) -> &BTreeMap<Self::Id, Slot<Self>> {
                &store.$field
            }

            fn arena_mut(store: &mut TopoStore) -> &mut BTreeMap<Self::Id, Slot<Self>> {
                &mut store.$field
            }

            fn into_record(self) -> EntityRecord {
                EntityRecord::$ty(self)
            }

            fn from_record(record: EntityRecord) -> Option<Self> {
                match record {
                    EntityRecord::$ty(entity) => Some(entity),
                    _ => None,
                }
            }
        }
    };
}

topo_entity!(Vertex, VertexId, vertices);
topo_entity!(CoEdge, CoEdgeId, coedges);
topo_entity!(Edge, EdgeId, edges);
topo_entity!(CoFace, CoFaceId, cofaces);
topo_entity!(Face, FaceId, faces);
topo_entity!(Block, BlockId, blocks);

/// Full copy of an entity, used for snapshots and comparisons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityRecord {
    Vertex(Vertex),
    CoEdge(CoEdge),
    Edge(Edge),
    CoFace(CoFace),
    Face(Face),
    Block(Block),
}

impl EntityRecord {
    pub fn id(&self) -> EntityId {
        match self {
            EntityRecord::Vertex(e) => e.id().into(),
            EntityRecord::CoEdge(e) => e.id().into(),
            EntityRecord::Edge(e) => e.id().into(),
            EntityRecord::CoFace(e) => e.id().into(),
            EntityRecord::Face(e) => e.id().into(),
            EntityRecord::Block(e) => e.id().into(),
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            EntityRecord::Vertex(e) => e.header(),
            EntityRecord::CoEdge(e) => e.header(),
            EntityRecord::Edge(e) => e.header(),
            EntityRecord::CoFace(e) => e.header(),
            EntityRecord::Face(e) => e.header(),
            EntityRecord::Block(e) => e.header(),
        }
    }
}
