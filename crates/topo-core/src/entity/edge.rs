use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::Header;
use crate::id::{CoEdgeId, CoFaceId, EdgeId, VertexId};

/// Composite of ordered coedges between two end vertices.
///
/// Each coedge carries a ratio: a neighbour coface sees `nb / ratio` meshing
/// edges on that coedge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub(crate) id: EdgeId,
    pub(crate) header: Header,
    pub(crate) vertices: [VertexId; 2],
    pub(crate) coedges: Vec<CoEdgeId>,
    pub(crate) ratios: BTreeMap<CoEdgeId, u32>,
    /// Back links: cofaces bounded by this edge
    pub(crate) cofaces: BTreeSet<CoFaceId>,
}

impl Edge {
    pub(crate) fn new(id: EdgeId, vertices: [VertexId; 2]) -> Self {
        Self {
            id,
            header: Header::default(),
            vertices,
            coedges: Vec::new(),
            ratios: BTreeMap::new(),
            cofaces: BTreeSet::new(),
        }
    }

    pub fn vertices(&self) -> [VertexId; 2] {
        self.vertices
    }

    pub fn vertex(&self, index: usize) -> VertexId {
        self.vertices[index % 2]
    }

    pub fn has_vertex(&self, vertex: VertexId) -> bool {
        self.vertices.contains(&vertex)
    }

    pub fn other_vertex(&self, vertex: VertexId) -> Option<VertexId> {
        if self.vertices[0] == vertex {
            Some(self.vertices[1])
        } else if self.vertices[1] == vertex {
            Some(self.vertices[0])
        } else {
            None
        }
    }

    /// True when the edge joins `a` and `b`, in either order
    pub fn joins(&self, a: VertexId, b: VertexId) -> bool {
        (self.vertices[0] == a && self.vertices[1] == b)
            || (self.vertices[0] == b && self.vertices[1] == a)
    }

    pub fn coedges(&self) -> &[CoEdgeId] {
        &self.coedges
    }

    pub fn coedge(&self, index: usize) -> Option<CoEdgeId> {
        self.coedges.get(index).copied()
    }

    pub fn nb_coedges(&self) -> usize {
        self.coedges.len()
    }

    pub fn ratio(&self, coedge: CoEdgeId) -> u32 {
        self.ratios.get(&coedge).copied().unwrap_or(1)
    }

    pub fn cofaces(&self) -> &BTreeSet<CoFaceId> {
        &self.cofaces
    }

    pub fn nb_cofaces(&self) -> usize {
        self.cofaces.len()
    }
}
