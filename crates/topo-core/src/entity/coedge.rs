use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Header;
use crate::id::{CoEdgeId, EdgeId, VertexId};
use crate::law::EdgeMeshing;

/// 1-D discretized entity between two vertices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoEdge {
    pub(crate) id: CoEdgeId,
    pub(crate) header: Header,
    pub(crate) vertices: [VertexId; 2],
    pub(crate) meshing: EdgeMeshing,
    /// Back links: edges aggregating this coedge
    pub(crate) edges: BTreeSet<EdgeId>,
}

impl CoEdge {
    pub(crate) fn new(id: CoEdgeId, vertices: [VertexId; 2], meshing: EdgeMeshing) -> Self {
        Self {
            id,
            header: Header::default(),
            vertices,
            meshing,
            edges: BTreeSet::new(),
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

    /// Vertex at the other end, if `vertex` is one of the ends
    pub fn other_vertex(&self, vertex: VertexId) -> Option<VertexId> {
        if self.vertices[0] == vertex {
            Some(self.vertices[1])
        } else if self.vertices[1] == vertex {
            Some(self.vertices[0])
        } else {
            None
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.vertices[0] == self.vertices[1]
    }

    pub fn meshing(&self) -> &EdgeMeshing {
        &self.meshing
    }

    pub fn nb_meshing_edges(&self) -> u32 {
        self.meshing.nb_edges
    }

    pub fn edges(&self) -> &BTreeSet<EdgeId> {
        &self.edges
    }

    pub fn nb_edges(&self) -> usize {
        self.edges.len()
    }
}
