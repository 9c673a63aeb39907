use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Header;
use crate::id::{BlockId, CoFaceId, FaceId, VertexId};

/// Composite of cofaces, the edge role one dimension up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub(crate) id: FaceId,
    pub(crate) header: Header,
    pub(crate) cofaces: Vec<CoFaceId>,
    /// Corner vertices
    pub(crate) vertices: Vec<VertexId>,
    /// Back links: blocks bounded by this face
    pub(crate) blocks: BTreeSet<BlockId>,
}

impl Face {
    pub(crate) fn new(id: FaceId, vertices: Vec<VertexId>) -> Self {
        Self {
            id,
            header: Header::default(),
            cofaces: Vec::new(),
            vertices,
            blocks: BTreeSet::new(),
        }
    }

    pub fn cofaces(&self) -> &[CoFaceId] {
        &self.cofaces
    }

    pub fn nb_cofaces(&self) -> usize {
        self.cofaces.len()
    }

    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    pub fn blocks(&self) -> &BTreeSet<BlockId> {
        &self.blocks
    }
}
