use serde::{Deserialize, Serialize};

use super::Header;
use crate::id::{BlockId, FaceId, VertexId};
use crate::law::BlockLaw;

/// 3-D entity bounded by up to 6 faces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub(crate) id: BlockId,
    pub(crate) header: Header,
    /// Faces in `i_min, i_max, j_min, j_max, k_min, k_max` order
    pub(crate) faces: Vec<FaceId>,
    pub(crate) vertices: Vec<VertexId>,
    pub(crate) law: BlockLaw,
}

impl Block {
    pub(crate) fn new(id: BlockId, vertices: Vec<VertexId>, law: BlockLaw) -> Self {
        Self {
            id,
            header: Header::default(),
            faces: Vec::new(),
            vertices,
            law,
        }
    }

    pub fn faces(&self) -> &[FaceId] {
        &self.faces
    }

    pub fn nb_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    pub fn nb_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn law(&self) -> &BlockLaw {
        &self.law
    }

    pub fn is_structured(&self) -> bool {
        self.law.is_structured()
    }

    /// Degenerate when some vertex coincides with another
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 8
    }
}
