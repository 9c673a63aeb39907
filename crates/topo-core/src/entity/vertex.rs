use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Header;
use crate::id::{CoEdgeId, VertexId};

/// 0-D entity holding a coordinate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub(crate) id: VertexId,
    pub(crate) header: Header,
    pub(crate) coord: DVec3,
    /// Back links: coedges using this vertex
    pub(crate) coedges: BTreeSet<CoEdgeId>,
}

impl Vertex {
    pub(crate) fn new(id: VertexId, coord: DVec3) -> Self {
        Self {
            id,
            header: Header::default(),
            coord,
            coedges: BTreeSet::new(),
        }
    }

    pub fn coord(&self) -> DVec3 {
        self.coord
    }

    pub fn coedges(&self) -> &BTreeSet<CoEdgeId> {
        &self.coedges
    }

    pub fn nb_coedges(&self) -> usize {
        self.coedges.len()
    }
}
