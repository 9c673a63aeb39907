use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Header;
use crate::error::{TopoError, TopoResult};
use crate::id::{CoFaceId, EdgeId, FaceId, VertexId};
use crate::law::{Dir, FaceLaw};

/// 2-D discretized entity bounded by edges.
///
/// A structured coface lists its edges as `i_min, j_min, i_max, j_max`, edge
/// `k` joining vertex `k` to vertex `k + 1`. A degenerate one omits `j_max`
/// and has only three vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoFace {
    pub(crate) id: CoFaceId,
    pub(crate) header: Header,
    pub(crate) edges: Vec<EdgeId>,
    pub(crate) vertices: Vec<VertexId>,
    pub(crate) law: FaceLaw,
    /// More than one boundary cycle (unstructured only)
    pub(crate) holed: bool,
    /// Back links: faces aggregating this coface
    pub(crate) faces: BTreeSet<FaceId>,
}

impl CoFace {
    pub(crate) fn new(id: CoFaceId, vertices: Vec<VertexId>, law: FaceLaw) -> Self {
        Self {
            id,
            header: Header::default(),
            edges: Vec::new(),
            vertices,
            law,
            holed: false,
            faces: BTreeSet::new(),
        }
    }

    pub fn edges(&self) -> &[EdgeId] {
        &self.edges
    }

    pub fn edge(&self, index: usize) -> Option<EdgeId> {
        self.edges.get(index).copied()
    }

    pub fn nb_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn edge_index(&self, edge: EdgeId) -> Option<usize> {
        self.edges.iter().position(|e| *e == edge)
    }

    pub fn vertices(&self) -> &[VertexId] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> Option<VertexId> {
        self.vertices.get(index).copied()
    }

    pub fn nb_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex_index(&self, vertex: VertexId) -> Option<usize> {
        self.vertices.iter().position(|v| *v == vertex)
    }

    pub fn law(&self) -> &FaceLaw {
        &self.law
    }

    pub fn is_structured(&self) -> bool {
        self.law.is_structured()
    }

    /// Structured with only three sides
    pub fn is_degenerate(&self) -> bool {
        self.is_structured() && self.edges.len() == 3
    }

    pub fn is_holed(&self) -> bool {
        self.holed
    }

    pub fn faces(&self) -> &BTreeSet<FaceId> {
        &self.faces
    }

    pub fn nb_faces(&self) -> usize {
        self.faces.len()
    }

    /// Edges running along a parametric direction
    pub fn edges_in_dir(&self, dir: Dir) -> TopoResult<Vec<EdgeId>> {
        if !self.is_structured() {
            return Err(TopoError::NotStructured(self.id.to_string()));
        }
        let picks: [usize; 2] = match dir {
            Dir::I => [1, 3],
            Dir::J => [0, 2],
        };
        Ok(picks.iter().filter_map(|k| self.edge(*k)).collect())
    }

    /// Edge facing `edge` on a structured coface; `None` facing a collapsed side
    pub fn opposite_edge(&self, edge: EdgeId) -> TopoResult<Option<EdgeId>> {
        if !self.is_structured() {
            return Err(TopoError::NotStructured(self.id.to_string()));
        }
        let index = self.edge_index(edge).ok_or_else(|| {
            TopoError::invariant(self.id, format!("{edge} is not on its boundary"))
        })?;
        Ok(match (self.edges.len(), index) {
            (4, k) => self.edge((k + 2) % 4),
            (3, 0) => self.edge(2),
            (3, 2) => self.edge(0),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> CoFace {
        let mut coface = CoFace::new(
            CoFaceId(10),
            (1..=4).map(VertexId).collect(),
            FaceLaw::Transfinite,
        );
        coface.edges = (5..=8).map(EdgeId).collect();
        coface
    }

    #[test]
    fn test_edges_in_dir() {
        let coface = quad();
        assert_eq!(coface.edges_in_dir(Dir::I).unwrap(), vec![EdgeId(6), EdgeId(8)]);
        assert_eq!(coface.edges_in_dir(Dir::J).unwrap(), vec![EdgeId(5), EdgeId(7)]);
    }

    #[test]
    fn test_opposite_edge_on_degenerate() {
        let mut coface = quad();
        coface.edges.truncate(3);
        coface.vertices.truncate(3);
        assert!(coface.is_degenerate());
        assert_eq!(coface.opposite_edge(EdgeId(5)).unwrap(), Some(EdgeId(7)));
        assert_eq!(coface.opposite_edge(EdgeId(6)).unwrap(), None);
        assert_eq!(coface.edges_in_dir(Dir::I).unwrap(), vec![EdgeId(6)]);
    }

    #[test]
    fn test_unstructured_has_no_directions() {
        let mut coface = quad();
        coface.law = FaceLaw::Delaunay;
        assert!(matches!(
            coface.edges_in_dir(Dir::I),
            Err(TopoError::NotStructured(_))
        ));
    }
}
