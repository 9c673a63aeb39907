//! Graph navigation
//!
//! Read-only queries that need more than one entity: coedge chains along an
//! edge, discretization counts seen from a coface, boundary lookups.

use crate::entity::CoFace;
use crate::error::{TopoError, TopoResult};
use crate::id::{CoEdgeId, CoFaceId, EdgeId, VertexId};
use crate::store::TopoStore;

/// Coedges of an edge walked from one end to the other
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    /// Junction vertices, both ends included
    pub vertices: Vec<VertexId>,
    pub coedges: Vec<CoEdgeId>,
    /// Whether each coedge runs in the walking direction
    pub forward: Vec<bool>,
}

impl Chain {
    pub fn first(&self) -> Option<VertexId> {
        self.vertices.first().copied()
    }

    pub fn last(&self) -> Option<VertexId> {
        self.vertices.last().copied()
    }

    /// Position of a junction vertex, ends included
    pub fn position(&self, vertex: VertexId) -> Option<usize> {
        self.vertices.iter().position(|v| *v == vertex)
    }

    pub fn reversed(&self) -> Chain {
        Chain {
            vertices: self.vertices.iter().rev().copied().collect(),
            coedges: self.coedges.iter().rev().copied().collect(),
            forward: self.forward.iter().rev().map(|f| !f).collect(),
        }
    }
}

impl TopoStore {
    /// Walk the coedges of `edge` starting at its end `from`
    pub fn chain(&self, edge: EdgeId, from: VertexId) -> TopoResult<Chain> {
        let e = self.edge(edge)?;
        let mut vertices = vec![e.vertex(0)];
        let mut forward = Vec::with_capacity(e.nb_coedges());
        let mut current = e.vertex(0);
        for coedge in e.coedges() {
            let ce = self.coedge(*coedge)?;
            let next = ce.other_vertex(current).ok_or_else(|| {
                TopoError::invariant(edge, format!("{coedge} does not continue at {current}"))
            })?;
            forward.push(ce.vertex(0) == current);
            vertices.push(next);
            current = next;
        }
        if current != e.vertex(1) {
            return Err(TopoError::invariant(
                edge,
                format!("coedges end at {current} instead of {}", e.vertex(1)),
            ));
        }
        let chain = Chain {
            vertices,
            coedges: e.coedges().to_vec(),
            forward,
        };
        if from == e.vertex(0) {
            Ok(chain)
        } else if from == e.vertex(1) {
            Ok(chain.reversed())
        } else {
            Err(TopoError::invariant(edge, format!("{from} is not one of its ends")))
        }
    }

    /// Meshing edges of an edge as seen by its cofaces
    pub fn edge_nb_meshing_edges(&self, edge: EdgeId) -> TopoResult<u32> {
        let e = self.edge(edge)?;
        let mut total = 0;
        for coedge in e.coedges() {
            total += self.coedge(*coedge)?.nb_meshing_edges() / e.ratio(*coedge);
        }
        Ok(total)
    }

    /// Sum of the meshing edges of a list of coedges
    pub fn coedges_nb_meshing_edges(&self, coedges: &[CoEdgeId]) -> TopoResult<u32> {
        coedges
            .iter()
            .map(|c| self.coedge(*c).map(|ce| ce.nb_meshing_edges()))
            .sum()
    }

    /// Edge of `coface` joining `a` and `b`
    pub fn edge_between(&self, coface: CoFaceId, a: VertexId, b: VertexId) -> TopoResult<EdgeId> {
        let f = self.coface(coface)?;
        for edge in f.edges() {
            if self.edge(*edge)?.joins(a, b) {
                return Ok(*edge);
            }
        }
        Err(TopoError::invariant(
            coface,
            format!("no boundary edge between {a} and {b}"),
        ))
    }

    /// Meshing edge counts along i and j of a structured coface
    pub fn nb_meshing_edges_ij(&self, coface: CoFaceId) -> TopoResult<(u32, u32)> {
        let f = self.structured(coface)?;
        let e0 = f.edge(0).ok_or_else(|| TopoError::invariant(coface, "no edge 0"))?;
        let e1 = f.edge(1).ok_or_else(|| TopoError::invariant(coface, "no edge 1"))?;
        Ok((
            self.edge_nb_meshing_edges(e1)?,
            self.edge_nb_meshing_edges(e0)?,
        ))
    }

    /// Meshing edges along the whole boundary of a coface
    pub fn coface_nb_boundary_edges(&self, coface: CoFaceId) -> TopoResult<u32> {
        self.coface(coface)?
            .edges()
            .iter()
            .map(|e| self.edge_nb_meshing_edges(*e))
            .sum()
    }

    pub(crate) fn structured(&self, coface: CoFaceId) -> TopoResult<&CoFace> {
        let f = self.coface(coface)?;
        if !f.is_structured() {
            return Err(TopoError::NotStructured(coface.to_string()));
        }
        Ok(f)
    }

    /// Cofaces sharing at least one edge with `coface`
    pub fn neighbour_cofaces(&self, coface: CoFaceId) -> TopoResult<Vec<CoFaceId>> {
        let mut out = Vec::new();
        for edge in self.coface(coface)?.edges() {
            for other in self.edge(*edge)?.cofaces() {
                if *other != coface && !out.contains(other) {
                    out.push(*other);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopoConfig;
    use crate::edit;
    use crate::txn::TransactionLog;
    use glam::DVec3;

    #[test]
    fn test_chain_both_ways() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut log = TransactionLog::begin(&store);
        let corners = [DVec3::ZERO, DVec3::X, DVec3::new(1.0, 1.0, 0.0), DVec3::Y];
        let quad = edit::build_quad(&mut store, &mut log, corners, 4, 4).unwrap();
        let f = store.coface(quad.coface).unwrap().clone();
        let e0 = f.edge(0).unwrap();
        let first = store.edge(e0).unwrap().coedges()[0];
        let (_, [c1, _]) =
            edit::split_coedge(&mut store, &mut log, first, edit::SplitAt::Count(1)).unwrap();

        let v0 = f.vertex(0).unwrap();
        let v1 = f.vertex(1).unwrap();
        let chain = store.chain(e0, v0).unwrap();
        assert_eq!(chain.vertices.len(), 3);
        assert_eq!(chain.first(), Some(v0));
        assert_eq!(chain.last(), Some(v1));
        assert_eq!(chain.coedges[0], c1);

        let back = store.chain(e0, v1).unwrap();
        assert_eq!(back.first(), Some(v1));
        assert_eq!(back.coedges[1], c1);
        assert!(!back.forward[1]);
        assert_eq!(store.edge_nb_meshing_edges(e0).unwrap(), 4);
        assert_eq!(store.nb_meshing_edges_ij(quad.coface).unwrap(), (4, 4));
        assert_eq!(store.coface_nb_boundary_edges(quad.coface).unwrap(), 16);
    }
}
