//! Fusing two coincident cofaces
//!
//! Everything is checked before the first merge: the vertex correspondence,
//! the matching of boundary edges and their discretizations. A mismatch is
//! reported with the coedges involved and leaves both cofaces as they were.

use crate::error::{TopoError, TopoResult};
use crate::id::{CoEdgeId, CoFaceId, EdgeId, VertexId};
use crate::provider::GeometryProvider;
use crate::store::TopoStore;
use crate::txn::TransactionLog;

use super::replace::{
    blocks_around, check_block_forms, merge_coedges_in, merge_cofaces_in, merge_edges_in,
    merge_vertices_in,
};

/// Fuse `b` onto `a` given pairs `(vertex of a, vertex of b)`.
///
/// Vertices, coedges and edges of `a` are kept. The surviving coface is `a`
/// unless only `b` is structured. Returns the survivor.
pub fn fuse_cofaces(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    geom: &dyn GeometryProvider,
    a: CoFaceId,
    b: CoFaceId,
    pairs: &[(VertexId, VertexId)],
) -> TopoResult<CoFaceId> {
    log.atomic(store, |store, log| {
        let mut vertices = store.coface(a)?.vertices().to_vec();
        vertices.extend_from_slice(store.coface(b)?.vertices());
        let blocks = blocks_around(store, &vertices)?;
        let survivor = fuse_cofaces_in(store, log, geom, a, b, pairs)?;
        check_block_forms(store, &blocks)?;
        Ok(survivor)
    })
}

/// Fuse two cofaces, pairing each vertex with the nearest one of the other
/// coface within the configured fuse tolerance
pub fn fuse_cofaces_by_proximity(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    geom: &dyn GeometryProvider,
    a: CoFaceId,
    b: CoFaceId,
) -> TopoResult<CoFaceId> {
    let pairs = proximity_pairs(store, a, b)?;
    fuse_cofaces(store, log, geom, a, b, &pairs)
}

/// Vertex pairs matched by distance
pub fn proximity_pairs(
    store: &TopoStore,
    a: CoFaceId,
    b: CoFaceId,
) -> TopoResult<Vec<(VertexId, VertexId)>> {
    let tolerance = store.config().fuse_tolerance;
    let theirs = store.coface(b)?.vertices().to_vec();
    let mut pairs: Vec<(VertexId, VertexId)> = Vec::with_capacity(theirs.len());
    for mine in store.coface(a)?.vertices() {
        let p = store.vertex(*mine)?.coord();
        let mut best: Option<(VertexId, f64)> = None;
        for other in &theirs {
            let d = store.vertex(*other)?.coord().distance(p);
            if d <= tolerance && best.is_none_or(|(_, b)| d < b) {
                best = Some((*other, d));
            }
        }
        let (partner, _) = best.ok_or_else(|| {
            TopoError::VertexCorrespondence(format!("{mine} has no partner in {b}"))
        })?;
        if let Some((taken, _)) = pairs.iter().find(|(_, p)| *p == partner) {
            return Err(TopoError::VertexCorrespondence(format!(
                "{taken} and {mine} both match {partner}"
            )));
        }
        pairs.push((*mine, partner));
    }
    Ok(pairs)
}

/// Edge pair to fuse, with the vertex of `a` both walks start from
struct EdgeMatch {
    mine: EdgeId,
    theirs: EdgeId,
    start: VertexId,
    theirs_start: VertexId,
}

pub(crate) fn fuse_cofaces_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    geom: &dyn GeometryProvider,
    a: CoFaceId,
    b: CoFaceId,
    pairs: &[(VertexId, VertexId)],
) -> TopoResult<CoFaceId> {
    if a == b {
        return Err(TopoError::SameEntity(a.to_string()));
    }
    let matches = check_fusion(store, a, b, pairs)?;

    for (mine, theirs) in pairs {
        if mine != theirs {
            merge_vertices_in(store, log, *mine, *theirs)?;
        }
    }

    for m in &matches {
        if m.mine == m.theirs {
            continue;
        }
        let (nb_mine, nb_theirs) = (store.edge(m.mine)?.nb_coedges(), store.edge(m.theirs)?.nb_coedges());
        if nb_mine == nb_theirs {
            let chain_mine = store.chain(m.mine, m.start)?;
            let chain_theirs = store.chain(m.theirs, m.start)?;
            for (v_mine, v_theirs) in chain_mine.vertices.iter().zip(&chain_theirs.vertices) {
                if v_mine != v_theirs {
                    merge_vertices_in(store, log, *v_mine, *v_theirs)?;
                }
            }
            for (c_mine, c_theirs) in chain_mine.coedges.iter().zip(&chain_theirs.coedges) {
                if c_mine != c_theirs {
                    merge_coedges_in(store, log, geom, *c_mine, *c_theirs)?;
                }
            }
            merge_edges_in(store, log, geom, m.mine, m.theirs)?;
        } else if nb_mine > nb_theirs {
            merge_edges_in(store, log, geom, m.mine, m.theirs)?;
        } else {
            merge_edges_in(store, log, geom, m.theirs, m.mine)?;
        }
        tracing::debug!("Fused {} with {} (from {})", m.mine, m.theirs, m.theirs_start);
    }

    let structured_a = store.coface(a)?.is_structured();
    let structured_b = store.coface(b)?.is_structured();
    let (keep, gone) = if structured_b && !structured_a { (b, a) } else { (a, b) };
    merge_cofaces_in(store, log, geom, keep, gone)?;
    tracing::debug!("Fused {} into {}", gone, keep);
    Ok(keep)
}

/// Validate the fusion of `b` onto `a` without touching the store
fn check_fusion(
    store: &TopoStore,
    a: CoFaceId,
    b: CoFaceId,
    pairs: &[(VertexId, VertexId)],
) -> TopoResult<Vec<EdgeMatch>> {
    let fa = store.coface(a)?;
    let fb = store.coface(b)?;
    if fa.nb_vertices() != fb.nb_vertices() || pairs.len() != fa.nb_vertices() {
        return Err(TopoError::VertexCorrespondence(format!(
            "{} pair(s) given for {a} ({} vertices) and {b} ({} vertices)",
            pairs.len(),
            fa.nb_vertices(),
            fb.nb_vertices()
        )));
    }
    for (mine, theirs) in pairs {
        if !fa.vertices().contains(mine) || !fb.vertices().contains(theirs) {
            return Err(TopoError::VertexCorrespondence(format!(
                "{mine} - {theirs} does not pair a vertex of {a} with one of {b}"
            )));
        }
        let used_mine = pairs.iter().filter(|(m, _)| m == mine).count();
        let used_theirs = pairs.iter().filter(|(_, t)| t == theirs).count();
        if used_mine > 1 || used_theirs > 1 {
            return Err(TopoError::VertexCorrespondence(format!(
                "{mine} - {theirs} is paired more than once"
            )));
        }
    }
    let partner = |v: VertexId| {
        pairs
            .iter()
            .find(|(m, _)| *m == v)
            .map(|(_, t)| *t)
            .ok_or_else(|| TopoError::VertexCorrespondence(format!("{v} has no partner")))
    };

    let mut matches = Vec::with_capacity(fa.nb_edges());
    for mine in fa.edges() {
        let [p, q] = store.edge(*mine)?.vertices();
        let (pp, qq) = (partner(p)?, partner(q)?);
        let theirs = fb
            .edges()
            .iter()
            .copied()
            .find(|e| store.edge(*e).is_ok_and(|edge| edge.joins(pp, qq)))
            .ok_or_else(|| {
                TopoError::VertexCorrespondence(format!(
                    "{b} has no edge between {pp} and {qq} to match {mine}"
                ))
            })?;
        if theirs != *mine {
            check_discretization(store, *mine, theirs, p, pp)?;
        }
        matches.push(EdgeMatch {
            mine: *mine,
            theirs,
            start: p,
            theirs_start: pp,
        });
    }
    Ok(matches)
}

fn check_discretization(
    store: &TopoStore,
    mine: EdgeId,
    theirs: EdgeId,
    start: VertexId,
    theirs_start: VertexId,
) -> TopoResult<()> {
    let chain_mine = store.chain(mine, start)?;
    let chain_theirs = store.chain(theirs, theirs_start)?;
    let names = |coedges: &[CoEdgeId]| -> Vec<String> { coedges.iter().map(|c| c.to_string()).collect() };

    let (n_mine, n_theirs) = (store.edge_nb_meshing_edges(mine)?, store.edge_nb_meshing_edges(theirs)?);
    if n_mine != n_theirs {
        return Err(TopoError::DiscretizationMismatch {
            first: names(&chain_mine.coedges),
            second: names(&chain_theirs.coedges),
            first_count: n_mine,
            second_count: n_theirs,
        });
    }

    let (k_mine, k_theirs) = (chain_mine.coedges.len(), chain_theirs.coedges.len());
    if k_mine == k_theirs {
        for (c_mine, c_theirs) in chain_mine.coedges.iter().zip(&chain_theirs.coedges) {
            let n_mine = store.coedge(*c_mine)?.nb_meshing_edges();
            let n_theirs = store.coedge(*c_theirs)?.nb_meshing_edges();
            if n_mine != n_theirs {
                return Err(TopoError::DiscretizationMismatch {
                    first: vec![c_mine.to_string()],
                    second: vec![c_theirs.to_string()],
                    first_count: n_mine,
                    second_count: n_theirs,
                });
            }
        }
    } else if k_mine > 1 && k_theirs > 1 {
        return Err(TopoError::CoEdgeCountMismatch {
            first: mine.to_string(),
            second: theirs.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopoConfig;
    use crate::edit::{build_quad, split_coedge, Quad, SplitAt};
    use crate::entity::{CoEdge, CoFace, Edge, Vertex};
    use crate::provider::NullGeometry;
    use glam::DVec3;

    const CORNERS: [DVec3; 4] = [
        DVec3::ZERO,
        DVec3::X,
        DVec3::new(1.0, 1.0, 0.0),
        DVec3::Y,
    ];

    fn two_quads(nb_j_a: u32, nb_j_b: u32) -> (TopoStore, Quad, Quad) {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut log = TransactionLog::begin(&store);
        let a = build_quad(&mut store, &mut log, CORNERS, 4, nb_j_a).unwrap();
        let b = build_quad(&mut store, &mut log, CORNERS, 4, nb_j_b).unwrap();
        log.commit(&mut store);
        (store, a, b)
    }

    fn pairs(a: &Quad, b: &Quad) -> Vec<(VertexId, VertexId)> {
        a.vertices.iter().copied().zip(b.vertices.iter().copied()).collect()
    }

    #[test]
    fn test_mismatch_leaves_both_cofaces() {
        let (mut store, a, b) = two_quads(6, 5);
        let before = store.live_records();
        let mut log = TransactionLog::begin(&store);
        let err = fuse_cofaces(&mut store, &mut log, &NullGeometry, a.coface, b.coface, &pairs(&a, &b))
            .unwrap_err();
        match err {
            TopoError::DiscretizationMismatch {
                first,
                second,
                first_count,
                second_count,
            } => {
                assert_eq!((first_count, second_count), (6, 5));
                assert_eq!(first.len(), 1);
                assert_eq!(second.len(), 1);
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(log.is_empty());
        assert_eq!(store.live_records(), before);
    }

    #[test]
    fn test_fuse_shares_everything() {
        let (mut store, a, b) = two_quads(4, 4);
        let mut log = TransactionLog::begin(&store);
        let keep =
            fuse_cofaces(&mut store, &mut log, &NullGeometry, a.coface, b.coface, &pairs(&a, &b))
                .unwrap();
        assert_eq!(keep, a.coface);
        assert!(!store.is_live(b.coface));
        assert_eq!(store.face(b.face).unwrap().cofaces(), &[a.coface]);
        assert_eq!(store.coface(a.coface).unwrap().nb_faces(), 2);
        assert_eq!(store.count::<Vertex>(), 4);
        assert_eq!(store.count::<Edge>(), 4);
        assert_eq!(store.count::<CoEdge>(), 4);
        assert_eq!(store.count::<CoFace>(), 1);
    }

    #[test]
    fn test_fuse_split_edges() {
        let (mut store, a, b) = two_quads(4, 4);
        let mut log = TransactionLog::begin(&store);
        // a single coedge against two on edge 0, two against two on edge 2
        let coedge = store.edge(b.edges[0]).unwrap().coedges()[0];
        split_coedge(&mut store, &mut log, coedge, SplitAt::Count(1)).unwrap();
        for quad in [&a, &b] {
            let coedge = store.edge(quad.edges[2]).unwrap().coedges()[0];
            split_coedge(&mut store, &mut log, coedge, SplitAt::Count(2)).unwrap();
        }
        fuse_cofaces(&mut store, &mut log, &NullGeometry, a.coface, b.coface, &pairs(&a, &b))
            .unwrap();

        let boundary = store.coface(a.coface).unwrap().edges().to_vec();
        assert_eq!(store.edge(boundary[0]).unwrap().nb_coedges(), 2);
        assert_eq!(boundary[0], b.edges[0]);
        assert_eq!(boundary[2], a.edges[2]);
        assert_eq!(store.edge(boundary[2]).unwrap().nb_coedges(), 2);
        // 4 corners, the midpoint of edge 0 from b and one midpoint of edge 2
        assert_eq!(store.count::<Vertex>(), 6);
        assert_eq!(store.count::<CoEdge>(), 6);
    }

    #[test]
    fn test_coedge_count_mismatch() {
        let (mut store, a, b) = two_quads(4, 4);
        let mut log = TransactionLog::begin(&store);
        let coedge = store.edge(a.edges[0]).unwrap().coedges()[0];
        split_coedge(&mut store, &mut log, coedge, SplitAt::Count(2)).unwrap();
        let coedge = store.edge(b.edges[0]).unwrap().coedges()[0];
        let (_, [_, rest]) = split_coedge(&mut store, &mut log, coedge, SplitAt::Count(1)).unwrap();
        split_coedge(&mut store, &mut log, rest, SplitAt::Count(1)).unwrap();
        let err =
            fuse_cofaces(&mut store, &mut log, &NullGeometry, a.coface, b.coface, &pairs(&a, &b))
                .unwrap_err();
        assert!(matches!(err, TopoError::CoEdgeCountMismatch { .. }));
    }

    #[test]
    fn test_proximity_pairs() {
        let (mut store, a, b) = two_quads(4, 4);
        assert_eq!(proximity_pairs(&store, a.coface, b.coface).unwrap(), pairs(&a, &b));

        let mut log = TransactionLog::begin(&store);
        crate::edit::move_vertex(&mut store, &mut log, b.vertices[2], DVec3::new(1.0, 1.1, 0.0))
            .unwrap();
        let err = proximity_pairs(&store, a.coface, b.coface).unwrap_err();
        assert!(matches!(err, TopoError::VertexCorrespondence(_)));

        crate::edit::move_vertex(&mut store, &mut log, b.vertices[2], CORNERS[2]).unwrap();
        let keep =
            fuse_cofaces_by_proximity(&mut store, &mut log, &NullGeometry, a.coface, b.coface)
                .unwrap();
        assert_eq!(keep, a.coface);
    }
}
