//! Splitting coedges and structured cofaces
//!
//! A structured coface is cut between its two sides running along the split
//! direction. Cuts are given as vertex pairs, the first vertex on the side
//! seen as `i_max` in the split frame, the second on the facing side. Each
//! child coface keeps the orientation of its parent; children that lose a
//! side come out degenerate.

use std::fmt;

use crate::entity::{CoFace, Edge};
use crate::error::{TopoError, TopoResult};
use crate::id::{CoEdgeId, CoFaceId, EdgeId, EntityId, VertexId};
use crate::law::{Dir, EdgeLaw, EdgeMeshing, FaceLaw};
use crate::nav::Chain;
use crate::store::TopoStore;
use crate::txn::TransactionLog;

use super::build::{new_coedge, new_coface, new_edge, new_vertex};
use super::free::{free_coedge_in, free_coface_in};
use super::replace::replace_coface_in;

/// Where a coedge is cut
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SplitAt {
    /// Parameter in [0, 1] from the first vertex, rounded to the nearest node
    Param(f64),
    /// Number of meshing edges kept on the first vertex side
    Count(u32),
}

impl fmt::Display for SplitAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitAt::Param(t) => write!(f, "parameter {t}"),
            SplitAt::Count(k) => write!(f, "node {k}"),
        }
    }
}

/// Split a coedge at a node, returning the new vertex and both halves.
///
/// The first half starts at the first vertex of the coedge. Every edge made
/// of the coedge is rewired to the halves in its own walking order.
pub fn split_coedge(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coedge: CoEdgeId,
    at: SplitAt,
) -> TopoResult<(VertexId, [CoEdgeId; 2])> {
    log.atomic(store, |store, log| split_coedge_in(store, log, coedge, at))
}

/// Split a structured coface with one or two cuts across the sides along `dir`
pub fn split_coface(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coface: CoFaceId,
    dir: Dir,
    cuts: &[(VertexId, VertexId)],
) -> TopoResult<Vec<CoFaceId>> {
    log.atomic(store, |store, log| split_coface_in(store, log, coface, dir, cuts))
}

/// Split a structured coface in two through `edge`, at `ratio` of its length.
///
/// The cut vertices are created at the nearest node of `edge` and at the
/// matching node of the facing side when they do not exist yet.
pub fn split_coface_at(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coface: CoFaceId,
    edge: EdgeId,
    ratio: f64,
) -> TopoResult<Vec<CoFaceId>> {
    log.atomic(store, |store, log| split_coface_at_in(store, log, coface, edge, ratio))
}

/// Split a 3-sided coface into three quads around a new center vertex.
///
/// The center lies at `ratio` of the way from vertex 0 to the middle of
/// edge 1.
pub fn split_coface_ogrid(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coface: CoFaceId,
    ratio: f64,
) -> TopoResult<[CoFaceId; 3]> {
    log.atomic(store, |store, log| split_coface_ogrid_in(store, log, coface, ratio))
}

pub(crate) fn split_coedge_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coedge: CoEdgeId,
    at: SplitAt,
) -> TopoResult<(VertexId, [CoEdgeId; 2])> {
    let ce = store.coedge(coedge)?.clone();
    let nb = ce.nb_meshing_edges();
    let k = match at {
        SplitAt::Count(k) => k,
        SplitAt::Param(t) if (0.0..=1.0).contains(&t) => (t * nb as f64).round() as u32,
        SplitAt::Param(_) => nb,
    };
    let refuse = || TopoError::CannotSplitCoEdge {
        coedge: coedge.to_string(),
        nb_edges: nb,
        position: at.to_string(),
    };
    if k == 0 || k >= nb {
        return Err(refuse());
    }
    for edge in ce.edges() {
        if k % store.edge(*edge)?.ratio(coedge) != 0 {
            return Err(refuse());
        }
    }
    if store.is_meshed(coedge.into()) {
        return Err(TopoError::Meshed(coedge.to_string()));
    }

    let [v0, v1] = ce.vertices();
    let (p0, p1) = (store.vertex(v0)?.coord(), store.vertex(v1)?.coord());
    let point = ce
        .meshing()
        .parameters(None)
        .ok()
        .and_then(|params| ce.meshing().positions(p0, p1, &params).get(k as usize).copied())
        .unwrap_or_else(|| p0.lerp(p1, k as f64 / nb as f64));
    let (first, second) = ce.meshing().split(k)?;

    let vertex = new_vertex(store, log, point)?;
    let c1 = new_coedge(store, log, v0, vertex, first)?;
    let c2 = new_coedge(store, log, vertex, v1, second)?;
    for id in [EntityId::from(vertex), c1.into(), c2.into()] {
        let header = store.header_mut(id)?;
        header.groups = ce.header.groups.clone();
        header.geom = ce.header.geom;
    }

    for edge in ce.edges() {
        let e = store.edge(*edge)?;
        let ratio = e.ratio(coedge);
        let chain = store.chain(*edge, e.vertex(0))?;
        let mut children = Vec::with_capacity(chain.coedges.len() + 1);
        for (c, forward) in chain.coedges.iter().zip(&chain.forward) {
            if *c != coedge {
                children.push(*c);
            } else if *forward {
                children.extend([c1, c2]);
            } else {
                children.extend([c2, c1]);
            }
        }
        store.rewire::<Edge>(log, *edge, children)?;
        if ratio != 1 {
            let e = store.get_mut(*edge)?;
            e.ratios.insert(c1, ratio);
            e.ratios.insert(c2, ratio);
        }
    }
    free_coedge_in(store, log, coedge)?;
    tracing::debug!("Split {} at {} into {} and {}", coedge, vertex, c1, c2);
    Ok((vertex, [c1, c2]))
}

/// Sides and corners of a structured coface seen from the split direction.
///
/// Cuts run from side 3 to side 1; side 0 and side 2 are parallel to them.
/// A degenerate coface has no side 3 in the `I` frame and no side 0 in the
/// `J` frame; its collapsed corner appears twice.
fn frame(f: &CoFace, dir: Dir) -> TopoResult<([Option<EdgeId>; 4], [VertexId; 4])> {
    let corner = |i: usize| {
        f.vertex(i)
            .ok_or_else(|| TopoError::invariant(f.id, format!("no vertex {i}")))
    };
    let side = |i: usize| {
        f.edge(i)
            .ok_or_else(|| TopoError::invariant(f.id, format!("no edge {i}")))
    };
    let degenerate = f.nb_edges() == 3;
    let mut sides = [
        Some(side(0)?),
        Some(side(1)?),
        Some(side(2)?),
        if degenerate { None } else { Some(side(3)?) },
    ];
    let mut corners = [
        corner(0)?,
        corner(1)?,
        corner(2)?,
        if degenerate { corner(0)? } else { corner(3)? },
    ];
    if dir == Dir::J {
        sides.rotate_right(1);
        corners.rotate_right(1);
    }
    Ok((sides, corners))
}

/// Cumulated meshing edges at each junction of a chain, as seen by the edge
fn junction_counts(store: &TopoStore, edge: EdgeId, chain: &Chain) -> TopoResult<Vec<u32>> {
    let e = store.edge(edge)?;
    let mut counts = Vec::with_capacity(chain.vertices.len());
    let mut acc = 0;
    counts.push(0);
    for c in &chain.coedges {
        acc += store.coedge(*c)?.nb_meshing_edges() / e.ratio(*c);
        counts.push(acc);
    }
    Ok(counts)
}

fn interior_position(chain: &Chain, vertex: VertexId) -> Option<usize> {
    chain
        .position(vertex)
        .filter(|p| *p > 0 && *p + 1 < chain.vertices.len())
}

pub(crate) fn split_coface_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coface: CoFaceId,
    dir: Dir,
    cuts: &[(VertexId, VertexId)],
) -> TopoResult<Vec<CoFaceId>> {
    if cuts.is_empty() || cuts.len() > 2 {
        return Err(TopoError::SplitCardinality {
            coface: coface.to_string(),
            found: cuts.len(),
        });
    }
    let parent = store.structured(coface)?.clone();
    if store.is_meshed(coface.into()) {
        return Err(TopoError::Meshed(coface.to_string()));
    }
    let (sides, [c0, c1, c2, c3]) = frame(&parent, dir)?;
    let side1 = sides[1].ok_or_else(|| TopoError::invariant(coface, "no side to cut"))?;
    let chain1 = store.chain(side1, c1)?;
    let chain3 = match sides[3] {
        Some(side3) => Some((side3, store.chain(side3, c0)?)),
        None => None,
    };

    // Place, sort and check the cuts before creating anything
    let off_boundary = |vertex: VertexId| TopoError::VertexNotOnBoundary {
        vertex: vertex.to_string(),
        coface: coface.to_string(),
    };
    let mut placed = Vec::with_capacity(cuts.len());
    for (a, b) in cuts {
        let pa = interior_position(&chain1, *a).ok_or_else(|| off_boundary(*a))?;
        let pb = match &chain3 {
            Some((_, chain)) => interior_position(chain, *b).ok_or_else(|| off_boundary(*b))?,
            None if *b == c0 => 0,
            None => return Err(off_boundary(*b)),
        };
        placed.push((pa, pb, *a, *b));
    }
    placed.sort();
    if let [first, second] = placed.as_slice() {
        if first.0 == second.0 || (chain3.is_some() && first.1 >= second.1) {
            return Err(TopoError::CrossingCuts(coface.to_string()));
        }
    }
    if let Some((side3, chain)) = &chain3 {
        let counts1 = junction_counts(store, side1, &chain1)?;
        let counts3 = junction_counts(store, *side3, chain)?;
        for (pa, pb, _, _) in &placed {
            if counts1[*pa] != counts3[*pb] {
                return Err(TopoError::DiscretizationMismatch {
                    first: chain1.coedges[..*pa].iter().map(|c| c.to_string()).collect(),
                    second: chain.coedges[..*pb].iter().map(|c| c.to_string()).collect(),
                    first_count: counts1[*pa],
                    second_count: counts3[*pb],
                });
            }
        }
    }

    let mut a = vec![c1];
    let mut b = vec![c0];
    for (_, _, va, vb) in &placed {
        a.push(*va);
        b.push(*vb);
    }
    a.push(c2);
    b.push(c3);

    // Lines parallel to the cuts, parent sides included
    let meshing = internal_meshing(store, sides[0], sides[2], c0, c3)?;
    let mut lines = vec![sides[0]];
    for k in 1..a.len() - 1 {
        let ce = new_coedge(store, log, b[k], a[k], meshing.clone())?;
        let edge = new_edge(store, log, b[k], a[k], vec![ce])?;
        for id in [EntityId::from(ce), edge.into()] {
            store.header_mut(id)?.geom = parent.header.geom;
        }
        lines.push(Some(edge));
    }
    lines.push(sides[2]);

    let mut children = Vec::with_capacity(a.len() - 1);
    for k in 0..a.len() - 1 {
        let along1 = Some(sub_edge(store, log, side1, a[k], a[k + 1])?);
        let along3 = match &chain3 {
            Some((side3, _)) => Some(sub_edge(store, log, *side3, b[k], b[k + 1])?),
            None => None,
        };
        let mut slots = [lines[k], along1, lines[k + 1], along3];
        if dir == Dir::J {
            slots.rotate_left(1);
        }
        let edges = close_boundary(slots, coface)?;
        let child = new_coface(store, log, edges, parent.law.clone())?;
        inherit_header(store, child, &parent)?;
        children.push(child);
    }

    replace_coface_in(store, log, coface, &children)?;
    free_coface_in(store, log, coface, true)?;
    tracing::debug!("Split {} along {} into {} cofaces", coface, dir.name(), children.len());
    Ok(children)
}

pub(crate) fn split_coface_at_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coface: CoFaceId,
    edge: EdgeId,
    ratio: f64,
) -> TopoResult<Vec<CoFaceId>> {
    if !(0.0..=1.0).contains(&ratio) {
        return Err(TopoError::InvalidArgument(format!(
            "split ratio must lie in [0, 1], got {ratio}"
        )));
    }
    let parent = store.structured(coface)?.clone();
    let index = parent.edge_index(edge).ok_or_else(|| {
        TopoError::InvalidArgument(format!("{edge} does not bound {coface}"))
    })?;
    let dir = if index % 2 == 1 { Dir::I } else { Dir::J };
    let (sides, [c0, c1, _, _]) = frame(&parent, dir)?;
    let side1 = sides[1].ok_or_else(|| TopoError::invariant(coface, "no side to cut"))?;
    let nb = store.edge_nb_meshing_edges(side1)?;
    let t = (ratio * nb as f64).round() as u32;
    if t == 0 || t >= nb {
        return Err(TopoError::InvalidArgument(format!(
            "ratio {ratio} falls on a corner of {coface}"
        )));
    }
    let a = vertex_at(store, log, side1, c1, t)?;
    let b = match sides[3] {
        Some(side3) => vertex_at(store, log, side3, c0, t)?,
        None => c0,
    };
    split_coface_in(store, log, coface, dir, &[(a, b)])
}

pub(crate) fn split_coface_ogrid_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coface: CoFaceId,
    ratio: f64,
) -> TopoResult<[CoFaceId; 3]> {
    if !(ratio > 0.0 && ratio < 1.0) {
        return Err(TopoError::InvalidArgument(format!(
            "O-grid ratio must lie in ]0, 1[, got {ratio}"
        )));
    }
    let parent = store.structured(coface)?.clone();
    if parent.nb_edges() != 3 {
        return Err(TopoError::InvalidArgument(format!(
            "O-grid split needs a 3-sided coface, {coface} has {} sides",
            parent.nb_edges()
        )));
    }
    if store.is_meshed(coface.into()) {
        return Err(TopoError::Meshed(coface.to_string()));
    }
    let (e0, e1, e2) = (parent.edges[0], parent.edges[1], parent.edges[2]);
    let (v0, v1, v2) = (parent.vertices[0], parent.vertices[1], parent.vertices[2]);
    let n0 = store.edge_nb_meshing_edges(e0)?;
    let n1 = store.edge_nb_meshing_edges(e1)?;
    let n2 = store.edge_nb_meshing_edges(e2)?;

    // Edge 1 is halved; each arm toward vertex 0 keeps what the half leaves
    let n1a = n1 / 2;
    let n1b = n1 - n1a;
    let d0 = n0 as i64 - n1b as i64;
    let d2 = n2 as i64 - n1a as i64;
    if n1a == 0 || d0 != d2 || d0 < 1 {
        return Err(TopoError::OgridCountMismatch {
            coface: coface.to_string(),
            first: d0,
            second: d2,
        });
    }
    let d = d0 as u32;

    let m = vertex_at(store, log, e1, v1, n1a)?;
    let a0 = vertex_at(store, log, e0, v0, n1b)?;
    let a2 = vertex_at(store, log, e2, v2, d)?;
    let origin = store.vertex(v0)?.coord();
    let middle = store.vertex(m)?.coord();
    let center = new_vertex(store, log, origin + (middle - origin) * ratio)?;
    store.header_mut(center.into())?.geom = parent.header.geom;

    let inner = |store: &mut TopoStore,
                     log: &mut TransactionLog,
                     from: VertexId,
                     to: VertexId,
                     nb: u32|
     -> TopoResult<EdgeId> {
        let ce = new_coedge(store, log, from, to, EdgeMeshing::uniform(nb))?;
        let edge = new_edge(store, log, from, to, vec![ce])?;
        for id in [EntityId::from(ce), edge.into()] {
            store.header_mut(id)?.geom = parent.header.geom;
        }
        Ok(edge)
    };
    let a0c = inner(store, log, a0, center, n1a)?;
    let ca2 = inner(store, log, center, a2, n1b)?;
    let mc = inner(store, log, m, center, d)?;

    let v0a0 = sub_edge(store, log, e0, v0, a0)?;
    let a0v1 = sub_edge(store, log, e0, a0, v1)?;
    let v1m = sub_edge(store, log, e1, v1, m)?;
    let mv2 = sub_edge(store, log, e1, m, v2)?;
    let v2a2 = sub_edge(store, log, e2, v2, a2)?;
    let a2v0 = sub_edge(store, log, e2, a2, v0)?;

    let law = match parent.law.select_basic(4) {
        law if law.is_structured() => law,
        _ => FaceLaw::Transfinite,
    };
    let mut children = [coface; 3];
    let boundaries = [
        vec![v0a0, a0c, ca2, a2v0],
        vec![a0v1, v1m, mc, a0c],
        vec![mc, mv2, v2a2, ca2],
    ];
    for (slot, edges) in children.iter_mut().zip(boundaries) {
        let child = new_coface(store, log, edges, law.clone())?;
        inherit_header(store, child, &parent)?;
        *slot = child;
    }

    replace_coface_in(store, log, coface, &children)?;
    free_coface_in(store, log, coface, true)?;
    tracing::debug!("O-grid split of {} around {}", coface, center);
    Ok(children)
}

/// Vertex `t` meshing edges away from `from` along `edge`, splitting a coedge if needed
pub(crate) fn vertex_at(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    edge: EdgeId,
    from: VertexId,
    t: u32,
) -> TopoResult<VertexId> {
    let chain = store.chain(edge, from)?;
    let counts = junction_counts(store, edge, &chain)?;
    for (i, coedge) in chain.coedges.iter().enumerate() {
        if counts[i] == t {
            return Ok(chain.vertices[i]);
        }
        if t < counts[i + 1] {
            let ratio = store.edge(edge)?.ratio(*coedge);
            let nb = store.coedge(*coedge)?.nb_meshing_edges();
            let local = (t - counts[i]) * ratio;
            let k = if chain.forward[i] { local } else { nb - local };
            let (vertex, _) = split_coedge_in(store, log, *coedge, SplitAt::Count(k))?;
            return Ok(vertex);
        }
    }
    match chain.last() {
        Some(last) if counts.last() == Some(&t) => Ok(last),
        _ => Err(TopoError::InvalidArgument(format!(
            "{edge} has fewer than {t} meshing edges"
        ))),
    }
}

/// Edge made of the coedges of `edge` between two of its junction vertices
fn sub_edge(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    edge: EdgeId,
    from: VertexId,
    to: VertexId,
) -> TopoResult<EdgeId> {
    let e = store.edge(edge)?;
    if e.joins(from, to) {
        return Ok(edge);
    }
    let chain = store.chain(edge, e.vertex(0))?;
    let locate = |v: VertexId| {
        chain
            .position(v)
            .ok_or_else(|| TopoError::invariant(edge, format!("{v} is not a junction")))
    };
    let (pf, pt) = (locate(from)?, locate(to)?);
    let (lo, hi, v0, v1) = if pf < pt { (pf, pt, from, to) } else { (pt, pf, to, from) };
    let coedges = chain.coedges[lo..hi].to_vec();
    let ratios: Vec<(CoEdgeId, u32)> = coedges
        .iter()
        .map(|c| (*c, e.ratio(*c)))
        .filter(|(_, r)| *r != 1)
        .collect();
    let header = e.header.clone();

    let piece = new_edge(store, log, v0, v1, coedges)?;
    let created = store.get_mut(piece)?;
    created.ratios.extend(ratios);
    created.header.groups = header.groups;
    created.header.geom = header.geom;
    Ok(piece)
}

/// Discretization of a new line crossing the coface from side 3 to side 1
fn internal_meshing(
    store: &TopoStore,
    side0: Option<EdgeId>,
    side2: Option<EdgeId>,
    c0: VertexId,
    c3: VertexId,
) -> TopoResult<EdgeMeshing> {
    for (side, start) in [(side0, c0), (side2, c3)] {
        let Some(side) = side else { continue };
        let edge = store.edge(side)?;
        if let [only] = edge.coedges() {
            if edge.ratio(*only) == 1 {
                let ce = store.coedge(*only)?;
                let meshing = ce.meshing().clone();
                return Ok(if ce.vertex(0) == start {
                    meshing
                } else {
                    meshing.reversed()
                });
            }
        }
    }
    let coedges = |side: Option<EdgeId>| -> TopoResult<Vec<CoEdgeId>> {
        match side {
            Some(side) => Ok(store.edge(side)?.coedges().to_vec()),
            None => Ok(Vec::new()),
        }
    };
    let nb = match (side0, side2) {
        (Some(side), _) | (None, Some(side)) => store.edge_nb_meshing_edges(side)?,
        (None, None) => return Err(TopoError::Internal("split frame without parallel side".into())),
    };
    Ok(EdgeMeshing::new(
        nb,
        EdgeLaw::GlobalInterpolated {
            first: coedges(side0)?,
            second: coedges(side2)?,
        },
    ))
}

/// Boundary of a child; a missing side goes last and is dropped
fn close_boundary(mut slots: [Option<EdgeId>; 4], coface: CoFaceId) -> TopoResult<Vec<EdgeId>> {
    match slots.iter().filter(|s| s.is_none()).count() {
        0 => {}
        1 => {
            let missing = slots.iter().position(|s| s.is_none()).unwrap_or(3);
            slots.rotate_left((missing + 1) % 4);
        }
        _ => {
            return Err(TopoError::invariant(
                coface,
                "a cut leaves a child with fewer than 3 sides",
            ));
        }
    }
    Ok(slots.iter().flatten().copied().collect())
}

fn inherit_header(store: &mut TopoStore, child: CoFaceId, parent: &CoFace) -> TopoResult<()> {
    let header = store.header_mut(child.into())?;
    header.groups = parent.header.groups.clone();
    header.geom = parent.header.geom;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopoConfig;
    use crate::edit::{build_quad, merge_vertices, Quad};
    use approx::assert_relative_eq;
    use glam::DVec3;

    fn setup(nb_i: u32, nb_j: u32) -> (TopoStore, Quad) {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut log = TransactionLog::begin(&store);
        let corners = [DVec3::ZERO, DVec3::X, DVec3::new(1.0, 1.0, 0.0), DVec3::Y];
        let quad = build_quad(&mut store, &mut log, corners, nb_i, nb_j).unwrap();
        log.commit(&mut store);
        (store, quad)
    }

    fn single_coedge(store: &TopoStore, edge: EdgeId) -> CoEdgeId {
        store.edge(edge).unwrap().coedges()[0]
    }

    #[test]
    fn test_split_coedge_rewires_edges() {
        let (mut store, quad) = setup(4, 4);
        let mut log = TransactionLog::begin(&store);
        let coedge = single_coedge(&store, quad.edges[0]);
        let (vertex, [c1, c2]) =
            split_coedge(&mut store, &mut log, coedge, SplitAt::Param(0.5)).unwrap();

        assert_relative_eq!(store.vertex(vertex).unwrap().coord().x, 0.5);
        assert_eq!(store.edge(quad.edges[0]).unwrap().coedges(), &[c1, c2]);
        assert_eq!(store.coedge(c1).unwrap().nb_meshing_edges(), 2);
        assert_eq!(store.coedge(c2).unwrap().nb_meshing_edges(), 2);
        assert_eq!(store.edge_nb_meshing_edges(quad.edges[0]).unwrap(), 4);
        assert!(!store.is_live(coedge));
    }

    #[test]
    fn test_split_coedge_at_end_is_refused() {
        let (mut store, quad) = setup(4, 4);
        let mut log = TransactionLog::begin(&store);
        let coedge = single_coedge(&store, quad.edges[0]);
        for at in [SplitAt::Count(0), SplitAt::Count(4), SplitAt::Param(0.05)] {
            let err = split_coedge(&mut store, &mut log, coedge, at).unwrap_err();
            assert!(matches!(err, TopoError::CannotSplitCoEdge { .. }));
        }
        assert!(log.is_empty());
    }

    #[test]
    fn test_split_quad_in_two() {
        let (mut store, quad) = setup(4, 4);
        let mut log = TransactionLog::begin(&store);
        let before = store.coface_nb_boundary_edges(quad.coface).unwrap();
        let children =
            split_coface_at(&mut store, &mut log, quad.coface, quad.edges[1], 0.5).unwrap();
        assert_eq!(children.len(), 2);
        assert!(!store.is_live(quad.coface));
        assert_eq!(store.face(quad.face).unwrap().cofaces(), children.as_slice());

        let first = store.coface(children[0]).unwrap();
        let second = store.coface(children[1]).unwrap();
        let shared: Vec<EdgeId> = first
            .edges()
            .iter()
            .copied()
            .filter(|e| second.edges().contains(e))
            .collect();
        assert_eq!(shared.len(), 1);
        assert!(!quad.edges.contains(&shared[0]));
        assert_eq!(first.vertex(0), Some(quad.vertices[0]));
        assert_eq!(first.edge(0), Some(quad.edges[0]));
        assert_eq!(second.edge(2), Some(quad.edges[2]));

        let (i0, j0) = store.nb_meshing_edges_ij(children[0]).unwrap();
        let (i1, j1) = store.nb_meshing_edges_ij(children[1]).unwrap();
        assert_eq!(i0 + i1, 4);
        assert_eq!((j0, j1), (4, 4));

        let internal = store.edge_nb_meshing_edges(shared[0]).unwrap();
        let after: u32 = children
            .iter()
            .map(|c| store.coface_nb_boundary_edges(*c).unwrap())
            .sum();
        assert_eq!(after, before + 2 * internal);
        // the cut sides are gone, their coedges live on in the pieces
        assert!(!store.is_live(quad.edges[1]));
        assert!(!store.is_live(quad.edges[3]));
        assert_eq!(store.count::<CoFace>(), 2);
    }

    #[test]
    fn test_split_in_three_and_crossing_cuts() {
        let (mut store, quad) = setup(6, 4);
        let mut log = TransactionLog::begin(&store);
        let side1 = single_coedge(&store, quad.edges[1]);
        let (a1, [_, rest]) = split_coedge(&mut store, &mut log, side1, SplitAt::Count(2)).unwrap();
        let (a2, _) = split_coedge(&mut store, &mut log, rest, SplitAt::Count(2)).unwrap();
        // edge 3 runs from vertex 3 to vertex 0
        let side3 = single_coedge(&store, quad.edges[3]);
        let (b1, [upper, _]) =
            split_coedge(&mut store, &mut log, side3, SplitAt::Count(4)).unwrap();
        let (b2, _) = split_coedge(&mut store, &mut log, upper, SplitAt::Count(2)).unwrap();

        let err = split_coface(&mut store, &mut log, quad.coface, Dir::I, &[(a1, b2), (a2, b1)])
            .unwrap_err();
        assert_eq!(err, TopoError::CrossingCuts(quad.coface.to_string()));
        let err = split_coface(&mut store, &mut log, quad.coface, Dir::I, &[]).unwrap_err();
        assert!(matches!(err, TopoError::SplitCardinality { found: 0, .. }));
        let err = split_coface(&mut store, &mut log, quad.coface, Dir::I, &[(a1, a2)]).unwrap_err();
        assert!(matches!(err, TopoError::VertexNotOnBoundary { .. }));

        let children =
            split_coface(&mut store, &mut log, quad.coface, Dir::I, &[(a2, b2), (a1, b1)]).unwrap();
        assert_eq!(children.len(), 3);
        for child in &children {
            assert_eq!(store.nb_meshing_edges_ij(*child).unwrap(), (2, 4));
        }
        assert_eq!(store.face(quad.face).unwrap().nb_cofaces(), 3);
    }

    #[test]
    fn test_split_degenerate_coface() {
        let (mut store, quad) = setup(4, 5);
        let [v0, _, _, v3] = quad.vertices;
        let mut log = TransactionLog::begin(&store);
        merge_vertices(&mut store, &mut log, v0, v3).unwrap();
        let children =
            split_coface_at(&mut store, &mut log, quad.coface, quad.edges[1], 0.5).unwrap();
        assert_eq!(children.len(), 2);
        for child in &children {
            let coface = store.coface(*child).unwrap();
            assert!(coface.is_degenerate());
            assert_eq!(coface.vertex(0), Some(v0));
        }
        // the new line copies the law of edge 0
        let internal = store.coface(children[0]).unwrap().edge(2).unwrap();
        assert_eq!(store.edge_nb_meshing_edges(internal).unwrap(), 5);
    }

    #[test]
    fn test_ogrid_split() {
        let (mut store, quad) = setup(4, 5);
        let [v0, _, _, v3] = quad.vertices;
        let mut log = TransactionLog::begin(&store);
        merge_vertices(&mut store, &mut log, v0, v3).unwrap();
        let children = split_coface_ogrid(&mut store, &mut log, quad.coface, 0.5).unwrap();
        assert_eq!(store.nb_meshing_edges_ij(children[0]).unwrap(), (2, 2));
        assert_eq!(store.nb_meshing_edges_ij(children[1]).unwrap(), (2, 3));
        assert_eq!(store.nb_meshing_edges_ij(children[2]).unwrap(), (2, 3));
        let center = store.coface(children[2]).unwrap().vertex(0).unwrap();
        let point = store.vertex(center).unwrap().coord();
        // halfway to the middle of edge 1
        assert_relative_eq!(point.x, 0.5);
        assert_relative_eq!(point.y, 0.25);
    }

    #[test]
    fn test_ogrid_count_mismatch_leaves_coface() {
        let (mut store, quad) = setup(6, 2);
        let [v0, _, _, v3] = quad.vertices;
        let mut log = TransactionLog::begin(&store);
        merge_vertices(&mut store, &mut log, v0, v3).unwrap();
        let before = log.len();
        let err = split_coface_ogrid(&mut store, &mut log, quad.coface, 0.5).unwrap_err();
        assert!(matches!(err, TopoError::OgridCountMismatch { first: -1, .. }));
        assert_eq!(log.len(), before);
        assert!(store.is_live(quad.coface));
    }
}
