//! Substitution and merging
//!
//! Replacing an entity rewrites every higher-level entity referencing it.
//! A coface losing a side while two of its vertices are merged degenerates:
//! the collapsed side goes last and is dropped. Below three vertices the
//! coface is destroyed, together with the edges nothing uses anymore, and a
//! face left without coface goes with it.
//!
//! Hexahedral blocks keep their 8 corner slots while vertices merge, so a
//! corner pair may coincide for a moment. Once a side face is gone, the block
//! is reordered with that side at `k_max` and its collapsed corners dropped.
//! Public edits refuse to leave a block outside [`BLOCK_FORMS`].

use std::collections::{BTreeMap, BTreeSet};

use crate::constants::BLOCK_FORMS;
use crate::entity::{CoEdge, CoFace, Edge, Face};
use crate::error::{TopoError, TopoResult};
use crate::id::{BlockId, CoEdgeId, CoFaceId, EdgeId, EntityId, FaceId, VertexId};
use crate::provider::GeometryProvider;
use crate::store::TopoStore;
use crate::txn::TransactionLog;

use super::free::{free_coedge_in, free_coface_in, free_edge_in, free_face_in, free_vertex_in};

/// Substitute `new` for `old` in every entity above `old`
pub fn replace_vertex(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    old: VertexId,
    new: VertexId,
) -> TopoResult<()> {
    log.atomic(store, |store, log| {
        let blocks = blocks_around(store, &[old])?;
        replace_vertex_in(store, log, old, new)?;
        check_block_forms(store, &blocks)
    })
}

/// Merge `gone` into `keep`, which inherits its groups
pub fn merge_vertices(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    keep: VertexId,
    gone: VertexId,
) -> TopoResult<()> {
    log.atomic(store, |store, log| {
        let blocks = blocks_around(store, &[gone])?;
        merge_vertices_in(store, log, keep, gone)?;
        check_block_forms(store, &blocks)
    })
}

/// Collapse a side face of a hexahedral block.
///
/// `edge` lies on the single coface of `face`; it collapses together with
/// its opposite edge, the two other sides of the face fuse and the block
/// becomes a prism. With `to_point` the fused side collapses as well and
/// the block becomes a pyramid. Each collapsed edge keeps its first vertex.
pub fn collapse_block_face(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    geom: &dyn GeometryProvider,
    block: BlockId,
    face: FaceId,
    edge: EdgeId,
    to_point: bool,
) -> TopoResult<()> {
    let hexa = store.block(block)?;
    if (hexa.nb_faces(), hexa.nb_vertices()) != BLOCK_FORMS[0] {
        return Err(TopoError::InvalidArgument(format!("{block} is already degenerate")));
    }
    if !hexa.faces().contains(&face) {
        return Err(TopoError::InvalidArgument(format!("{face} does not bound {block}")));
    }
    let coface = match store.face(face)?.cofaces() {
        [coface] => *coface,
        _ => {
            return Err(TopoError::Unsupported(format!(
                "collapse of {face}, made of several cofaces"
            )));
        }
    };
    let f = store.coface(coface)?;
    let k = match (f.nb_edges(), f.edge_index(edge)) {
        (4, Some(k)) => k,
        _ => return Err(TopoError::NotStructured(coface.to_string())),
    };
    let opposite = f
        .opposite_edge(edge)?
        .ok_or_else(|| TopoError::NotStructured(coface.to_string()))?;
    let sides = [(k + 1) % 4, (k + 3) % 4].map(|n| f.edge(n));
    let [a, b] = store.edge(edge)?.vertices();
    let [c, d] = store.edge(opposite)?.vertices();

    log.atomic(store, |store, log| {
        let blocks = blocks_around(store, &[a, b, c, d])?;
        merge_vertices_in(store, log, a, b)?;
        merge_vertices_in(store, log, c, d)?;
        if let [Some(keep), Some(gone)] = sides {
            if store.is_live(keep) && store.is_live(gone) {
                merge_edges_in(store, log, geom, keep, gone)?;
            }
        }
        if to_point {
            merge_vertices_in(store, log, a, c)?;
        }
        tracing::debug!("Collapsed {} of {}", face, block);
        check_block_forms(store, &blocks)
    })
}

/// Merge two coedges joining the same vertices with the same discretization
pub fn merge_coedges(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    geom: &dyn GeometryProvider,
    keep: CoEdgeId,
    gone: CoEdgeId,
) -> TopoResult<()> {
    log.atomic(store, |store, log| merge_coedges_in(store, log, geom, keep, gone))
}

/// Merge two edges joining the same vertices; `gone` coedges left unused are freed
pub fn merge_edges(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    geom: &dyn GeometryProvider,
    keep: EdgeId,
    gone: EdgeId,
) -> TopoResult<()> {
    log.atomic(store, |store, log| merge_edges_in(store, log, geom, keep, gone))
}

/// Substitute `keep` for `gone` in every face, then free `gone`
pub fn merge_cofaces(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    geom: &dyn GeometryProvider,
    keep: CoFaceId,
    gone: CoFaceId,
) -> TopoResult<()> {
    log.atomic(store, |store, log| merge_cofaces_in(store, log, geom, keep, gone))
}

pub(crate) fn replace_vertex_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    old: VertexId,
    new: VertexId,
) -> TopoResult<()> {
    if old == new {
        return Ok(());
    }
    store.vertex(new)?;

    // Gather everything above `old` before touching anything
    let coedges: Vec<CoEdgeId> = live(store, store.vertex(old)?.coedges().iter().copied());
    let mut edges = BTreeSet::new();
    for c in &coedges {
        edges.extend(store.coedge(*c)?.edges().iter().copied());
    }
    let edges: Vec<EdgeId> = live(store, edges.into_iter());
    let mut cofaces = BTreeSet::new();
    for e in &edges {
        cofaces.extend(store.edge(*e)?.cofaces().iter().copied());
    }
    let cofaces: Vec<CoFaceId> = live(store, cofaces.into_iter());
    let mut collapsing: BTreeMap<CoFaceId, EdgeId> = BTreeMap::new();
    let mut faces = BTreeSet::new();
    for f in &cofaces {
        let coface = store.coface(*f)?;
        faces.extend(coface.faces().iter().copied());
        if coface.vertices().contains(&old) && coface.vertices().contains(&new) {
            let side = coface
                .edges()
                .iter()
                .copied()
                .find(|e| store.edge(*e).is_ok_and(|edge| edge.joins(old, new)))
                .ok_or_else(|| TopoError::NonAdjacentVertices {
                    first: new.to_string(),
                    second: old.to_string(),
                    coface: f.to_string(),
                })?;
            collapsing.insert(*f, side);
        }
    }
    // Face order of each block before anything is freed
    let mut blocks: BTreeMap<BlockId, Vec<FaceId>> = BTreeMap::new();
    for f in &faces {
        if store.is_live(*f) {
            for b in store.face(*f)?.blocks() {
                if store.is_live(*b) {
                    blocks.insert(*b, store.block(*b)?.faces().to_vec());
                }
            }
        }
    }

    // Coedges
    let mut collapsed_coedges = Vec::new();
    for c in &coedges {
        let vertices = store.coedge(*c)?.vertices().map(|v| if v == old { new } else { v });
        store.rewire::<CoEdge>(log, *c, vertices.to_vec())?;
        if vertices[0] == vertices[1] {
            collapsed_coedges.push(*c);
        }
    }

    // Edges
    let mut collapsed_edges = Vec::new();
    for e in &edges {
        let edge = store.edge(*e)?;
        let ends = edge.vertices().map(|v| if v == old { new } else { v });
        let kept: Vec<CoEdgeId> = edge
            .coedges()
            .iter()
            .copied()
            .filter(|c| !collapsed_coedges.contains(c))
            .collect();
        let changed_ends = ends != edge.vertices();
        let dropped = kept.len() != edge.nb_coedges();
        if changed_ends {
            log.save(store, (*e).into())?;
            store.get_mut(*e)?.vertices = ends;
        }
        if dropped {
            store.rewire::<Edge>(log, *e, kept.clone())?;
        }
        if ends[0] == ends[1] && kept.is_empty() {
            collapsed_edges.push(*e);
        }
    }

    // Cofaces
    for f in &cofaces {
        let coface = store.coface(*f)?;
        if !coface.vertices().contains(&old) {
            continue;
        }
        let structured = coface.is_structured();
        let mut vertices = coface.vertices().to_vec();
        let mut boundary = coface.edges().to_vec();
        log.save(store, (*f).into())?;

        match collapsing.get(f) {
            Some(side) if structured && boundary.len() == 4 => {
                let k = index_of(&boundary, *side, *f)?;
                boundary.rotate_left((k + 1) % 4);
                vertices.rotate_left((k + 1) % 4);
                substitute(&mut vertices, old, new);
                vertices.truncate(3);
                boundary.truncate(3);
            }
            Some(side) => {
                boundary.retain(|e| e != side);
                vertices.retain(|v| *v != old);
            }
            None => substitute(&mut vertices, old, new),
        }

        if vertices.len() < 3 {
            tracing::debug!("{} degenerates below 3 vertices", f);
            free_coface_in(store, log, *f, true)?;
            continue;
        }
        store.get_mut(*f)?.vertices = vertices;
        store.rewire::<CoFace>(log, *f, boundary)?;
    }

    // Faces left without coface go, the others update their corners
    for f in faces {
        if !store.is_live(f) {
            continue;
        }
        let face = store.face(f)?;
        if face.nb_cofaces() == 0 {
            tracing::debug!("{} lost its last coface", f);
            free_face_in(store, log, f)?;
        } else if face.vertices().contains(&old) {
            log.save(store, f.into())?;
            substitute_unique(&mut store.get_mut(f)?.vertices, old, new);
        }
    }
    for (b, before) in blocks {
        if store.is_live(b) {
            settle_block(store, log, b, &before, old, new)?;
        }
    }

    for e in collapsed_edges {
        if store.is_live(e) {
            free_edge_in(store, log, e, false)?;
        }
    }
    for c in collapsed_coedges {
        if store.is_live(c) {
            free_coedge_in(store, log, c)?;
        }
    }
    tracing::debug!("Replaced {} by {}", old, new);
    Ok(())
}

pub(crate) fn merge_vertices_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    keep: VertexId,
    gone: VertexId,
) -> TopoResult<()> {
    if keep == gone {
        return Err(TopoError::SameEntity(keep.to_string()));
    }
    replace_vertex_in(store, log, gone, keep)?;
    inherit_groups(store, log, keep.into(), gone.into())?;
    free_vertex_in(store, log, gone)
}

/// Substitute `new` for `old` in every edge built on `old`
pub(crate) fn replace_coedge_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    old: CoEdgeId,
    new: CoEdgeId,
) -> TopoResult<()> {
    let parents: Vec<EdgeId> = store.coedge(old)?.edges().iter().copied().collect();
    for e in parents {
        let edge = store.edge(e)?;
        let ratio = edge.ratio(old);
        let children: Vec<CoEdgeId> = if edge.coedges().contains(&new) {
            edge.coedges().iter().copied().filter(|c| *c != old).collect()
        } else {
            edge.coedges()
                .iter()
                .map(|c| if *c == old { new } else { *c })
                .collect()
        };
        store.rewire::<Edge>(log, e, children)?;
        if ratio != 1 {
            store.get_mut(e)?.ratios.insert(new, ratio);
        }
    }
    Ok(())
}

/// Substitute `new` for `old` in every coface bounded by `old`
pub(crate) fn replace_edge_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    old: EdgeId,
    new: EdgeId,
) -> TopoResult<()> {
    let parents: Vec<CoFaceId> = store.edge(old)?.cofaces().iter().copied().collect();
    for f in parents {
        let edges = store.coface(f)?.edges();
        let children: Vec<EdgeId> = if edges.contains(&new) {
            edges.iter().copied().filter(|e| *e != old).collect()
        } else {
            edges.iter().map(|e| if *e == old { new } else { *e }).collect()
        };
        store.rewire::<CoFace>(log, f, children)?;
    }
    Ok(())
}

/// Substitute `new` for `old` in every face aggregating `old`
pub(crate) fn replace_coface_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    old: CoFaceId,
    new: &[CoFaceId],
) -> TopoResult<()> {
    let parents: Vec<_> = store.coface(old)?.faces().iter().copied().collect();
    for face in parents {
        let mut children = Vec::new();
        for c in store.face(face)?.cofaces() {
            if *c == old {
                children.extend(new.iter().copied());
            } else if !new.contains(c) {
                children.push(*c);
            }
        }
        store.rewire::<Face>(log, face, children)?;
    }
    Ok(())
}

pub(crate) fn merge_coedges_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    geom: &dyn GeometryProvider,
    keep: CoEdgeId,
    gone: CoEdgeId,
) -> TopoResult<()> {
    if keep == gone {
        return Err(TopoError::SameEntity(keep.to_string()));
    }
    let (k, g) = (store.coedge(keep)?, store.coedge(gone)?);
    let same_ends = k.vertices() == g.vertices() || k.vertices() == [g.vertex(1), g.vertex(0)];
    if !same_ends {
        return Err(TopoError::InvalidArgument(format!(
            "{keep} and {gone} do not join the same vertices"
        )));
    }
    if k.nb_meshing_edges() != g.nb_meshing_edges() {
        return Err(TopoError::DiscretizationMismatch {
            first: vec![keep.to_string()],
            second: vec![gone.to_string()],
            first_count: k.nb_meshing_edges(),
            second_count: g.nb_meshing_edges(),
        });
    }
    replace_coedge_in(store, log, gone, keep)?;
    inherit_groups(store, log, keep.into(), gone.into())?;
    inherit_geom(store, log, geom, keep.into(), gone.into())?;
    free_coedge_in(store, log, gone)
}

pub(crate) fn merge_edges_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    geom: &dyn GeometryProvider,
    keep: EdgeId,
    gone: EdgeId,
) -> TopoResult<()> {
    if keep == gone {
        return Err(TopoError::SameEntity(keep.to_string()));
    }
    let [a, b] = store.edge(keep)?.vertices();
    if !store.edge(gone)?.joins(a, b) {
        return Err(TopoError::InvalidArgument(format!(
            "{keep} and {gone} do not join the same vertices"
        )));
    }
    replace_edge_in(store, log, gone, keep)?;
    inherit_groups(store, log, keep.into(), gone.into())?;
    inherit_geom(store, log, geom, keep.into(), gone.into())?;
    free_edge_in(store, log, gone, true)
}

pub(crate) fn merge_cofaces_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    geom: &dyn GeometryProvider,
    keep: CoFaceId,
    gone: CoFaceId,
) -> TopoResult<()> {
    if keep == gone {
        return Err(TopoError::SameEntity(keep.to_string()));
    }
    store.coface(keep)?;
    replace_coface_in(store, log, gone, &[keep])?;
    inherit_groups(store, log, keep.into(), gone.into())?;
    inherit_geom(store, log, geom, keep.into(), gone.into())?;
    free_coface_in(store, log, gone, true)
}

fn inherit_groups(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    keep: EntityId,
    gone: EntityId,
) -> TopoResult<()> {
    let missing: Vec<String> = match (store.header(keep), store.header(gone)) {
        (Some(k), Some(g)) => g.groups.difference(&k.groups).cloned().collect(),
        _ => return Err(TopoError::NotFound(format!("{keep} or {gone}"))),
    };
    if missing.is_empty() {
        return Ok(());
    }
    log.save_groups(store, keep)?;
    store.header_mut(keep)?.groups.extend(missing);
    Ok(())
}

/// `keep` takes the geometric association of `gone` when its own is missing or destroyed
fn inherit_geom(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    geom: &dyn GeometryProvider,
    keep: EntityId,
    gone: EntityId,
) -> TopoResult<()> {
    let mine = store.header(keep).and_then(|h| h.geom);
    let theirs = store.header(gone).and_then(|h| h.geom);
    let take = match (mine, theirs) {
        (None, Some(_)) => true,
        (Some(m), Some(t)) => geom.is_destroyed(m) && !geom.is_destroyed(t),
        _ => false,
    };
    if take {
        log.save(store, keep)?;
        store.header_mut(keep)?.geom = theirs;
    }
    Ok(())
}

/// Update the corners of `block` after `old` became `new` and some of its
/// faces may have been freed
fn settle_block(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    block: BlockId,
    before: &[FaceId],
    old: VertexId,
    new: VertexId,
) -> TopoResult<()> {
    let b = store.block(block)?;
    let mut vertices = b.vertices().to_vec();
    let faces = b.faces().to_vec();
    if !vertices.contains(&old) && faces.len() == before.len() {
        return Ok(());
    }
    log.save(store, block.into())?;

    if (before.len(), vertices.len()) != BLOCK_FORMS[0] {
        substitute_unique(&mut vertices, old, new);
        store.get_mut(block)?.vertices = vertices;
        return Ok(());
    }
    substitute(&mut vertices, old, new);
    let dropped: Vec<usize> = (0..before.len())
        .filter(|k| !faces.contains(&before[*k]))
        .collect();
    let [k] = dropped.as_slice() else {
        // Corner slots are kept; the form check decides
        store.get_mut(block)?.vertices = vertices;
        return Ok(());
    };

    let (corners, sides) = kmax_permutation(*k);
    let mut settled: Vec<VertexId> = corners[..4].iter().map(|n| vertices[*n]).collect();
    for n in &corners[4..] {
        if !settled.contains(&vertices[*n]) {
            settled.push(vertices[*n]);
        }
    }
    let ordered: Vec<FaceId> = sides[..5].iter().map(|f| before[*f]).collect();
    tracing::debug!(
        "{} settles with {} faces and {} vertices",
        block,
        ordered.len(),
        settled.len()
    );
    let entity = store.get_mut(block)?;
    entity.vertices = settled;
    entity.faces = ordered;
    Ok(())
}

/// Corner and face orders of a hexahedral block bringing face `k` to `k_max`.
///
/// Corner `n` of the new order is corner `corners[n]` of the old one, and
/// likewise for faces.
fn kmax_permutation(k: usize) -> ([usize; 8], [usize; 6]) {
    // old axis carried by the new i, j and k
    let axes = match k / 2 {
        0 => [1, 2, 0],
        1 => [2, 0, 1],
        _ => [0, 1, 2],
    };
    let flip = k % 2 == 0;
    let corners = std::array::from_fn(|n| {
        let mut old = [0; 3];
        for (a, axis) in axes.iter().enumerate() {
            let side = (n >> a) & 1;
            old[*axis] = if a == 2 && flip { side ^ 1 } else { side };
        }
        old[0] + 2 * old[1] + 4 * old[2]
    });
    let sides = std::array::from_fn(|f| {
        let (a, side) = (f / 2, f % 2);
        let side = if a == 2 && flip { side ^ 1 } else { side };
        2 * axes[a] + side
    });
    (corners, sides)
}

/// Live blocks built on any of `vertices`
pub(crate) fn blocks_around(store: &TopoStore, vertices: &[VertexId]) -> TopoResult<BTreeSet<BlockId>> {
    let mut coedges = BTreeSet::new();
    for v in vertices {
        coedges.extend(store.vertex(*v)?.coedges().iter().copied());
    }
    let mut edges = BTreeSet::new();
    for c in live(store, coedges.into_iter()) {
        edges.extend(store.coedge(c)?.edges().iter().copied());
    }
    let mut cofaces = BTreeSet::new();
    for e in live(store, edges.into_iter()) {
        cofaces.extend(store.edge(e)?.cofaces().iter().copied());
    }
    let mut faces = BTreeSet::new();
    for f in live(store, cofaces.into_iter()) {
        faces.extend(store.coface(f)?.faces().iter().copied());
    }
    let mut blocks = BTreeSet::new();
    for f in live(store, faces.into_iter()) {
        blocks.extend(store.face(f)?.blocks().iter().copied());
    }
    Ok(live(store, blocks.into_iter()).into_iter().collect())
}

/// Refuse blocks whose distinct corners and faces fit no block form
pub(crate) fn check_block_forms(store: &TopoStore, blocks: &BTreeSet<BlockId>) -> TopoResult<()> {
    for id in blocks {
        if !store.is_live(*id) {
            continue;
        }
        let block = store.block(*id)?;
        let distinct: BTreeSet<VertexId> = block.vertices().iter().copied().collect();
        let form = (block.nb_faces(), distinct.len());
        if distinct.len() != block.nb_vertices() || !BLOCK_FORMS.contains(&form) {
            return Err(TopoError::DegenerateBlock {
                block: id.to_string(),
                faces: form.0,
                vertices: form.1,
            });
        }
    }
    Ok(())
}

fn live<I: crate::id::TypedId>(store: &TopoStore, ids: impl Iterator<Item = I>) -> Vec<I> {
    ids.filter(|id| store.is_live(*id)).collect()
}

fn index_of(edges: &[EdgeId], edge: EdgeId, coface: CoFaceId) -> TopoResult<usize> {
    edges
        .iter()
        .position(|e| *e == edge)
        .ok_or_else(|| TopoError::invariant(coface, format!("{edge} is not on its boundary")))
}

fn substitute(vertices: &mut [VertexId], old: VertexId, new: VertexId) {
    for v in vertices.iter_mut() {
        if *v == old {
            *v = new;
        }
    }
}

fn substitute_unique(vertices: &mut Vec<VertexId>, old: VertexId, new: VertexId) {
    if vertices.contains(&new) {
        vertices.retain(|v| *v != old);
    } else {
        substitute(vertices, old, new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopoConfig;
    use crate::edit::{build_hexahedron, build_quad, Hexahedron, Quad};
    use crate::provider::NullGeometry;
    use glam::DVec3;

    fn setup() -> (TopoStore, Quad) {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut log = TransactionLog::begin(&store);
        let corners = [DVec3::ZERO, DVec3::X, DVec3::new(1.0, 1.0, 0.0), DVec3::Y];
        let quad = build_quad(&mut store, &mut log, corners, 4, 4).unwrap();
        log.commit(&mut store);
        (store, quad)
    }

    #[test]
    fn test_merge_adjacent_vertices_degenerates_quad() {
        let (mut store, quad) = setup();
        let [v0, v1, v2, v3] = quad.vertices;
        let mut log = TransactionLog::begin(&store);
        // collapse the side between v3 and v0
        merge_vertices(&mut store, &mut log, v0, v3).unwrap();

        let coface = store.coface(quad.coface).unwrap();
        assert_eq!(coface.nb_edges(), 3);
        assert_eq!(coface.vertices(), &[v0, v1, v2]);
        assert!(coface.is_degenerate());
        assert!(!store.is_live(quad.edges[3]));
        assert!(!store.is_live(v3));
        assert_eq!(store.face(quad.face).unwrap().vertices(), &[v0, v1, v2]);
        // e2 now ends at v0
        assert!(store.edge(quad.edges[2]).unwrap().joins(v2, v0));
    }

    #[test]
    fn test_degenerate_below_three_vertices_cascades() {
        let (mut store, quad) = setup();
        let [v0, v1, v2, v3] = quad.vertices;
        let mut log = TransactionLog::begin(&store);
        merge_vertices(&mut store, &mut log, v0, v3).unwrap();
        merge_vertices(&mut store, &mut log, v1, v2).unwrap();

        assert!(!store.is_live(quad.coface));
        assert!(!store.is_live(quad.face));
        assert_eq!(store.count::<Edge>(), 0);
        assert_eq!(store.count::<CoEdge>(), 0);
        assert!(store.is_live(v0) && store.is_live(v1));
        crate::validate::check_all(&store, &NullGeometry).unwrap();
    }

    #[test]
    fn test_merge_across_quad_diagonal_is_refused() {
        let (mut store, quad) = setup();
        let [v0, _, v2, _] = quad.vertices;
        let mut log = TransactionLog::begin(&store);
        let err = merge_vertices(&mut store, &mut log, v0, v2).unwrap_err();

        assert_eq!(
            err,
            TopoError::NonAdjacentVertices {
                first: v0.to_string(),
                second: v2.to_string(),
                coface: quad.coface.to_string(),
            }
        );
        assert_eq!(err.kind(), crate::error::ErrorKind::Precondition);
        assert!(log.is_empty());
        assert!(store.is_live(v2));
        assert_eq!(store.coface(quad.coface).unwrap().nb_edges(), 4);
    }

    fn hexa_setup() -> (TopoStore, Hexahedron) {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut log = TransactionLog::begin(&store);
        let corners = std::array::from_fn(|n| {
            DVec3::new((n & 1) as f64, ((n >> 1) & 1) as f64, ((n >> 2) & 1) as f64)
        });
        let hexa = build_hexahedron(&mut store, &mut log, corners, [2, 2, 2]).unwrap();
        log.commit(&mut store);
        (store, hexa)
    }

    #[test]
    fn test_collapse_block_side_gives_prism() {
        let (mut store, hexa) = hexa_setup();
        let v = hexa.vertices;
        let edge = store.edge_between(hexa.cofaces[1], v[1], v[5]).unwrap();
        let mut log = TransactionLog::begin(&store);
        collapse_block_face(&mut store, &mut log, &NullGeometry, hexa.block, hexa.faces[1], edge, false)
            .unwrap();

        let block = store.block(hexa.block).unwrap();
        assert_eq!((block.nb_faces(), block.nb_vertices()), (5, 6));
        // the collapsed side is gone and the face opposite it is now k_min
        let f = hexa.faces;
        assert_eq!(block.faces(), &[f[2], f[3], f[4], f[5], f[0]]);
        assert_eq!(&block.vertices()[..4], &[v[0], v[2], v[4], v[6]]);
        assert!(!store.is_live(f[1]));
        assert!(!store.is_live(hexa.cofaces[1]));
        assert_eq!(store.count::<crate::entity::Vertex>(), 6);
        // twelve edges, less the two collapsed ones and one fused side
        assert_eq!(store.count::<Edge>(), 9);
        crate::validate::check_all(&store, &NullGeometry).unwrap();
    }

    #[test]
    fn test_collapse_block_side_to_point_gives_pyramid() {
        let (mut store, hexa) = hexa_setup();
        let v = hexa.vertices;
        let edge = store.edge_between(hexa.cofaces[4], v[0], v[1]).unwrap();
        let mut log = TransactionLog::begin(&store);
        collapse_block_face(&mut store, &mut log, &NullGeometry, hexa.block, hexa.faces[4], edge, true)
            .unwrap();

        let block = store.block(hexa.block).unwrap();
        assert_eq!((block.nb_faces(), block.nb_vertices()), (5, 5));
        assert_eq!(block.faces()[4], hexa.faces[5]);
        assert_eq!(&block.vertices()[..4], &[v[4], v[5], v[6], v[7]]);
        assert_eq!(store.count::<crate::entity::Vertex>(), 5);
        assert_eq!(store.count::<Edge>(), 8);
        crate::validate::check_all(&store, &NullGeometry).unwrap();
    }

    #[test]
    fn test_lone_corner_merge_on_block_rolls_back() {
        let (mut store, hexa) = hexa_setup();
        let v = hexa.vertices;
        let mut log = TransactionLog::begin(&store);
        let err = merge_vertices(&mut store, &mut log, v[1], v[5]).unwrap_err();

        assert_eq!(
            err,
            TopoError::DegenerateBlock {
                block: hexa.block.to_string(),
                faces: 6,
                vertices: 7,
            }
        );
        assert!(log.is_empty());
        assert!(store.is_live(v[5]));
        assert_eq!(store.block(hexa.block).unwrap().vertices(), &v);
        crate::validate::check_all(&store, &NullGeometry).unwrap();
    }

    #[test]
    fn test_kmax_permutation_keeps_kmax_in_place() {
        let (corners, sides) = kmax_permutation(5);
        assert_eq!(corners, [0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(sides, [0, 1, 2, 3, 4, 5]);
        for k in 0..6 {
            let (corners, sides) = kmax_permutation(k);
            assert_eq!(sides[5], k);
            let mut seen = corners.to_vec();
            seen.sort_unstable();
            assert_eq!(seen, (0..8).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_merge_coedges_checks_counts() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut log = TransactionLog::begin(&store);
        let a = crate::edit::new_vertex(&mut store, &mut log, DVec3::ZERO).unwrap();
        let b = crate::edit::new_vertex(&mut store, &mut log, DVec3::X).unwrap();
        let c1 = crate::edit::new_coedge(&mut store, &mut log, a, b, crate::law::EdgeMeshing::uniform(3))
            .unwrap();
        let c2 = crate::edit::new_coedge(&mut store, &mut log, b, a, crate::law::EdgeMeshing::uniform(4))
            .unwrap();
        let err = merge_coedges(&mut store, &mut log, &NullGeometry, c1, c2).unwrap_err();
        assert!(matches!(err, TopoError::DiscretizationMismatch { .. }));

        crate::edit::set_edge_meshing(&mut store, &mut log, c2, crate::law::EdgeMeshing::uniform(3))
            .unwrap();
        let e2 = crate::edit::new_edge(&mut store, &mut log, b, a, vec![c2]).unwrap();
        merge_coedges(&mut store, &mut log, &NullGeometry, c1, c2).unwrap();
        assert_eq!(store.edge(e2).unwrap().coedges(), &[c1]);
        assert!(!store.is_live(c2));
    }
}
