//! Freeing entities
//!
//! Freeing marks an entity destroyed and clears every link pointing to it.
//! The slot itself stays allocated while a transaction log retains it.

use std::collections::BTreeSet;

use crate::entity::{Block, CoEdge, CoFace, Edge, Face, Lifecycle};
use crate::error::{TopoError, TopoResult};
use crate::id::{BlockId, CoEdgeId, CoFaceId, EdgeId, EntityId, EntityKind, FaceId, VertexId};
use crate::store::TopoStore;
use crate::txn::TransactionLog;

/// Free a vertex no coedge uses anymore
pub fn free_vertex(store: &mut TopoStore, log: &mut TransactionLog, vertex: VertexId) -> TopoResult<()> {
    log.atomic(store, |store, log| free_vertex_in(store, log, vertex))
}

/// Free a coedge, removing it from the edges that aggregate it
pub fn free_coedge(store: &mut TopoStore, log: &mut TransactionLog, coedge: CoEdgeId) -> TopoResult<()> {
    log.atomic(store, |store, log| free_coedge_in(store, log, coedge))
}

/// Free an edge; coedges left without any edge are freed too
pub fn free_edge(store: &mut TopoStore, log: &mut TransactionLog, edge: EdgeId) -> TopoResult<()> {
    log.atomic(store, |store, log| free_edge_in(store, log, edge, true))
}

/// Free a coface; edges left without any coface are freed too
pub fn free_coface(store: &mut TopoStore, log: &mut TransactionLog, coface: CoFaceId) -> TopoResult<()> {
    log.atomic(store, |store, log| free_coface_in(store, log, coface, true))
}

pub fn free_face(store: &mut TopoStore, log: &mut TransactionLog, face: FaceId) -> TopoResult<()> {
    log.atomic(store, |store, log| free_face_in(store, log, face))
}

pub fn free_block(store: &mut TopoStore, log: &mut TransactionLog, block: BlockId) -> TopoResult<()> {
    log.atomic(store, |store, log| free_block_in(store, log, block))
}

fn mark_destroyed(store: &mut TopoStore, log: &mut TransactionLog, id: EntityId) -> TopoResult<()> {
    if store.is_meshed(id) {
        return Err(TopoError::MeshNotReleased(id.to_string()));
    }
    log.deleted(store, id)?;
    store.set_lifecycle(id, Lifecycle::Destroyed);
    tracing::debug!("Freed {}", id);
    Ok(())
}

pub(crate) fn free_vertex_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    vertex: VertexId,
) -> TopoResult<()> {
    let v = store.vertex(vertex)?;
    if let Some(user) = v.coedges().iter().find(|c| store.is_live(**c)) {
        return Err(TopoError::StillReferenced {
            entity: vertex.to_string(),
            by: user.to_string(),
        });
    }
    mark_destroyed(store, log, vertex.into())
}

pub(crate) fn free_coedge_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coedge: CoEdgeId,
) -> TopoResult<()> {
    if store.is_meshed(coedge.into()) {
        return Err(TopoError::MeshNotReleased(coedge.to_string()));
    }
    let parents: Vec<EdgeId> = store.coedge(coedge)?.edges().iter().copied().collect();
    for edge in parents {
        let children = without(store.edge(edge)?.coedges(), coedge);
        store.rewire::<Edge>(log, edge, children)?;
    }
    store.unlink_children::<CoEdge>(log, coedge)?;
    mark_destroyed(store, log, coedge.into())
}

pub(crate) fn free_edge_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    edge: EdgeId,
    cascade: bool,
) -> TopoResult<()> {
    if store.is_meshed(edge.into()) {
        return Err(TopoError::MeshNotReleased(edge.to_string()));
    }
    let e = store.edge(edge)?;
    let parents: Vec<CoFaceId> = e.cofaces().iter().copied().collect();
    let children = e.coedges().to_vec();
    for coface in parents {
        let edges = without(store.coface(coface)?.edges(), edge);
        store.rewire::<CoFace>(log, coface, edges)?;
    }
    store.unlink_children::<Edge>(log, edge)?;
    mark_destroyed(store, log, edge.into())?;

    if cascade {
        for coedge in dedup(children) {
            if store.is_live(coedge) && store.coedge(coedge)?.nb_edges() == 0 {
                free_coedge_in(store, log, coedge)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn free_coface_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coface: CoFaceId,
    cascade: bool,
) -> TopoResult<()> {
    if store.is_meshed(coface.into()) {
        return Err(TopoError::MeshNotReleased(coface.to_string()));
    }
    let f = store.coface(coface)?;
    let parents: Vec<FaceId> = f.faces().iter().copied().collect();
    let children = f.edges().to_vec();
    for face in parents {
        let cofaces = without(store.face(face)?.cofaces(), coface);
        store.rewire::<Face>(log, face, cofaces)?;
    }
    store.unlink_children::<CoFace>(log, coface)?;
    mark_destroyed(store, log, coface.into())?;

    if cascade {
        for edge in dedup(children) {
            if store.is_live(edge) && store.edge(edge)?.nb_cofaces() == 0 {
                free_edge_in(store, log, edge, true)?;
            }
        }
    }
    Ok(())
}

pub(crate) fn free_face_in(store: &mut TopoStore, log: &mut TransactionLog, face: FaceId) -> TopoResult<()> {
    if store.is_meshed(face.into()) {
        return Err(TopoError::MeshNotReleased(face.to_string()));
    }
    let parents: Vec<BlockId> = store.face(face)?.blocks().iter().copied().collect();
    for block in parents {
        let faces = without(store.block(block)?.faces(), face);
        store.rewire::<Block>(log, block, faces)?;
    }
    store.unlink_children::<Face>(log, face)?;
    mark_destroyed(store, log, face.into())
}

pub(crate) fn free_block_in(store: &mut TopoStore, log: &mut TransactionLog, block: BlockId) -> TopoResult<()> {
    if store.is_meshed(block.into()) {
        return Err(TopoError::MeshNotReleased(block.to_string()));
    }
    store.block(block)?;
    store.unlink_children::<Block>(log, block)?;
    mark_destroyed(store, log, block.into())
}

fn free_any(store: &mut TopoStore, log: &mut TransactionLog, id: EntityId) -> TopoResult<()> {
    match id {
        EntityId::Vertex(v) => free_vertex_in(store, log, v),
        EntityId::CoEdge(c) => free_coedge_in(store, log, c),
        EntityId::Edge(e) => free_edge_in(store, log, e, false),
        EntityId::CoFace(f) => free_coface_in(store, log, f, false),
        EntityId::Face(f) => free_face_in(store, log, f),
        EntityId::Block(b) => free_block_in(store, log, b),
    }
}

// ============== Destruction of a selection ==============

/// Destroy a selection of entities and whatever depends on them.
///
/// Higher-dimension entities built on the selection are destroyed with it.
/// With `propagate`, the lower-dimension entities of the selection are
/// destroyed as well, unless something outside the destruction still uses
/// them. Returns the freed entities, highest dimension first.
pub fn destroy_entities(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    entities: &[EntityId],
    propagate: bool,
) -> TopoResult<Vec<EntityId>> {
    log.atomic(store, |store, log| {
        let mut marked = BTreeSet::new();
        for id in entities {
            if store.lifecycle(*id) != Some(Lifecycle::Live) {
                return Err(TopoError::NotFound(id.to_string()));
            }
            mark_up(store, *id, &mut marked)?;
            if propagate {
                mark_down(store, *id, &mut marked)?;
            }
        }

        let mut ordered: Vec<EntityId> = marked.into_iter().collect();
        ordered.sort_by(|a, b| b.kind().cmp(&a.kind()).then(a.cmp(b)));

        let mut freed = Vec::new();
        for id in ordered {
            if store.lifecycle(id) != Some(Lifecycle::Live) || has_live_parent(store, id)? {
                continue;
            }
            free_any(store, log, id)?;
            freed.push(id);
        }
        tracing::debug!("Destroyed {} entity(ies)", freed.len());
        Ok(freed)
    })
}

fn parents(store: &TopoStore, id: EntityId) -> TopoResult<Vec<EntityId>> {
    Ok(match id {
        EntityId::Vertex(v) => store.vertex(v)?.coedges().iter().map(|p| (*p).into()).collect(),
        EntityId::CoEdge(c) => store.coedge(c)?.edges().iter().map(|p| (*p).into()).collect(),
        EntityId::Edge(e) => store.edge(e)?.cofaces().iter().map(|p| (*p).into()).collect(),
        EntityId::CoFace(f) => store.coface(f)?.faces().iter().map(|p| (*p).into()).collect(),
        EntityId::Face(f) => store.face(f)?.blocks().iter().map(|p| (*p).into()).collect(),
        EntityId::Block(_) => Vec::new(),
    })
}

fn children(store: &TopoStore, id: EntityId) -> TopoResult<Vec<EntityId>> {
    Ok(match id {
        EntityId::Vertex(_) => Vec::new(),
        EntityId::CoEdge(c) => store.coedge(c)?.vertices().iter().map(|v| (*v).into()).collect(),
        EntityId::Edge(e) => store.edge(e)?.coedges().iter().map(|c| (*c).into()).collect(),
        EntityId::CoFace(f) => store.coface(f)?.edges().iter().map(|e| (*e).into()).collect(),
        EntityId::Face(f) => store.face(f)?.cofaces().iter().map(|c| (*c).into()).collect(),
        EntityId::Block(b) => store.block(b)?.faces().iter().map(|f| (*f).into()).collect(),
    })
}

fn mark_up(store: &TopoStore, id: EntityId, marked: &mut BTreeSet<EntityId>) -> TopoResult<()> {
    if !marked.insert(id) {
        return Ok(());
    }
    for parent in parents(store, id)? {
        if store.lifecycle(parent) == Some(Lifecycle::Live) {
            mark_up(store, parent, marked)?;
        }
    }
    Ok(())
}

fn mark_down(store: &TopoStore, id: EntityId, marked: &mut BTreeSet<EntityId>) -> TopoResult<()> {
    marked.insert(id);
    if id.kind() == EntityKind::Vertex {
        return Ok(());
    }
    for child in children(store, id)? {
        if store.lifecycle(child) == Some(Lifecycle::Live) {
            mark_down(store, child, marked)?;
        }
    }
    Ok(())
}

fn has_live_parent(store: &TopoStore, id: EntityId) -> TopoResult<bool> {
    Ok(parents(store, id)?
        .into_iter()
        .any(|p| store.lifecycle(p) == Some(Lifecycle::Live)))
}

pub(crate) fn without<T: PartialEq + Copy>(items: &[T], gone: T) -> Vec<T> {
    items.iter().copied().filter(|i| *i != gone).collect()
}

fn dedup<T: Ord + Copy>(items: Vec<T>) -> Vec<T> {
    let mut seen = BTreeSet::new();
    items.into_iter().filter(|i| seen.insert(*i)).collect()
}
