//! In-place property changes

use glam::DVec3;

use crate::error::{TopoError, TopoResult};
use crate::id::{BlockId, CoEdgeId, CoFaceId, EdgeId, EntityId, VertexId};
use crate::law::{BlockLaw, EdgeMeshing, FaceLaw};
use crate::provider::GeomRef;
use crate::store::TopoStore;
use crate::txn::TransactionLog;

/// Move a vertex; only display is affected
pub fn move_vertex(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    vertex: VertexId,
    coord: DVec3,
) -> TopoResult<()> {
    store.vertex(vertex)?;
    log.save_display(store, vertex.into())?;
    store.get_mut(vertex)?.coord = coord;
    Ok(())
}

/// Replace the discretization of a coedge
pub fn set_edge_meshing(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coedge: CoEdgeId,
    meshing: EdgeMeshing,
) -> TopoResult<()> {
    store.coedge(coedge)?;
    meshing.validate()?;
    for reference in meshing.references() {
        if reference == coedge {
            return Err(TopoError::InvalidArgument(format!(
                "{coedge} cannot interpolate on itself"
            )));
        }
        store.coedge(reference)?;
    }
    log.save(store, coedge.into())?;
    store.get_mut(coedge)?.meshing = meshing;
    Ok(())
}

/// Ratio under which the cofaces of `edge` see `coedge`
pub fn set_coedge_ratio(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    edge: EdgeId,
    coedge: CoEdgeId,
    ratio: u32,
) -> TopoResult<()> {
    let e = store.edge(edge)?;
    if !e.coedges().contains(&coedge) {
        return Err(TopoError::InvalidArgument(format!("{coedge} is not part of {edge}")));
    }
    let nb = store.coedge(coedge)?.nb_meshing_edges();
    if ratio == 0 || nb % ratio != 0 {
        return Err(TopoError::InvalidArgument(format!(
            "ratio {ratio} does not divide the {nb} meshing edges of {coedge}"
        )));
    }
    log.save(store, edge.into())?;
    let e = store.get_mut(edge)?;
    if ratio == 1 {
        e.ratios.remove(&coedge);
    } else {
        e.ratios.insert(coedge, ratio);
    }
    Ok(())
}

/// Replace the meshing law of a coface
pub fn set_face_law(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coface: CoFaceId,
    law: FaceLaw,
) -> TopoResult<()> {
    let f = store.coface(coface)?;
    if law.is_structured() && !(3..=4).contains(&f.nb_edges()) {
        return Err(TopoError::NotStructured(format!(
            "{coface} has {} edges",
            f.nb_edges()
        )));
    }
    if law.select_basic(f.nb_edges()) != law {
        return Err(TopoError::InvalidArgument(format!(
            "{} law needs 4 sides, {coface} has {}",
            law.name(),
            f.nb_edges()
        )));
    }
    log.save(store, coface.into())?;
    store.get_mut(coface)?.law = law;
    Ok(())
}

pub fn set_block_law(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    block: BlockId,
    law: BlockLaw,
) -> TopoResult<()> {
    store.block(block)?;
    log.save(store, block.into())?;
    store.get_mut(block)?.law = law;
    Ok(())
}

pub fn set_geom_association(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    id: EntityId,
    geom: Option<GeomRef>,
) -> TopoResult<()> {
    log.save(store, id)?;
    store.header_mut(id)?.geom = geom;
    Ok(())
}

pub fn add_to_group(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    id: EntityId,
    group: &str,
) -> TopoResult<()> {
    if store.header(id).is_some_and(|h| h.groups.contains(group)) {
        return Ok(());
    }
    log.save_groups(store, id)?;
    store.header_mut(id)?.groups.insert(group.to_string());
    Ok(())
}

pub fn remove_from_group(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    id: EntityId,
    group: &str,
) -> TopoResult<()> {
    if !store.header(id).is_some_and(|h| h.groups.contains(group)) {
        return Ok(());
    }
    log.save_groups(store, id)?;
    store.header_mut(id)?.groups.remove(group);
    Ok(())
}
