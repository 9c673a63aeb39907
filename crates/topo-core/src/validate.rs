//! Structural validation
//!
//! The `check_*` functions walk an entity and everything below it, stopping at
//! the first broken invariant. On success they return the number of meshing
//! elements the entity would produce, which doubles as a cheap consistency
//! figure for reports.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{BLOCK_FORMS, MAX_BLOCKS_PER_FACE, MAX_FACES_PER_COFACE};
use crate::entity::{Block, CoEdge, CoFace, Edge, Face, Header, TopoEntity, Vertex};
use crate::error::{TopoError, TopoResult};
use crate::id::{BlockId, CoEdgeId, CoFaceId, EdgeId, FaceId, TypedId, VertexId};
use crate::law::Dir;
use crate::provider::GeometryProvider;
use crate::store::{Downward, TopoStore};

/// Counts gathered by [`check_all`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub vertices: usize,
    pub coedges: usize,
    pub edges: usize,
    pub cofaces: usize,
    pub faces: usize,
    pub blocks: usize,
    /// Cells of the structured blocks, or of the faces when there are none
    pub cells: u64,
}

fn live<I: TypedId>(store: &TopoStore, id: I, by: impl std::fmt::Display) -> TopoResult<()> {
    if store.is_live(id) {
        Ok(())
    } else {
        Err(TopoError::invariant(by, format!("refers to {id} which is not live")))
    }
}

fn check_geom(geom: &dyn GeometryProvider, owner: impl std::fmt::Display, header: &Header) -> TopoResult<()> {
    match header.geom {
        Some(g) if geom.is_destroyed(g) => Err(TopoError::invariant(
            owner,
            format!("associated with destroyed geometry {g}"),
        )),
        _ => Ok(()),
    }
}

/// Forward links of `owner` are mirrored by its children
fn check_down<P: Downward>(store: &TopoStore, owner: &P) -> TopoResult<()> {
    for child in owner.children() {
        live(store, child, owner.id())?;
        if !P::parents(store.get(child)?).contains(&owner.id()) {
            return Err(TopoError::invariant(
                owner.id(),
                format!("{child} has no back link to it"),
            ));
        }
    }
    Ok(())
}

/// Back links of `child` are mirrored by its parents
fn check_up<P: Downward>(store: &TopoStore, child: &P::Child) -> TopoResult<()> {
    for parent in P::parents(child) {
        live(store, *parent, child.id())?;
        if !store.get(*parent)?.children().contains(&child.id()) {
            return Err(TopoError::invariant(
                child.id(),
                format!("back link to {parent} which does not own it"),
            ));
        }
    }
    Ok(())
}

pub fn check_vertex(store: &TopoStore, geom: &dyn GeometryProvider, id: VertexId) -> TopoResult<u64> {
    let v: &Vertex = store.vertex(id)?;
    check_geom(geom, id, &v.header)?;
    if !v.coord().is_finite() {
        return Err(TopoError::invariant(id, "coordinates are not finite"));
    }
    check_up::<CoEdge>(store, v)?;
    Ok(0)
}

pub fn check_coedge(store: &TopoStore, geom: &dyn GeometryProvider, id: CoEdgeId) -> TopoResult<u64> {
    let c: &CoEdge = store.coedge(id)?;
    check_geom(geom, id, &c.header)?;
    if c.is_collapsed() {
        return Err(TopoError::invariant(id, "both ends are the same vertex"));
    }
    c.meshing().validate()?;
    for reference in c.meshing().references() {
        live(store, reference, id)?;
    }
    check_down(store, c)?;
    check_up::<Edge>(store, c)?;
    for v in c.vertices() {
        check_vertex(store, geom, v)?;
    }
    Ok(c.nb_meshing_edges() as u64)
}

pub fn check_edge(store: &TopoStore, geom: &dyn GeometryProvider, id: EdgeId) -> TopoResult<u64> {
    let e: &Edge = store.edge(id)?;
    check_geom(geom, id, &e.header)?;
    check_down(store, e)?;
    check_up::<CoFace>(store, e)?;
    for c in e.coedges() {
        check_coedge(store, geom, *c)?;
        let ratio = e.ratio(*c);
        if ratio == 0 || store.coedge(*c)?.nb_meshing_edges() % ratio != 0 {
            return Err(TopoError::invariant(
                id,
                format!("ratio {ratio} does not divide the meshing of {c}"),
            ));
        }
    }
    let [first, _] = e.vertices();
    let chain = store.chain(id, first)?;
    if chain.last() != Some(e.vertex(1)) {
        return Err(TopoError::invariant(id, "coedges do not join its ends"));
    }
    Ok(store.edge_nb_meshing_edges(id)? as u64)
}

/// Meshing edge count of one side, summed over the edges of that side
fn side_count(store: &TopoStore, edges: &[EdgeId]) -> TopoResult<u32> {
    edges
        .iter()
        .map(|e| store.edge_nb_meshing_edges(*e))
        .sum()
}

pub fn check_coface(store: &TopoStore, geom: &dyn GeometryProvider, id: CoFaceId) -> TopoResult<u64> {
    let f: &CoFace = store.coface(id)?;
    check_geom(geom, id, &f.header)?;
    check_down(store, f)?;
    check_up::<Face>(store, f)?;
    if f.nb_faces() > MAX_FACES_PER_COFACE {
        return Err(TopoError::invariant(
            id,
            format!("shared by {} faces", f.nb_faces()),
        ));
    }
    for e in f.edges() {
        check_edge(store, geom, *e)?;
    }
    if !f.is_structured() {
        return Ok(0);
    }
    match f.nb_edges() {
        3 | 4 => {}
        n => {
            return Err(TopoError::invariant(
                id,
                format!("structured with {n} edges"),
            ));
        }
    }
    for (k, e) in f.edges().iter().enumerate() {
        let a = f.vertex(k).ok_or_else(|| TopoError::invariant(id, "missing vertex"))?;
        let b = f
            .vertex((k + 1) % f.nb_vertices())
            .ok_or_else(|| TopoError::invariant(id, "missing vertex"))?;
        if !store.edge(*e)?.joins(a, b) {
            return Err(TopoError::invariant(
                id,
                format!("edge {k} ({e}) does not join {a} and {b}"),
            ));
        }
    }
    let i_sides = f.edges_in_dir(Dir::I)?;
    let j_sides = f.edges_in_dir(Dir::J)?;
    let (ni, nj) = store.nb_meshing_edges_ij(id)?;
    if f.nb_edges() == 4 {
        let facing = side_count(store, &i_sides[1..])?;
        if facing != ni {
            return Err(TopoError::invariant(
                id,
                format!("opposite sides along i hold different counts ({ni} and {facing})"),
            ));
        }
    }
    let facing = side_count(store, &j_sides[1..])?;
    if facing != nj {
        return Err(TopoError::invariant(
            id,
            format!("opposite sides along j hold different counts ({nj} and {facing})"),
        ));
    }
    Ok(ni as u64 * nj as u64)
}

pub fn check_face(store: &TopoStore, geom: &dyn GeometryProvider, id: FaceId) -> TopoResult<u64> {
    let f: &Face = store.face(id)?;
    check_geom(geom, id, &f.header)?;
    check_down(store, f)?;
    check_up::<Block>(store, f)?;
    if f.blocks().len() > MAX_BLOCKS_PER_FACE {
        return Err(TopoError::invariant(
            id,
            format!("shared by {} blocks", f.blocks().len()),
        ));
    }
    if f.nb_cofaces() == 0 {
        return Err(TopoError::invariant(id, "made of no coface"));
    }
    let mut cells = 0;
    for coface in f.cofaces() {
        cells += check_coface(store, geom, *coface)?;
    }
    Ok(cells)
}

pub fn check_block(store: &TopoStore, geom: &dyn GeometryProvider, id: BlockId) -> TopoResult<u64> {
    let b: &Block = store.block(id)?;
    check_geom(geom, id, &b.header)?;
    check_down(store, b)?;
    if !BLOCK_FORMS.contains(&(b.nb_faces(), b.nb_vertices())) {
        return Err(TopoError::invariant(
            id,
            format!("{} faces and {} vertices", b.nb_faces(), b.nb_vertices()),
        ));
    }
    let mut face_cells = Vec::with_capacity(b.nb_faces());
    for face in b.faces() {
        face_cells.push(check_face(store, geom, *face)?);
    }
    if !b.is_structured() {
        return Ok(0);
    }
    if b.nb_faces() == 6 {
        for pair in face_cells.chunks(2) {
            if pair[0] != pair[1] {
                return Err(TopoError::invariant(
                    id,
                    format!("opposite faces hold {} and {} cells", pair[0], pair[1]),
                ));
            }
        }
    }
    // (ni nj)(nj nk)(nk ni) over three faces not facing each other
    let last = face_cells[4.min(face_cells.len() - 1)];
    let product = face_cells[0] as f64 * face_cells[2] as f64 * last as f64;
    Ok(product.sqrt().round() as u64)
}

/// Check every live entity, reporting counts per kind
pub fn check_all(store: &TopoStore, geom: &dyn GeometryProvider) -> TopoResult<CheckReport> {
    let mut report = CheckReport {
        vertices: store.count::<Vertex>(),
        coedges: store.count::<CoEdge>(),
        edges: store.count::<Edge>(),
        cofaces: store.count::<CoFace>(),
        faces: store.count::<Face>(),
        blocks: store.count::<Block>(),
        cells: 0,
    };
    for v in store.ids::<VertexId>() {
        check_vertex(store, geom, v)?;
    }
    for c in store.ids::<CoEdgeId>() {
        check_coedge(store, geom, c)?;
    }
    let mut face_cells = 0;
    for f in store.ids::<FaceId>() {
        face_cells += check_face(store, geom, f)?;
    }
    for f in store.ids::<CoFaceId>() {
        check_coface(store, geom, f)?;
    }
    for b in store.ids::<BlockId>() {
        report.cells += check_block(store, geom, b)?;
    }
    if report.blocks == 0 {
        report.cells = face_cells;
    }
    tracing::debug!("Checked {} block(s), {} cell(s)", report.blocks, report.cells);
    Ok(report)
}

fn symmetric<P: Downward>(store: &TopoStore) -> TopoResult<()> {
    for owner in store.iter::<P>() {
        check_down(store, owner)?;
    }
    for child in store.iter::<P::Child>() {
        check_up::<P>(store, child)?;
    }
    Ok(())
}

/// Forward and back links agree over the whole store
pub fn check_symmetry(store: &TopoStore) -> TopoResult<()> {
    symmetric::<CoEdge>(store)?;
    symmetric::<Edge>(store)?;
    symmetric::<CoFace>(store)?;
    symmetric::<Face>(store)?;
    symmetric::<Block>(store)?;
    let vertices: BTreeSet<VertexId> = store.ids::<VertexId>().into_iter().collect();
    for e in store.iter::<Edge>() {
        for v in e.vertices() {
            if !vertices.contains(&v) {
                return Err(TopoError::invariant(e.id(), format!("ends at {v} which is not live")));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopoConfig;
    use crate::edit::{build_hexahedron, build_quad, set_edge_meshing};
    use crate::law::EdgeMeshing;
    use crate::provider::{GeomRef, GeomType, NullGeometry};
    use crate::txn::TransactionLog;
    use glam::DVec3;

    struct DestroyedGeometry;

    impl GeometryProvider for DestroyedGeometry {
        fn project(&self, _geom: GeomRef, point: DVec3) -> TopoResult<DVec3> {
            Ok(point)
        }

        fn geom_type(&self, _geom: GeomRef) -> TopoResult<GeomType> {
            Ok(GeomType::Surface)
        }

        fn is_destroyed(&self, geom: GeomRef) -> bool {
            geom == GeomRef(7)
        }

        fn groups_name(&self, _geom: GeomRef) -> Vec<String> {
            Vec::new()
        }
    }

    fn quad(store: &mut TopoStore) -> crate::edit::Quad {
        let mut log = TransactionLog::begin(store);
        let corners = [DVec3::ZERO, DVec3::X, DVec3::new(1.0, 1.0, 0.0), DVec3::Y];
        let quad = build_quad(store, &mut log, corners, 3, 5).unwrap();
        log.commit(store);
        quad
    }

    #[test]
    fn test_quad_statistics() {
        let mut store = TopoStore::new(TopoConfig::default());
        let q = quad(&mut store);
        assert_eq!(check_coface(&store, &NullGeometry, q.coface).unwrap(), 15);
        assert_eq!(check_face(&store, &NullGeometry, q.face).unwrap(), 15);
        assert_eq!(check_edge(&store, &NullGeometry, q.edges[0]).unwrap(), 5);
        let report = check_all(&store, &NullGeometry).unwrap();
        assert_eq!(report.vertices, 4);
        assert_eq!(report.cofaces, 1);
        assert_eq!(report.cells, 15);
        check_symmetry(&store).unwrap();
    }

    #[test]
    fn test_opposite_counts_must_match() {
        let mut store = TopoStore::new(TopoConfig::default());
        let q = quad(&mut store);
        let mut log = TransactionLog::begin(&store);
        let coedge = store.edge(q.edges[2]).unwrap().coedges()[0];
        set_edge_meshing(&mut store, &mut log, coedge, EdgeMeshing::uniform(4)).unwrap();
        let err = check_coface(&store, &NullGeometry, q.coface).unwrap_err();
        assert!(matches!(err, TopoError::Invariant { .. }));
        assert!(err.to_string().contains("opposite sides along j"));
    }

    #[test]
    fn test_destroyed_geometry_is_reported() {
        let mut store = TopoStore::new(TopoConfig::default());
        let q = quad(&mut store);
        let mut log = TransactionLog::begin(&store);
        crate::edit::set_geom_association(&mut store, &mut log, q.vertices[1].into(), Some(GeomRef(7)))
            .unwrap();
        assert!(check_face(&store, &NullGeometry, q.face).is_ok());
        let err = check_face(&store, &DestroyedGeometry, q.face).unwrap_err();
        assert!(err.to_string().contains("Geom0007"));
    }

    #[test]
    fn test_broken_back_link() {
        let mut store = TopoStore::new(TopoConfig::default());
        let q = quad(&mut store);
        store.get_mut(q.edges[1]).unwrap().cofaces.clear();
        assert!(check_symmetry(&store).is_err());
        assert!(check_coface(&store, &NullGeometry, q.coface).is_err());
    }

    #[test]
    fn test_hexahedron_cells() {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut log = TransactionLog::begin(&store);
        let corners: [DVec3; 8] = std::array::from_fn(|n| {
            DVec3::new((n & 1) as f64, ((n >> 1) & 1) as f64, ((n >> 2) & 1) as f64)
        });
        let hexa = build_hexahedron(&mut store, &mut log, corners, [2, 3, 4]).unwrap();
        log.commit(&mut store);
        assert_eq!(check_block(&store, &NullGeometry, hexa.block).unwrap(), 24);
        let report = check_all(&store, &NullGeometry).unwrap();
        assert_eq!(report.blocks, 1);
        assert_eq!(report.faces, 6);
        assert_eq!(report.edges, 12);
        assert_eq!(report.cells, 24);
    }
}
