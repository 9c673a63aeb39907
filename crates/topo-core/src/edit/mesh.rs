//! Discretization through the mesh store
//!
//! Vertices, coedges and structured cofaces write their nodes into an
//! external [`MeshStore`] and keep only the ids. A coface reads its boundary
//! nodes back by id and fills the interior by transfinite interpolation.

use glam::DVec3;

use crate::constants::PARAM_EPSILON;
use crate::error::{TopoError, TopoResult};
use crate::id::{CoEdgeId, CoFaceId, EdgeId, EntityId, VertexId};
use crate::law::EdgeLaw;
use crate::provider::{ElementId, GeomRef, GeometryProvider, MeshData, MeshStore, NodeId};
use crate::store::TopoStore;
use crate::txn::TransactionLog;
use crate::validate::check_coface;

/// Chains of interpolated laws longer than this are taken as cycles
const MAX_REFERENCE_DEPTH: usize = 32;

/// Write the nodes and segments of a coedge, meshing its vertices first
pub fn mesh_coedge(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    mesh: &mut dyn MeshStore,
    geom: &dyn GeometryProvider,
    coedge: CoEdgeId,
) -> TopoResult<()> {
    log.atomic(store, |store, log| mesh_coedge_in(store, log, mesh, geom, coedge))
}

/// Mesh a structured coface with quads, meshing its boundary first
pub fn mesh_coface(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    mesh: &mut dyn MeshStore,
    geom: &dyn GeometryProvider,
    coface: CoFaceId,
) -> TopoResult<()> {
    log.atomic(store, |store, log| mesh_coface_in(store, log, mesh, geom, coface))
}

/// Forget the mesh data of one entity
pub fn release_mesh(store: &mut TopoStore, log: &mut TransactionLog, id: EntityId) -> TopoResult<()> {
    log.atomic(store, |store, log| release_mesh_in(store, log, id))
}

/// Forget the mesh of a coface and of the boundary entities no other meshed
/// coface relies on. Returns the released entities.
pub fn release_coface_mesh(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    coface: CoFaceId,
) -> TopoResult<Vec<EntityId>> {
    log.atomic(store, |store, log| {
        let f = store.coface(coface)?.clone();
        let mut released = Vec::new();
        release_mesh_in(store, log, coface.into())?;
        released.push(coface.into());

        let mut coedges: Vec<CoEdgeId> = Vec::new();
        for edge in f.edges() {
            for c in store.edge(*edge)?.coedges() {
                if !coedges.contains(c) {
                    coedges.push(*c);
                }
            }
        }
        for c in &coedges {
            if store.is_meshed((*c).into()) && !used_by_meshed_coface(store, *c)? {
                release_mesh_in(store, log, (*c).into())?;
                released.push((*c).into());
            }
        }
        let mut vertices: Vec<VertexId> = Vec::new();
        for c in &coedges {
            for v in store.coedge(*c)?.vertices() {
                if !vertices.contains(&v) {
                    vertices.push(v);
                }
            }
        }
        for v in vertices {
            let still_used = store
                .vertex(v)?
                .coedges()
                .iter()
                .any(|c| store.is_live(*c) && store.is_meshed((*c).into()));
            if store.is_meshed(v.into()) && !still_used {
                release_mesh_in(store, log, v.into())?;
                released.push(v.into());
            }
        }
        Ok(released)
    })
}

fn used_by_meshed_coface(store: &TopoStore, coedge: CoEdgeId) -> TopoResult<bool> {
    for edge in store.coedge(coedge)?.edges() {
        for coface in store.edge(*edge)?.cofaces() {
            if store.is_live(*coface) && store.is_meshed((*coface).into()) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

pub(crate) fn release_mesh_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    id: EntityId,
) -> TopoResult<()> {
    if !store.is_meshed(id) {
        return Err(TopoError::NotMeshed(id.to_string()));
    }
    log.save_mesh_data(store, id)?;
    store.header_mut(id)?.mesh = None;
    tracing::debug!("Released mesh of {}", id);
    Ok(())
}

fn place(geom: &dyn GeometryProvider, association: Option<GeomRef>, point: DVec3) -> TopoResult<DVec3> {
    match association {
        Some(g) if !geom.is_destroyed(g) => geom.project(g, point),
        _ => Ok(point),
    }
}

fn new_node(mesh: &mut dyn MeshStore, log: &mut TransactionLog, point: DVec3) -> NodeId {
    let node = mesh.create_node(point);
    log.mesh_created(&[node], &[]);
    node
}

fn new_element(
    mesh: &mut dyn MeshStore,
    log: &mut TransactionLog,
    nodes: &[NodeId],
) -> TopoResult<ElementId> {
    let element = mesh.create_element(nodes)?;
    log.mesh_created(&[], &[element]);
    Ok(element)
}

fn store_mesh(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    id: EntityId,
    data: MeshData,
) -> TopoResult<()> {
    log.save_mesh_data(store, id)?;
    store.header_mut(id)?.mesh = Some(data);
    Ok(())
}

fn mesh_vertex_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    mesh: &mut dyn MeshStore,
    geom: &dyn GeometryProvider,
    vertex: VertexId,
) -> TopoResult<NodeId> {
    let v = store.vertex(vertex)?;
    if let Some(node) = v.header.mesh.as_ref().and_then(|m| m.nodes.first()) {
        return Ok(*node);
    }
    let point = place(geom, v.header.geom, v.coord())?;
    let node = new_node(mesh, log, point);
    store_mesh(
        store,
        log,
        vertex.into(),
        MeshData {
            nodes: vec![node],
            elements: Vec::new(),
        },
    )?;
    Ok(node)
}

pub(crate) fn mesh_coedge_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    mesh: &mut dyn MeshStore,
    geom: &dyn GeometryProvider,
    coedge: CoEdgeId,
) -> TopoResult<()> {
    if store.is_meshed(coedge.into()) {
        return Ok(());
    }
    let ce = store.coedge(coedge)?.clone();
    let [v0, v1] = ce.vertices();
    let first = mesh_vertex_in(store, log, mesh, geom, v0)?;
    let last = mesh_vertex_in(store, log, mesh, geom, v1)?;

    let params = coedge_parameters(store, coedge, 0)?;
    let (p0, p1) = (mesh.get(first)?.point, mesh.get(last)?.point);
    let points = ce.meshing().positions(p0, p1, &params);
    let mut nodes = Vec::with_capacity(points.len());
    nodes.push(first);
    for point in &points[1..points.len() - 1] {
        nodes.push(new_node(mesh, log, place(geom, ce.header.geom, *point)?));
    }
    nodes.push(last);
    let mut elements = Vec::with_capacity(nodes.len() - 1);
    for pair in nodes.windows(2) {
        elements.push(new_element(mesh, log, pair)?);
    }
    tracing::debug!("Meshed {} with {} nodes", coedge, nodes.len());
    store_mesh(store, log, coedge.into(), MeshData { nodes, elements })
}

/// Node parameters of a coedge, resolving laws bound to other coedges
pub fn coedge_parameters(store: &TopoStore, coedge: CoEdgeId, depth: usize) -> TopoResult<Vec<f64>> {
    if depth > MAX_REFERENCE_DEPTH {
        return Err(TopoError::InvalidArgument(format!(
            "interpolation of {coedge} refers back to itself"
        )));
    }
    let meshing = store.coedge(coedge)?.meshing();
    let nb = meshing.nb_edges;
    match &meshing.law {
        EdgeLaw::Interpolated { reference } => {
            let reference = coedge_parameters(store, *reference, depth + 1)?;
            meshing.parameters(Some(&resample(&reference, nb)))
        }
        EdgeLaw::GlobalInterpolated { first, second } => {
            let blended = match (first.is_empty(), second.is_empty()) {
                (false, false) => {
                    let a = resample(&chain_parameters(store, first, depth)?, nb);
                    let b = resample(&chain_parameters(store, second, depth)?, nb);
                    a.iter().zip(&b).map(|(x, y)| 0.5 * (x + y)).collect()
                }
                (false, true) => resample(&chain_parameters(store, first, depth)?, nb),
                (true, false) => resample(&chain_parameters(store, second, depth)?, nb),
                (true, true) => (0..=nb).map(|i| i as f64 / nb as f64).collect(),
            };
            meshing.parameters(Some(&blended))
        }
        _ => meshing.parameters(None),
    }
}

/// Parameters along consecutive coedges, weighted by their meshing edges
fn chain_parameters(store: &TopoStore, coedges: &[CoEdgeId], depth: usize) -> TopoResult<Vec<f64>> {
    let total: u32 = store.coedges_nb_meshing_edges(coedges)?;
    let mut out = vec![0.0];
    let mut acc = 0.0;
    for c in coedges {
        let n = store.coedge(*c)?.nb_meshing_edges() as f64;
        let params = coedge_parameters(store, *c, depth + 1)?;
        for t in &params[1..] {
            out.push((acc + t * n) / total as f64);
        }
        acc += n;
    }
    Ok(out)
}

/// Linear resampling of a node distribution onto `nb` segments
fn resample(params: &[f64], nb: u32) -> Vec<f64> {
    let segments = params.len().saturating_sub(1);
    if segments == nb as usize || segments == 0 {
        return params.to_vec();
    }
    (0..=nb)
        .map(|i| {
            let s = i as f64 * segments as f64 / nb as f64;
            let k = (s.floor() as usize).min(segments - 1);
            let w = s - k as f64;
            params[k] * (1.0 - w) + params[k + 1] * w
        })
        .collect()
}

/// Boundary nodes of `edge` walked from `from`, as seen by its cofaces
fn side_nodes(store: &TopoStore, edge: EdgeId, from: VertexId) -> TopoResult<Vec<NodeId>> {
    let chain = store.chain(edge, from)?;
    let e = store.edge(edge)?;
    let mut nodes: Vec<NodeId> = Vec::new();
    for (c, forward) in chain.coedges.iter().zip(&chain.forward) {
        let data = store
            .header((*c).into())
            .and_then(|h| h.mesh.as_ref())
            .ok_or_else(|| TopoError::NotMeshed(c.to_string()))?;
        let mut own = data.nodes.clone();
        if !forward {
            own.reverse();
        }
        let step = e.ratio(*c) as usize;
        let skip = usize::from(!nodes.is_empty());
        nodes.extend(own.iter().step_by(step).skip(skip).copied());
    }
    Ok(nodes)
}

/// Arc length fractions along a polyline; uniform when it has no length
fn fractions(points: &[DVec3]) -> Vec<f64> {
    let mut acc = vec![0.0];
    for pair in points.windows(2) {
        let last = acc[acc.len() - 1];
        acc.push(last + pair[0].distance(pair[1]));
    }
    let total = acc[acc.len() - 1];
    let n = (points.len() - 1).max(1) as f64;
    if total < PARAM_EPSILON {
        return (0..points.len()).map(|i| i as f64 / n).collect();
    }
    acc.iter().map(|l| l / total).collect()
}

pub(crate) fn mesh_coface_in(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    mesh: &mut dyn MeshStore,
    geom: &dyn GeometryProvider,
    coface: CoFaceId,
) -> TopoResult<()> {
    if store.is_meshed(coface.into()) {
        return Ok(());
    }
    let f = store.coface(coface)?.clone();
    if !f.is_structured() {
        return Err(TopoError::Unsupported(format!(
            "{} meshing of {coface}",
            f.law().name()
        )));
    }
    check_coface(store, geom, coface)?;
    for edge in f.edges() {
        for c in store.edge(*edge)?.coedges().to_vec() {
            mesh_coedge_in(store, log, mesh, geom, c)?;
        }
    }

    let (ni, nj) = store.nb_meshing_edges_ij(coface)?;
    let (ni, nj) = (ni as usize, nj as usize);
    let corner = |k: usize| {
        f.vertex(k)
            .ok_or_else(|| TopoError::invariant(coface, format!("no vertex {k}")))
    };
    let mut grid: Vec<Vec<Option<NodeId>>> = vec![vec![None; nj + 1]; ni + 1];
    let s0 = side_nodes(store, f.edges[0], corner(0)?)?;
    let s1 = side_nodes(store, f.edges[1], corner(1)?)?;
    let s2 = side_nodes(store, f.edges[2], corner(2)?)?;
    if s0.len() != nj + 1 || s2.len() != nj + 1 || s1.len() != ni + 1 {
        return Err(TopoError::invariant(coface, "boundary nodes do not match its counts"));
    }
    for j in 0..=nj {
        grid[0][j] = Some(s0[j]);
        grid[ni][nj - j] = Some(s2[j]);
    }
    for i in 0..=ni {
        grid[i][nj] = Some(s1[i]);
    }
    match f.edge(3) {
        Some(e3) => {
            let s3 = side_nodes(store, e3, corner(3)?)?;
            if s3.len() != ni + 1 {
                return Err(TopoError::invariant(coface, "boundary nodes do not match its counts"));
            }
            for i in 0..=ni {
                grid[ni - i][0] = Some(s3[i]);
            }
        }
        None => {
            let collapsed = grid[0][0];
            for row in grid.iter_mut() {
                row[0] = collapsed;
            }
        }
    }

    let at = |grid: &Vec<Vec<Option<NodeId>>>, i: usize, j: usize| {
        grid[i][j].ok_or_else(|| TopoError::Internal(format!("node ({i}, {j}) of {coface} unset")))
    };
    let mut point_grid = vec![vec![DVec3::ZERO; nj + 1]; ni + 1];
    for i in 0..=ni {
        for j in 0..=nj {
            if i == 0 || j == 0 || i == ni || j == nj {
                point_grid[i][j] = mesh.get(at(&grid, i, j)?)?.point;
            }
        }
    }
    let column = |j: usize| (0..=ni).map(|i| point_grid[i][j]).collect::<Vec<_>>();
    let row = |i: usize| point_grid[i].clone();
    let (bottom, top) = (fractions(&column(0)), fractions(&column(nj)));
    let (left, right) = (fractions(&row(0)), fractions(&row(ni)));

    let mut interior = Vec::new();
    for i in 1..ni {
        for j in 1..nj {
            let (fi, fj) = (i as f64 / ni as f64, j as f64 / nj as f64);
            let u = (1.0 - fj) * bottom[i] + fj * top[i];
            let v = (1.0 - fi) * left[j] + fi * right[j];
            let p = &point_grid;
            let point = (1.0 - u) * p[0][j] + u * p[ni][j] + (1.0 - v) * p[i][0] + v * p[i][nj]
                - ((1.0 - u) * (1.0 - v) * p[0][0]
                    + u * (1.0 - v) * p[ni][0]
                    + (1.0 - u) * v * p[0][nj]
                    + u * v * p[ni][nj]);
            let node = new_node(mesh, log, place(geom, f.header.geom, point)?);
            grid[i][j] = Some(node);
            interior.push(node);
        }
    }

    let mut elements = Vec::with_capacity(ni * nj);
    for i in 0..ni {
        for j in 0..nj {
            let mut quad = vec![
                at(&grid, i, j)?,
                at(&grid, i + 1, j)?,
                at(&grid, i + 1, j + 1)?,
                at(&grid, i, j + 1)?,
            ];
            quad.dedup();
            if quad.len() > 1 && quad.first() == quad.last() {
                quad.pop();
            }
            if quad.len() >= 3 {
                elements.push(new_element(mesh, log, &quad)?);
            }
        }
    }
    tracing::debug!(
        "Meshed {} with {} interior nodes and {} elements",
        coface,
        interior.len(),
        elements.len()
    );
    store_mesh(
        store,
        log,
        coface.into(),
        MeshData {
            nodes: interior,
            elements,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopoConfig;
    use crate::edit::{build_quad, free_coface, merge_vertices, set_edge_meshing, Quad};
    use crate::law::{EdgeMeshing, FaceLaw};
    use crate::provider::InMemoryMeshStore;
    use crate::provider::NullGeometry;
    use approx::assert_relative_eq;

    fn setup() -> (TopoStore, Quad) {
        let mut store = TopoStore::new(TopoConfig::default());
        let mut log = TransactionLog::begin(&store);
        let corners = [DVec3::ZERO, DVec3::X, DVec3::new(1.0, 1.0, 0.0), DVec3::Y];
        let quad = build_quad(&mut store, &mut log, corners, 4, 4).unwrap();
        log.commit(&mut store);
        (store, quad)
    }

    #[test]
    fn test_mesh_quad() {
        let (mut store, quad) = setup();
        let mut mesh = InMemoryMeshStore::new();
        let mut log = TransactionLog::begin(&store);
        mesh_coface(&mut store, &mut log, &mut mesh, &NullGeometry, quad.coface).unwrap();

        assert_eq!(mesh.nb_nodes(), 25);
        assert_eq!(mesh.nb_elements(), 16 + 16);
        let data = store.header(quad.coface.into()).unwrap().mesh.clone().unwrap();
        assert_eq!(data.nodes.len(), 9);
        // j runs along edge 0, i along edge 1
        let p = mesh.get(data.nodes[0]).unwrap().point;
        assert_relative_eq!(p.x, 0.25);
        assert_relative_eq!(p.y, 0.25);
        assert!(store.is_meshed(quad.vertices[2].into()));
    }

    #[test]
    fn test_rolled_back_mesh_can_be_deleted() {
        let (mut store, quad) = setup();
        let mut mesh = InMemoryMeshStore::new();
        let mut log = TransactionLog::begin(&store);
        mesh_coface(&mut store, &mut log, &mut mesh, &NullGeometry, quad.coface).unwrap();

        // a failed nested edit leaves its nodes as orphans of the outer log
        let result: TopoResult<()> = log.atomic(&mut store, |_, child| {
            new_node(&mut mesh, child, DVec3::Z);
            Err(TopoError::Canceled)
        });
        assert_eq!(result, Err(TopoError::Canceled));
        let orphans = log.take_orphan_mesh();
        assert_eq!(orphans.nodes.len(), 1);
        mesh.delete(&orphans).unwrap();
        assert_eq!(mesh.nb_nodes(), 25);

        let created = log.take_created_mesh();
        assert_eq!((created.nodes.len(), created.elements.len()), (25, 32));
        log.rollback(&mut store).unwrap();
        mesh.delete(&created).unwrap();
        assert_eq!((mesh.nb_nodes(), mesh.nb_elements()), (0, 0));
        assert!(!store.is_meshed(quad.coface.into()));
    }

    #[test]
    fn test_mesh_degenerate_quad() {
        let (mut store, quad) = setup();
        let mut mesh = InMemoryMeshStore::new();
        let mut log = TransactionLog::begin(&store);
        merge_vertices(&mut store, &mut log, quad.vertices[0], quad.vertices[3]).unwrap();
        mesh_coface(&mut store, &mut log, &mut mesh, &NullGeometry, quad.coface).unwrap();
        assert_eq!(mesh.nb_nodes(), 12 + 9);
        assert_eq!(mesh.nb_elements(), 12 + 16);
        let data = store.header(quad.coface.into()).unwrap().mesh.clone().unwrap();
        let triangles = data
            .elements
            .iter()
            .filter(|e| mesh.element_nodes(**e).unwrap().len() == 3)
            .count();
        assert_eq!(triangles, 4);
    }

    #[test]
    fn test_unstructured_is_unsupported() {
        let (mut store, quad) = setup();
        let mut mesh = InMemoryMeshStore::new();
        let mut log = TransactionLog::begin(&store);
        crate::edit::set_face_law(&mut store, &mut log, quad.coface, FaceLaw::Delaunay).unwrap();
        let err =
            mesh_coface(&mut store, &mut log, &mut mesh, &NullGeometry, quad.coface).unwrap_err();
        assert!(matches!(err, TopoError::Unsupported(_)));
        assert_eq!(mesh.nb_nodes(), 0);
    }

    #[test]
    fn test_interpolated_law_follows_reference() {
        let (mut store, quad) = setup();
        let mut log = TransactionLog::begin(&store);
        let bottom = store.edge(quad.edges[0]).unwrap().coedges()[0];
        let top = store.edge(quad.edges[2]).unwrap().coedges()[0];
        set_edge_meshing(
            &mut store,
            &mut log,
            bottom,
            EdgeMeshing::new(4, EdgeLaw::Geometric { ratio: 2.0 }),
        )
        .unwrap();
        set_edge_meshing(
            &mut store,
            &mut log,
            top,
            EdgeMeshing::new(4, EdgeLaw::Interpolated { reference: bottom }),
        )
        .unwrap();
        let params = coedge_parameters(&store, top, 0).unwrap();
        assert_relative_eq!(params[1], 1.0 / 15.0);

        let mut mesh = InMemoryMeshStore::new();
        mesh_coedge(&mut store, &mut log, &mut mesh, &NullGeometry, top).unwrap();
        let data = store.header(top.into()).unwrap().mesh.clone().unwrap();
        assert_eq!(data.nodes.len(), 5);
        assert_relative_eq!(mesh.get(data.nodes[1]).unwrap().point.x, 1.0 - 1.0 / 15.0);
    }

    #[test]
    fn test_release_before_free() {
        let (mut store, quad) = setup();
        let mut mesh = InMemoryMeshStore::new();
        let mut log = TransactionLog::begin(&store);
        mesh_coface(&mut store, &mut log, &mut mesh, &NullGeometry, quad.coface).unwrap();
        let err = free_coface(&mut store, &mut log, quad.coface).unwrap_err();
        assert!(matches!(err, TopoError::MeshNotReleased(_)));

        let released = release_coface_mesh(&mut store, &mut log, quad.coface).unwrap();
        assert_eq!(released.len(), 1 + 4 + 4);
        assert!(matches!(
            release_mesh(&mut store, &mut log, quad.coface.into()),
            Err(TopoError::NotMeshed(_))
        ));
        free_coface(&mut store, &mut log, quad.coface).unwrap();
    }
}
