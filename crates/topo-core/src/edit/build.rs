//! Constructors

use glam::DVec3;
use std::collections::BTreeMap;

use crate::constants::BLOCK_FORMS;
use crate::entity::{Block, CoEdge, CoFace, Edge, Face, Vertex};
use crate::error::{TopoError, TopoResult};
use crate::id::{BlockId, CoEdgeId, CoFaceId, EdgeId, FaceId, VertexId};
use crate::law::{BlockLaw, EdgeMeshing, FaceLaw};
use crate::store::TopoStore;
use crate::txn::TransactionLog;

/// Entities making up a quad built by [`build_quad`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub face: FaceId,
    pub coface: CoFaceId,
    pub edges: [EdgeId; 4],
    pub vertices: [VertexId; 4],
}

/// Entities making up a block built by [`build_hexahedron`]
#[derive(Debug, Clone, PartialEq)]
pub struct Hexahedron {
    pub block: BlockId,
    /// `i_min, i_max, j_min, j_max, k_min, k_max`
    pub faces: [FaceId; 6],
    pub cofaces: [CoFaceId; 6],
    pub edges: Vec<EdgeId>,
    pub vertices: [VertexId; 8],
}

pub fn new_vertex(store: &mut TopoStore, log: &mut TransactionLog, coord: DVec3) -> TopoResult<VertexId> {
    let id: VertexId = store.alloc();
    store.insert(Vertex::new(id, coord));
    log.created(store, id.into())?;
    Ok(id)
}

/// New coedge from `v0` to `v1`
pub fn new_coedge(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    v0: VertexId,
    v1: VertexId,
    meshing: EdgeMeshing,
) -> TopoResult<CoEdgeId> {
    meshing.validate()?;
    if v0 == v1 {
        return Err(TopoError::InvalidArgument(format!(
            "a coedge cannot join {v0} to itself"
        )));
    }
    log.atomic(store, |store, log| {
        let id: CoEdgeId = store.alloc();
        store.insert(CoEdge::new(id, [v0, v1], meshing));
        log.created(store, id.into())?;
        store.rewire::<CoEdge>(log, id, vec![v0, v1])?;
        Ok(id)
    })
}

/// New edge from `v0` to `v1` made of coedges ordered from `v0`
pub fn new_edge(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    v0: VertexId,
    v1: VertexId,
    coedges: Vec<CoEdgeId>,
) -> TopoResult<EdgeId> {
    if coedges.is_empty() {
        return Err(TopoError::InvalidArgument(
            "an edge needs at least one coedge".into(),
        ));
    }
    log.atomic(store, |store, log| {
        let id: EdgeId = store.alloc();
        store.insert(Edge::new(id, [v0, v1]));
        log.created(store, id.into())?;
        store.rewire::<Edge>(log, id, coedges)?;
        // rejects coedges that do not chain from v0 to v1
        store.chain(id, v0)?;
        Ok(id)
    })
}

/// New coface bounded by `edges`.
///
/// Structured cofaces take 3 or 4 edges in boundary order; their vertices are
/// derived from the edges. Unstructured edges are sorted into closed cycles.
pub fn new_coface(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    edges: Vec<EdgeId>,
    law: FaceLaw,
) -> TopoResult<CoFaceId> {
    let (edges, vertices, cycles) = if law.is_structured() {
        let vertices = structured_vertices(store, &edges)?;
        (edges, vertices, 1)
    } else {
        sort_cycles(store, &edges)?
    };
    let law = law.select_basic(edges.len());
    log.atomic(store, |store, log| {
        let id: CoFaceId = store.alloc();
        let mut coface = CoFace::new(id, vertices, law);
        coface.holed = cycles > 1;
        store.insert(coface);
        log.created(store, id.into())?;
        store.rewire::<CoFace>(log, id, edges)?;
        Ok(id)
    })
}

/// New face aggregating `cofaces`; corners are the vertices owned by one coface only
pub fn new_face(store: &mut TopoStore, log: &mut TransactionLog, cofaces: Vec<CoFaceId>) -> TopoResult<FaceId> {
    let mut seen: Vec<(VertexId, usize)> = Vec::new();
    for coface in &cofaces {
        for v in store.coface(*coface)?.vertices() {
            match seen.iter_mut().find(|(s, _)| s == v) {
                Some((_, n)) => *n += 1,
                None => seen.push((*v, 1)),
            }
        }
    }
    let corners = if cofaces.len() == 1 {
        seen.into_iter().map(|(v, _)| v).collect()
    } else {
        seen.into_iter().filter(|(_, n)| *n == 1).map(|(v, _)| v).collect()
    };
    log.atomic(store, |store, log| {
        let id: FaceId = store.alloc();
        store.insert(Face::new(id, corners));
        log.created(store, id.into())?;
        store.rewire::<Face>(log, id, cofaces)?;
        Ok(id)
    })
}

/// New block from faces in `i_min, i_max, j_min, j_max, k_min, k_max` order
pub fn new_block(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    faces: Vec<FaceId>,
    vertices: Vec<VertexId>,
    law: BlockLaw,
) -> TopoResult<BlockId> {
    if !BLOCK_FORMS.contains(&(faces.len(), vertices.len())) {
        return Err(TopoError::InvalidArgument(format!(
            "a block cannot have {} faces and {} vertices",
            faces.len(),
            vertices.len()
        )));
    }
    log.atomic(store, |store, log| {
        let id: BlockId = store.alloc();
        store.insert(Block::new(id, vertices, law));
        log.created(store, id.into())?;
        store.rewire::<Block>(log, id, faces)?;
        Ok(id)
    })
}

/// Structured quad wrapped in a face, `nb_i` meshing edges along i and `nb_j` along j
pub fn build_quad(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    corners: [DVec3; 4],
    nb_i: u32,
    nb_j: u32,
) -> TopoResult<Quad> {
    log.atomic(store, |store, log| {
        let mut vertices = Vec::with_capacity(4);
        for p in corners {
            vertices.push(new_vertex(store, log, p)?);
        }
        let counts = [nb_j, nb_i, nb_j, nb_i];
        let mut edges = Vec::with_capacity(4);
        for k in 0..4 {
            let (a, b) = (vertices[k], vertices[(k + 1) % 4]);
            let coedge = new_coedge(store, log, a, b, EdgeMeshing::uniform(counts[k]))?;
            edges.push(new_edge(store, log, a, b, vec![coedge])?);
        }
        let coface = new_coface(store, log, edges.clone(), FaceLaw::Transfinite)?;
        let face = new_face(store, log, vec![coface])?;
        Ok(Quad {
            face,
            coface,
            edges: [edges[0], edges[1], edges[2], edges[3]],
            vertices: [vertices[0], vertices[1], vertices[2], vertices[3]],
        })
    })
}

/// Vertex indices of each block face, as boundary cycles
const HEXA_FACES: [[usize; 4]; 6] = [
    [0, 2, 6, 4],
    [1, 3, 7, 5],
    [0, 1, 5, 4],
    [2, 3, 7, 6],
    [0, 1, 3, 2],
    [4, 5, 7, 6],
];

/// Block with 6 faces, 12 edges and 8 vertices.
///
/// Corner `n` sits at `i = n & 1`, `j = (n >> 1) & 1`, `k = (n >> 2) & 1`;
/// `counts` gives the meshing edges along i, j and k.
pub fn build_hexahedron(
    store: &mut TopoStore,
    log: &mut TransactionLog,
    corners: [DVec3; 8],
    counts: [u32; 3],
) -> TopoResult<Hexahedron> {
    log.atomic(store, |store, log| {
        let mut vertices = Vec::with_capacity(8);
        for p in corners {
            vertices.push(new_vertex(store, log, p)?);
        }

        let mut edge_of: BTreeMap<(usize, usize), EdgeId> = BTreeMap::new();
        let mut edges = Vec::with_capacity(12);
        let mut cofaces = Vec::with_capacity(6);
        let mut faces = Vec::with_capacity(6);
        for cycle in HEXA_FACES {
            let mut boundary = Vec::with_capacity(4);
            for k in 0..4 {
                let (a, b) = (cycle[k], cycle[(k + 1) % 4]);
                let key = (a.min(b), a.max(b));
                let edge = match edge_of.get(&key) {
                    Some(edge) => *edge,
                    None => {
                        let axis = (key.0 ^ key.1).trailing_zeros() as usize;
                        let (v0, v1) = (vertices[key.0], vertices[key.1]);
                        let coedge =
                            new_coedge(store, log, v0, v1, EdgeMeshing::uniform(counts[axis]))?;
                        let edge = new_edge(store, log, v0, v1, vec![coedge])?;
                        edge_of.insert(key, edge);
                        edges.push(edge);
                        edge
                    }
                };
                boundary.push(edge);
            }
            let coface = new_coface(store, log, boundary, FaceLaw::Transfinite)?;
            cofaces.push(coface);
            faces.push(new_face(store, log, vec![coface])?);
        }

        let block = new_block(store, log, faces.clone(), vertices.clone(), BlockLaw::Transfinite)?;
        Ok(Hexahedron {
            block,
            faces: [faces[0], faces[1], faces[2], faces[3], faces[4], faces[5]],
            cofaces: [
                cofaces[0], cofaces[1], cofaces[2], cofaces[3], cofaces[4], cofaces[5],
            ],
            edges,
            vertices: [
                vertices[0], vertices[1], vertices[2], vertices[3], vertices[4], vertices[5],
                vertices[6], vertices[7],
            ],
        })
    })
}

/// Corner vertices of a structured boundary, vertex 0 shared by the first and last edge
pub(crate) fn structured_vertices(store: &TopoStore, edges: &[EdgeId]) -> TopoResult<Vec<VertexId>> {
    if !(3..=4).contains(&edges.len()) {
        return Err(TopoError::InvalidArgument(format!(
            "a structured coface needs 3 or 4 edges, got {}",
            edges.len()
        )));
    }
    let first = store.edge(edges[0])?;
    let last = store.edge(edges[edges.len() - 1])?;
    let start = first
        .vertices()
        .into_iter()
        .find(|v| last.has_vertex(*v))
        .ok_or_else(|| {
            TopoError::invariant(
                edges[0],
                format!("no common vertex between first and last boundary edge {}", edges[edges.len() - 1]),
            )
        })?;

    let mut vertices = vec![start];
    let mut current = start;
    for edge in edges {
        let next = store.edge(*edge)?.other_vertex(current).ok_or_else(|| {
            TopoError::invariant(*edge, format!("boundary breaks at {current}"))
        })?;
        vertices.push(next);
        current = next;
    }
    if vertices.pop() != Some(start) {
        return Err(TopoError::invariant(edges[0], "structured boundary is not closed"));
    }
    Ok(vertices)
}

/// Sort edges into closed cycles, returning the ordered edges, the vertices
/// in cycle order and the number of cycles
pub(crate) fn sort_cycles(
    store: &TopoStore,
    edges: &[EdgeId],
) -> TopoResult<(Vec<EdgeId>, Vec<VertexId>, usize)> {
    if edges.is_empty() {
        return Err(TopoError::InvalidArgument("a coface needs at least one edge".into()));
    }
    let mut remaining: Vec<EdgeId> = edges.to_vec();
    let mut sorted = Vec::with_capacity(edges.len());
    let mut vertices = Vec::new();
    let mut cycles = 0;
    while !remaining.is_empty() {
        let head = remaining.remove(0);
        let [start, mut current] = store.edge(head)?.vertices();
        sorted.push(head);
        vertices.push(start);
        cycles += 1;
        while current != start {
            let pos = remaining
                .iter()
                .position(|e| store.edge(*e).is_ok_and(|edge| edge.has_vertex(current)))
                .ok_or_else(|| TopoError::invariant(head, format!("open boundary at {current}")))?;
            let edge = remaining.remove(pos);
            vertices.push(current);
            current = store
                .edge(edge)?
                .other_vertex(current)
                .ok_or_else(|| TopoError::Internal(format!("{edge} lost {current}")))?;
            sorted.push(edge);
        }
    }
    Ok((sorted, vertices, cycles))
}
