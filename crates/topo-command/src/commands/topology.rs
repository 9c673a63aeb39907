//! Construction and elementary topology commands

use glam::DVec3;

use topo_core::edit::{
    build_hexahedron, build_quad, collapse_block_face, destroy_entities, merge_vertices,
    move_vertex, Hexahedron, Quad,
};
use topo_core::{BlockId, EdgeId, EntityId, FaceId, TopoResult, VertexId};

use super::{names, point};
use crate::command::{Edit, EditContext};

/// Structured quad wrapped in a face
#[derive(Debug, Clone)]
pub struct NewQuadCommand {
    corners: [DVec3; 4],
    nb_i: u32,
    nb_j: u32,
    quad: Option<Quad>,
}

impl NewQuadCommand {
    pub fn new(corners: [DVec3; 4], nb_i: u32, nb_j: u32) -> Self {
        Self {
            corners,
            nb_i,
            nb_j,
            quad: None,
        }
    }

    pub fn quad(&self) -> Option<&Quad> {
        self.quad.as_ref()
    }
}

impl Edit for NewQuadCommand {
    fn name(&self) -> String {
        "New quad".into()
    }

    fn script_command(&self) -> String {
        let corners: Vec<String> = self.corners.iter().map(|p| point(*p)).collect();
        format!(
            "ctx.getTopoManager().newQuad([{}], {}, {})",
            corners.join(", "),
            self.nb_i,
            self.nb_j
        )
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        let quad = build_quad(ctx.store, ctx.log, self.corners, self.nb_i, self.nb_j)?;
        self.quad = Some(quad);
        Ok(())
    }

    /// Face, coface, the 4 edges then the 4 vertices
    fn outputs(&self) -> Vec<EntityId> {
        let Some(quad) = &self.quad else {
            return Vec::new();
        };
        let mut out: Vec<EntityId> = vec![quad.face.into(), quad.coface.into()];
        out.extend(quad.edges.iter().map(|e| EntityId::from(*e)));
        out.extend(quad.vertices.iter().map(|v| EntityId::from(*v)));
        out
    }
}

/// Axis-aligned box block
#[derive(Debug, Clone)]
pub struct NewHexahedronCommand {
    min: DVec3,
    max: DVec3,
    counts: [u32; 3],
    hexa: Option<Hexahedron>,
}

impl NewHexahedronCommand {
    pub fn new(min: DVec3, max: DVec3, counts: [u32; 3]) -> Self {
        Self {
            min,
            max,
            counts,
            hexa: None,
        }
    }

    pub fn hexahedron(&self) -> Option<&Hexahedron> {
        self.hexa.as_ref()
    }
}

impl Edit for NewHexahedronCommand {
    fn name(&self) -> String {
        "New block".into()
    }

    fn script_command(&self) -> String {
        format!(
            "ctx.getTopoManager().newBoxWithTopo({}, {}, {}, {}, {})",
            point(self.min),
            point(self.max),
            self.counts[0],
            self.counts[1],
            self.counts[2]
        )
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        let (min, max) = (self.min, self.max);
        let corners: [DVec3; 8] = std::array::from_fn(|n| {
            DVec3::new(
                if n & 1 == 0 { min.x } else { max.x },
                if n & 2 == 0 { min.y } else { max.y },
                if n & 4 == 0 { min.z } else { max.z },
            )
        });
        self.hexa = Some(build_hexahedron(ctx.store, ctx.log, corners, self.counts)?);
        Ok(())
    }

    /// Block then its 6 faces
    fn outputs(&self) -> Vec<EntityId> {
        let Some(hexa) = &self.hexa else {
            return Vec::new();
        };
        let mut out: Vec<EntityId> = vec![hexa.block.into()];
        out.extend(hexa.faces.iter().map(|f| EntityId::from(*f)));
        out
    }
}

/// Merge `gone` into `keep`
#[derive(Debug, Clone)]
pub struct MergeVerticesCommand {
    keep: VertexId,
    gone: VertexId,
}

impl MergeVerticesCommand {
    pub fn new(keep: VertexId, gone: VertexId) -> Self {
        Self { keep, gone }
    }
}

impl Edit for MergeVerticesCommand {
    fn name(&self) -> String {
        format!("Merge {} into {}", self.gone, self.keep)
    }

    fn script_command(&self) -> String {
        format!(
            "ctx.getTopoManager().mergeVertices(\"{}\", \"{}\")",
            self.keep, self.gone
        )
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        merge_vertices(ctx.store, ctx.log, self.keep, self.gone)
    }
}

/// Collapse a side face of a hexahedral block into an edge, or a point
#[derive(Debug, Clone)]
pub struct CollapseBlockFaceCommand {
    block: BlockId,
    face: FaceId,
    edge: EdgeId,
    to_point: bool,
}

impl CollapseBlockFaceCommand {
    pub fn new(block: BlockId, face: FaceId, edge: EdgeId, to_point: bool) -> Self {
        Self {
            block,
            face,
            edge,
            to_point,
        }
    }
}

impl Edit for CollapseBlockFaceCommand {
    fn name(&self) -> String {
        let shape = if self.to_point { "point" } else { "edge" };
        format!("Collapse {} of {} into a {shape}", self.face, self.block)
    }

    fn script_command(&self) -> String {
        let method = if self.to_point {
            "degenerateFaceInVertex"
        } else {
            "degenerateFaceInEdge"
        };
        format!(
            "ctx.getTopoManager().{method}(\"{}\", \"{}\", \"{}\")",
            self.block, self.face, self.edge
        )
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        collapse_block_face(
            ctx.store,
            ctx.log,
            ctx.geom,
            self.block,
            self.face,
            self.edge,
            self.to_point,
        )
    }

    fn outputs(&self) -> Vec<EntityId> {
        vec![self.block.into()]
    }
}

#[derive(Debug, Clone)]
pub struct DestroyTopoCommand {
    entities: Vec<EntityId>,
    propagate: bool,
    destroyed: Vec<EntityId>,
}

impl DestroyTopoCommand {
    pub fn new(entities: Vec<EntityId>, propagate: bool) -> Self {
        Self {
            entities,
            propagate,
            destroyed: Vec::new(),
        }
    }
}

impl Edit for DestroyTopoCommand {
    fn name(&self) -> String {
        "Destroy topology".into()
    }

    fn script_command(&self) -> String {
        let propagate = if self.propagate { "True" } else { "False" };
        format!(
            "ctx.getTopoManager().destroy({}, {propagate})",
            names(&self.entities)
        )
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        self.destroyed = destroy_entities(ctx.store, ctx.log, &self.entities, self.propagate)?;
        Ok(())
    }

    fn outputs(&self) -> Vec<EntityId> {
        self.destroyed.clone()
    }
}

#[derive(Debug, Clone)]
pub struct MoveVertexCommand {
    vertex: VertexId,
    coord: DVec3,
}

impl MoveVertexCommand {
    pub fn new(vertex: VertexId, coord: DVec3) -> Self {
        Self { vertex, coord }
    }
}

impl Edit for MoveVertexCommand {
    fn name(&self) -> String {
        format!("Move {}", self.vertex)
    }

    fn script_command(&self) -> String {
        format!(
            "ctx.getTopoManager().setVertexLocation([\"{}\"], [{}])",
            self.vertex,
            point(self.coord)
        )
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        move_vertex(ctx.store, ctx.log, self.vertex, self.coord)
    }
}
