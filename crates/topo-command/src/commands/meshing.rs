//! Discretization commands

use std::time::Duration;

use topo_core::edit::{mesh_coface, release_coface_mesh, set_edge_meshing, set_face_law};
use topo_core::{CoEdgeId, CoFaceId, EdgeMeshing, EntityId, FaceLaw, TopoResult};

use super::names;
use crate::command::{Edit, EditContext};

/// Rough meshing cost of one coface
const MESH_COST_PER_COFACE: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct SetEdgeMeshingCommand {
    coedges: Vec<CoEdgeId>,
    meshing: EdgeMeshing,
}

impl SetEdgeMeshingCommand {
    pub fn new(coedges: Vec<CoEdgeId>, meshing: EdgeMeshing) -> Self {
        Self { coedges, meshing }
    }
}

impl Edit for SetEdgeMeshingCommand {
    fn name(&self) -> String {
        "Edge discretization".into()
    }

    fn script_command(&self) -> String {
        format!(
            "ctx.getTopoManager().setMeshingProperty({}, {})",
            self.meshing.script_command(),
            names(&self.coedges)
        )
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        for coedge in &self.coedges {
            ctx.checkpoint()?;
            set_edge_meshing(ctx.store, ctx.log, *coedge, self.meshing.clone())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SetFaceLawCommand {
    cofaces: Vec<CoFaceId>,
    law: FaceLaw,
}

impl SetFaceLawCommand {
    pub fn new(cofaces: Vec<CoFaceId>, law: FaceLaw) -> Self {
        Self { cofaces, law }
    }
}

impl Edit for SetFaceLawCommand {
    fn name(&self) -> String {
        "Face meshing law".into()
    }

    fn script_command(&self) -> String {
        format!(
            "ctx.getTopoManager().setMeshingProperty({}, {})",
            self.law.script_command(),
            names(&self.cofaces)
        )
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        for coface in &self.cofaces {
            ctx.checkpoint()?;
            set_face_law(ctx.store, ctx.log, *coface, self.law.clone())?;
        }
        Ok(())
    }
}

/// Mesh structured cofaces, the boundary included
#[derive(Debug, Clone)]
pub struct MeshCoFacesCommand {
    cofaces: Vec<CoFaceId>,
}

impl MeshCoFacesCommand {
    pub fn new(cofaces: Vec<CoFaceId>) -> Self {
        Self { cofaces }
    }
}

impl Edit for MeshCoFacesCommand {
    fn name(&self) -> String {
        "Mesh faces".into()
    }

    fn script_command(&self) -> String {
        format!("ctx.getMeshManager().newFacesMesh({})", names(&self.cofaces))
    }

    fn estimated_duration(&self) -> Duration {
        MESH_COST_PER_COFACE * self.cofaces.len() as u32
    }

    fn threadable(&self) -> bool {
        true
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        for coface in &self.cofaces {
            ctx.checkpoint()?;
            mesh_coface(ctx.store, ctx.log, ctx.mesh, ctx.geom, *coface)?;
        }
        Ok(())
    }

    fn outputs(&self) -> Vec<EntityId> {
        self.cofaces.iter().map(|f| EntityId::from(*f)).collect()
    }
}

/// Release the mesh of cofaces so they can be edited again
#[derive(Debug, Clone)]
pub struct ReleaseMeshCommand {
    cofaces: Vec<CoFaceId>,
    released: Vec<EntityId>,
}

impl ReleaseMeshCommand {
    pub fn new(cofaces: Vec<CoFaceId>) -> Self {
        Self {
            cofaces,
            released: Vec::new(),
        }
    }
}

impl Edit for ReleaseMeshCommand {
    fn name(&self) -> String {
        "Release mesh".into()
    }

    fn script_command(&self) -> String {
        format!("ctx.getMeshManager().releaseFacesMesh({})", names(&self.cofaces))
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        self.released.clear();
        for coface in &self.cofaces {
            let released = release_coface_mesh(ctx.store, ctx.log, *coface)?;
            self.released.extend(released);
        }
        Ok(())
    }

    fn outputs(&self) -> Vec<EntityId> {
        self.released.clone()
    }
}
