//! Fuse command

use topo_core::edit::{fuse_cofaces, proximity_pairs};
use topo_core::{CoFaceId, EntityId, TopoResult, VertexId};

use crate::command::{Edit, EditContext};

/// Fuse two cofaces lying on each other
#[derive(Debug, Clone)]
pub struct FuseCoFacesCommand {
    a: CoFaceId,
    b: CoFaceId,
    /// Vertex correspondence; found by proximity when absent
    pairs: Option<Vec<(VertexId, VertexId)>>,
    survivor: Option<CoFaceId>,
}

impl FuseCoFacesCommand {
    pub fn with_pairs(a: CoFaceId, b: CoFaceId, pairs: Vec<(VertexId, VertexId)>) -> Self {
        Self {
            a,
            b,
            pairs: Some(pairs),
            survivor: None,
        }
    }

    pub fn by_proximity(a: CoFaceId, b: CoFaceId) -> Self {
        Self {
            a,
            b,
            pairs: None,
            survivor: None,
        }
    }

    pub fn survivor(&self) -> Option<CoFaceId> {
        self.survivor
    }
}

impl Edit for FuseCoFacesCommand {
    fn name(&self) -> String {
        format!("Fuse {} and {}", self.a, self.b)
    }

    fn script_command(&self) -> String {
        match &self.pairs {
            Some(pairs) => {
                let pairs: Vec<String> = pairs
                    .iter()
                    .map(|(a, b)| format!("(\"{a}\", \"{b}\")"))
                    .collect();
                format!(
                    "ctx.getTopoManager().fuse2Faces(\"{}\", \"{}\", [{}])",
                    self.a,
                    self.b,
                    pairs.join(", ")
                )
            }
            None => format!("ctx.getTopoManager().fuse2Faces(\"{}\", \"{}\")", self.a, self.b),
        }
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        let pairs = match &self.pairs {
            Some(pairs) => pairs.clone(),
            None => proximity_pairs(ctx.store, self.a, self.b)?,
        };
        ctx.checkpoint()?;
        self.survivor = Some(fuse_cofaces(ctx.store, ctx.log, ctx.geom, self.a, self.b, &pairs)?);
        Ok(())
    }

    fn outputs(&self) -> Vec<EntityId> {
        self.survivor.map(EntityId::from).into_iter().collect()
    }
}
