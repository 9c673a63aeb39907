//! Split commands

use topo_core::edit::{split_coface_at, split_coface_ogrid};
use topo_core::{CoFaceId, EdgeId, EntityId, TopoResult};

use crate::command::{Edit, EditContext};

/// Split a structured coface across `edge`, at `ratio` along it
#[derive(Debug, Clone)]
pub struct SplitCoFaceCommand {
    coface: CoFaceId,
    edge: EdgeId,
    ratio: f64,
    children: Vec<CoFaceId>,
}

impl SplitCoFaceCommand {
    pub fn new(coface: CoFaceId, edge: EdgeId, ratio: f64) -> Self {
        Self {
            coface,
            edge,
            ratio,
            children: Vec::new(),
        }
    }

    pub fn children(&self) -> &[CoFaceId] {
        &self.children
    }
}

impl Edit for SplitCoFaceCommand {
    fn name(&self) -> String {
        format!("Split {}", self.coface)
    }

    fn script_command(&self) -> String {
        format!(
            "ctx.getTopoManager().splitFace(\"{}\", \"{}\", {})",
            self.coface, self.edge, self.ratio
        )
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        self.children = split_coface_at(ctx.store, ctx.log, self.coface, self.edge, self.ratio)?;
        Ok(())
    }

    fn outputs(&self) -> Vec<EntityId> {
        self.children.iter().map(|f| EntityId::from(*f)).collect()
    }
}

/// O-grid split: a central coface and two arms
#[derive(Debug, Clone)]
pub struct SplitCoFaceOgridCommand {
    coface: CoFaceId,
    ratio: f64,
    children: Vec<CoFaceId>,
}

impl SplitCoFaceOgridCommand {
    pub fn new(coface: CoFaceId, ratio: f64) -> Self {
        Self {
            coface,
            ratio,
            children: Vec::new(),
        }
    }
}

impl Edit for SplitCoFaceOgridCommand {
    fn name(&self) -> String {
        format!("O-grid split of {}", self.coface)
    }

    fn script_command(&self) -> String {
        format!(
            "ctx.getTopoManager().splitFacesWithOgrid([\"{}\"], {})",
            self.coface, self.ratio
        )
    }

    fn apply(&mut self, ctx: &mut EditContext<'_>) -> TopoResult<()> {
        self.children = split_coface_ogrid(ctx.store, ctx.log, self.coface, self.ratio)?.to_vec();
        Ok(())
    }

    fn outputs(&self) -> Vec<EntityId> {
        self.children.iter().map(|f| EntityId::from(*f)).collect()
    }
}
