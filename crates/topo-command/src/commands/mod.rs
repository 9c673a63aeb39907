//! Concrete edit commands
//!
//! Each command keeps its arguments and the entities its last run produced.
//! Script text follows the `ctx.getTopoManager()` call style of the session
//! transcript.

mod fuse;
mod meshing;
mod split;
mod topology;

pub use fuse::FuseCoFacesCommand;
pub use meshing::{MeshCoFacesCommand, ReleaseMeshCommand, SetEdgeMeshingCommand, SetFaceLawCommand};
pub use split::{SplitCoFaceCommand, SplitCoFaceOgridCommand};
pub use topology::{
    CollapseBlockFaceCommand, DestroyTopoCommand, MergeVerticesCommand, MoveVertexCommand, NewHexahedronCommand,
    NewQuadCommand,
};

use glam::DVec3;

/// Point literal in script text
pub(crate) fn point(p: DVec3) -> String {
    format!("Point({}, {}, {})", p.x, p.y, p.z)
}

/// List of quoted entity names in script text
pub(crate) fn names<T: std::fmt::Display>(ids: &[T]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("\"{id}\"")).collect();
    format!("[{}]", quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use topo_core::CoFaceId;

    #[test]
    fn test_script_literals() {
        assert_eq!(point(DVec3::new(1.0, 0.5, 0.0)), "Point(1, 0.5, 0)");
        assert_eq!(names(&[CoFaceId(3), CoFaceId(12)]), "[\"CoFace0003\", \"CoFace0012\"]");
    }
}
