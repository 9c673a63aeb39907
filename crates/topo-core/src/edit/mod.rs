//! Structural edits
//!
//! Every public edit takes the store and the transaction log of the running
//! command. It runs in a child log, so it either applies completely or leaves
//! the graph as it found it.

mod build;
mod free;
mod fuse;
mod mesh;
mod modify;
mod replace;
mod split;

pub use build::{
    build_hexahedron, build_quad, new_block, new_coedge, new_coface, new_edge, new_face,
    new_vertex, Hexahedron, Quad,
};
pub use free::{
    destroy_entities, free_block, free_coedge, free_coface, free_edge, free_face, free_vertex,
};
pub use fuse::{fuse_cofaces, fuse_cofaces_by_proximity, proximity_pairs};
pub use mesh::{mesh_coedge, mesh_coface, release_mesh, release_coface_mesh};
pub use modify::{
    add_to_group, move_vertex, remove_from_group, set_block_law, set_coedge_ratio,
    set_edge_meshing, set_face_law, set_geom_association,
};
pub use replace::{
    collapse_block_face, merge_cofaces, merge_coedges, merge_edges, merge_vertices, replace_vertex,
};
pub use split::{split_coedge, split_coface, split_coface_at, split_coface_ogrid, SplitAt};
