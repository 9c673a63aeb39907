//! Block Topology Kernel
//!
//! This crate holds the topological model used to build structured and
//! unstructured block meshes:
//! - Entities: Vertex, CoEdge, Edge, CoFace, Face and Block in an id arena
//! - Meshing laws for coedges, cofaces and blocks
//! - Structural edits: split, fuse, merge, free and replace
//! - Transaction log: snapshots for exact undo and redo
//! - Validator and introspection trees

pub mod config;
pub mod constants;
pub mod describe;
pub mod edit;
pub mod entity;
pub mod error;
pub mod id;
pub mod law;
pub mod nav;
pub mod provider;
pub mod store;
pub mod txn;
pub mod validate;

pub use config::*;
pub use constants::*;
pub use describe::*;
pub use entity::*;
pub use error::*;
pub use id::*;
pub use law::*;
pub use nav::*;
pub use provider::*;
pub use store::*;
pub use txn::*;
pub use validate::*;
