//! Kernel configuration
//!
//! Settings that steer default discretizations and tolerances. The value is
//! owned by the [`crate::TopoStore`] it was given to, never global.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_FUSE_TOLERANCE, DEFAULT_NB_MESHING_EDGES};

/// Topology kernel configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TopoConfig {
    /// Number of meshing edges given to coedges built without an explicit count
    pub default_nb_meshing_edges: u32,
    /// Distance under which two vertices are matched when fusing by proximity
    pub fuse_tolerance: f64,
}

impl Default for TopoConfig {
    fn default() -> Self {
        Self {
            default_nb_meshing_edges: DEFAULT_NB_MESHING_EDGES,
            fuse_tolerance: DEFAULT_FUSE_TOLERANCE,
        }
    }
}

impl TopoConfig {
    /// Coarse preset, handy for quick previews
    pub fn coarse() -> Self {
        Self {
            default_nb_meshing_edges: 4,
            ..Self::default()
        }
    }
}
