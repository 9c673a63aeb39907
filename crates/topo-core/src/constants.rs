//! Global constants for topo-core

/// Default number of meshing edges given to a new coedge
pub const DEFAULT_NB_MESHING_EDGES: u32 = 10;

/// Distance under which two vertices are considered coincident when fusing
pub const DEFAULT_FUSE_TOLERANCE: f64 = 1e-6;

/// Tolerance used when comparing parametric positions
pub const PARAM_EPSILON: f64 = 1e-12;

/// Faces and vertices counts a block may have, regular form first
pub const BLOCK_FORMS: [(usize, usize); 4] = [(6, 8), (5, 6), (5, 5), (4, 4)];

/// Maximum number of parent faces a coface may be shared by
pub const MAX_FACES_PER_COFACE: usize = 2;

/// Maximum number of blocks a face may be shared by
pub const MAX_BLOCKS_PER_FACE: usize = 2;
