//! Kernel error type

use thiserror::Error;

/// Error category, used to decide how a failure is surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller asked for something the graph cannot do; nothing was mutated
    Precondition,
    /// A graph invariant does not hold; a defect
    Internal,
    /// Cooperative cancellation was requested
    Canceled,
}

/// Errors raised by the topology kernel
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TopoError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity {0} is destroyed")]
    Destroyed(String),

    #[error("Cannot modify {0}: it is already meshed")]
    Meshed(String),

    #[error("Cannot destroy {0} before its mesh is released")]
    MeshNotReleased(String),

    #[error("{0} has no mesh data")]
    NotMeshed(String),

    #[error("{0} is not structured")]
    NotStructured(String),

    #[error("Cannot split {coface} with {found} cut(s), expected 1 or 2")]
    SplitCardinality { coface: String, found: usize },

    #[error("Vertex {vertex} does not lie inside the boundary of {coface}")]
    VertexNotOnBoundary { vertex: String, coface: String },

    #[error("Cuts through {0} cross each other")]
    CrossingCuts(String),

    #[error("Cannot split {coedge} discretized in {nb_edges} edge(s) at {position}")]
    CannotSplitCoEdge {
        coedge: String,
        nb_edges: u32,
        position: String,
    },

    #[error(
        "Cannot fuse [{}] and [{}]: discretizations differ ({first_count} != {second_count})",
        .first.join(", "),
        .second.join(", ")
    )]
    DiscretizationMismatch {
        first: Vec<String>,
        second: Vec<String>,
        first_count: u32,
        second_count: u32,
    },

    #[error("Cannot fuse {first} and {second}: they are made of a different number of coedges")]
    CoEdgeCountMismatch { first: String, second: String },

    #[error("Vertex correspondence error: {0}")]
    VertexCorrespondence(String),

    #[error("{0} cannot be combined with itself")]
    SameEntity(String),

    #[error(
        "O-grid split of {coface} is inconsistent: arm differences {first} and {second} must be equal and positive"
    )]
    OgridCountMismatch {
        coface: String,
        first: i64,
        second: i64,
    },

    #[error("Cannot merge {first} and {second}: they are not joined by a side of {coface}")]
    NonAdjacentVertices {
        first: String,
        second: String,
        coface: String,
    },

    #[error("{block} would be left with {faces} faces and {vertices} distinct vertices")]
    DegenerateBlock {
        block: String,
        faces: usize,
        vertices: usize,
    },

    #[error("{entity} is still referenced by {by}")]
    StillReferenced { entity: String, by: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Mesh store error: {0}")]
    MeshStore(String),

    #[error("Invalid topology for {entity}: {reason}")]
    Invariant { entity: String, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation canceled")]
    Canceled,
}

impl TopoError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TopoError::Invariant { .. } | TopoError::Internal(_) => ErrorKind::Internal,
            TopoError::Canceled => ErrorKind::Canceled,
            _ => ErrorKind::Precondition,
        }
    }

    pub fn invariant(entity: impl ToString, reason: impl Into<String>) -> Self {
        TopoError::Invariant {
            entity: entity.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for kernel operations
pub type TopoResult<T> = Result<T, TopoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_message_names_entities() {
        let err = TopoError::DiscretizationMismatch {
            first: vec!["CoEdge0001".into(), "CoEdge0002".into()],
            second: vec!["CoEdge0007".into()],
            first_count: 6,
            second_count: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("CoEdge0001, CoEdge0002"));
        assert!(msg.contains("6 != 5"));
        assert_eq!(err.kind(), ErrorKind::Precondition);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            TopoError::invariant("CoFace0001", "no common vertex").kind(),
            ErrorKind::Internal
        );
        assert_eq!(TopoError::Canceled.kind(), ErrorKind::Canceled);
        assert_eq!(
            TopoError::Meshed("Vtx0001".into()).kind(),
            ErrorKind::Precondition
        );
        let block = TopoError::DegenerateBlock {
            block: "Block0001".into(),
            faces: 6,
            vertices: 7,
        };
        assert_eq!(block.kind(), ErrorKind::Precondition);
        assert_eq!(
            block.to_string(),
            "Block0001 would be left with 6 faces and 7 distinct vertices"
        );
    }
}
