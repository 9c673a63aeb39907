//! External collaborators
//!
//! The kernel never evaluates CAD geometry nor owns mesh storage. It keeps
//! opaque references and talks to both through the traits below.

use std::collections::BTreeMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{TopoError, TopoResult};

/// Non-owning reference to an entity of the CAD model
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GeomRef(pub u64);

impl std::fmt::Display for GeomRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Geom{:04}", self.0)
    }
}

/// Kind of CAD entity behind a [`GeomRef`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeomType {
    Point,
    Curve,
    Surface,
    Volume,
}

/// Query surface of the CAD model
pub trait GeometryProvider: Send + Sync {
    /// Project a point onto the referenced entity
    fn project(&self, geom: GeomRef, point: DVec3) -> TopoResult<DVec3>;

    /// Kind of the referenced entity
    fn geom_type(&self, geom: GeomRef) -> TopoResult<GeomType>;

    /// Whether the referenced entity was destroyed in the CAD model
    fn is_destroyed(&self, geom: GeomRef) -> bool;

    /// Names of the groups the referenced entity belongs to
    fn groups_name(&self, geom: GeomRef) -> Vec<String>;
}

/// Provider used when no CAD model is attached
#[derive(Debug, Clone, Copy, Default)]
pub struct NullGeometry;

impl GeometryProvider for NullGeometry {
    fn project(&self, geom: GeomRef, _point: DVec3) -> TopoResult<DVec3> {
        Err(TopoError::Geometry(format!(
            "no CAD model available to project on {geom}"
        )))
    }

    fn geom_type(&self, geom: GeomRef) -> TopoResult<GeomType> {
        Err(TopoError::Geometry(format!(
            "no CAD model available to query {geom}"
        )))
    }

    fn is_destroyed(&self, _geom: GeomRef) -> bool {
        false
    }

    fn groups_name(&self, _geom: GeomRef) -> Vec<String> {
        Vec::new()
    }
}

// ============== Mesh storage ==============

/// Id of a node in the mesh store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Id of an element in the mesh store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

/// Node read back from the mesh store
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshNode {
    pub id: NodeId,
    pub point: DVec3,
}

/// Node and element ids an entity owns in the mesh store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub nodes: Vec<NodeId>,
    pub elements: Vec<ElementId>,
}

impl MeshData {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.elements.is_empty()
    }

    /// Move the ids of `other` after ours
    pub fn append(&mut self, mut other: MeshData) {
        self.nodes.append(&mut other.nodes);
        self.elements.append(&mut other.elements);
    }
}

/// Low-level mesh storage
pub trait MeshStore: Send {
    /// Store a node, returning its id
    fn create_node(&mut self, point: DVec3) -> NodeId;

    /// Read a node back
    fn get(&self, id: NodeId) -> TopoResult<MeshNode>;

    /// Store an element made of existing nodes
    fn create_element(&mut self, nodes: &[NodeId]) -> TopoResult<ElementId>;

    /// Nodes of an element
    fn element_nodes(&self, id: ElementId) -> TopoResult<Vec<NodeId>>;

    /// Remove nodes no element refers to anymore
    fn delete_nodes(&mut self, ids: &[NodeId]) -> TopoResult<()>;

    /// Remove elements
    fn delete_elements(&mut self, ids: &[ElementId]) -> TopoResult<()>;

    /// Remove everything `data` names, elements first
    fn delete(&mut self, data: &MeshData) -> TopoResult<()> {
        self.delete_elements(&data.elements)?;
        self.delete_nodes(&data.nodes)
    }
}

/// Mesh store kept in memory; ids are never reused
#[derive(Debug, Clone, Default)]
pub struct InMemoryMeshStore {
    nodes: BTreeMap<NodeId, DVec3>,
    elements: BTreeMap<ElementId, Vec<NodeId>>,
    next_node: u64,
    next_element: u64,
}

impl InMemoryMeshStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nb_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn nb_elements(&self) -> usize {
        self.elements.len()
    }
}

impl MeshStore for InMemoryMeshStore {
    fn create_node(&mut self, point: DVec3) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(id, point);
        id
    }

    fn get(&self, id: NodeId) -> TopoResult<MeshNode> {
        self.nodes
            .get(&id)
            .map(|point| MeshNode { id, point: *point })
            .ok_or_else(|| TopoError::MeshStore(format!("unknown node {}", id.0)))
    }

    fn create_element(&mut self, nodes: &[NodeId]) -> TopoResult<ElementId> {
        if let Some(missing) = nodes.iter().find(|n| !self.nodes.contains_key(n)) {
            return Err(TopoError::MeshStore(format!(
                "element refers to unknown node {}",
                missing.0
            )));
        }
        let id = ElementId(self.next_element);
        self.next_element += 1;
        self.elements.insert(id, nodes.to_vec());
        Ok(id)
    }

    fn element_nodes(&self, id: ElementId) -> TopoResult<Vec<NodeId>> {
        self.elements
            .get(&id)
            .cloned()
            .ok_or_else(|| TopoError::MeshStore(format!("unknown element {}", id.0)))
    }

    fn delete_nodes(&mut self, ids: &[NodeId]) -> TopoResult<()> {
        if let Some(missing) = ids.iter().find(|n| !self.nodes.contains_key(n)) {
            return Err(TopoError::MeshStore(format!("unknown node {}", missing.0)));
        }
        let used = self
            .elements
            .iter()
            .find_map(|(e, nodes)| ids.iter().find(|n| nodes.contains(n)).map(|n| (*e, *n)));
        if let Some((element, node)) = used {
            return Err(TopoError::MeshStore(format!(
                "node {} is still used by element {}",
                node.0, element.0
            )));
        }
        for id in ids {
            self.nodes.remove(id);
        }
        Ok(())
    }

    fn delete_elements(&mut self, ids: &[ElementId]) -> TopoResult<()> {
        if let Some(missing) = ids.iter().find(|e| !self.elements.contains_key(e)) {
            return Err(TopoError::MeshStore(format!("unknown element {}", missing.0)));
        }
        for id in ids {
            self.elements.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_geometry_is_unavailable() {
        let geom = NullGeometry;
        assert!(geom.project(GeomRef(1), DVec3::ZERO).is_err());
        assert!(geom.geom_type(GeomRef(1)).is_err());
        assert!(!geom.is_destroyed(GeomRef(1)));
        assert!(geom.groups_name(GeomRef(1)).is_empty());
    }

    #[test]
    fn test_in_memory_store() {
        let mut store = InMemoryMeshStore::new();
        let a = store.create_node(DVec3::ZERO);
        let b = store.create_node(DVec3::X);
        let e = store.create_element(&[a, b]).unwrap();
        assert_eq!(store.get(b).unwrap().point, DVec3::X);
        assert_eq!(store.element_nodes(e).unwrap(), vec![a, b]);
        assert!(store.create_element(&[NodeId(9)]).is_err());
        assert!(store.get(NodeId(9)).is_err());
        assert_eq!(store.nb_nodes(), 2);
        assert_eq!(store.nb_elements(), 1);
    }

    #[test]
    fn test_in_memory_delete() {
        let mut store = InMemoryMeshStore::new();
        let a = store.create_node(DVec3::ZERO);
        let b = store.create_node(DVec3::X);
        let e = store.create_element(&[a, b]).unwrap();

        let err = store.delete_nodes(&[b]).unwrap_err();
        assert_eq!(err, TopoError::MeshStore("node 1 is still used by element 0".into()));
        assert_eq!(store.nb_nodes(), 2);

        store
            .delete(&MeshData {
                nodes: vec![a, b],
                elements: vec![e],
            })
            .unwrap();
        assert_eq!((store.nb_nodes(), store.nb_elements()), (0, 0));
        assert!(store.get(a).is_err());
        assert!(store.delete_elements(&[e]).is_err());
        // ids are not reused
        assert_eq!(store.create_node(DVec3::Y), NodeId(2));
    }
}
