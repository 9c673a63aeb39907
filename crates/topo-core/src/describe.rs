//! Introspection trees
//!
//! A [`Description`] is a tree of `(label, value)` pairs meant for debugging
//! and inspection tools. It is not a persistence format.

use serde::{Deserialize, Serialize};

use crate::entity::Header;
use crate::error::TopoResult;
use crate::id::EntityId;
use crate::provider::GeometryProvider;
use crate::store::TopoStore;

/// Node of an introspection tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Description {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Description>,
}

impl Description {
    /// Create a section without a value
    pub fn section(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: None,
            children: Vec::new(),
        }
    }

    /// Create a leaf carrying a value
    pub fn leaf(label: impl Into<String>, value: impl ToString) -> Self {
        Self {
            label: label.into(),
            value: Some(value.to_string()),
            children: Vec::new(),
        }
    }

    /// Append a child
    pub fn push(&mut self, child: Description) {
        self.children.push(child);
    }

    /// Append a leaf
    pub fn push_leaf(&mut self, label: impl Into<String>, value: impl ToString) {
        self.children.push(Description::leaf(label, value));
    }

    /// Builder-style append
    pub fn with(mut self, child: Description) -> Self {
        self.children.push(child);
        self
    }

    /// Direct child with the given label
    pub fn child(&self, label: &str) -> Option<&Description> {
        self.children.iter().find(|c| c.label == label)
    }

    /// Value of the first node with this label, searched depth first
    pub fn find_value(&self, label: &str) -> Option<&str> {
        if self.label == label {
            return self.value.as_deref();
        }
        self.children.iter().find_map(|c| c.find_value(label))
    }
}

fn list<T: std::fmt::Display>(ids: impl IntoIterator<Item = T>) -> String {
    ids.into_iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_header(desc: &mut Description, header: &Header, geom: &dyn GeometryProvider) {
    if !header.groups.is_empty() {
        desc.push_leaf("Groups", list(&header.groups));
    }
    if let Some(g) = header.geom {
        let mut section = Description::section("Geometry").with(Description::leaf("Name", g));
        if let Ok(kind) = geom.geom_type(g) {
            section.push_leaf("Type", format!("{kind:?}"));
        }
        if geom.is_destroyed(g) {
            section.push_leaf("Destroyed", true);
        }
        desc.push(section);
    }
    match &header.mesh {
        Some(mesh) => {
            let mut section = Description::section("Mesh");
            section.push_leaf("Nodes", mesh.nodes.len());
            section.push_leaf("Elements", mesh.elements.len());
            desc.push(section);
        }
        None => desc.push_leaf("Meshed", false),
    }
}

impl TopoStore {
    /// Introspection tree of a live entity
    pub fn describe(&self, id: EntityId, geom: &dyn GeometryProvider) -> TopoResult<Description> {
        let mut desc = Description::section(id.to_string());
        desc.push_leaf("Name", id);
        desc.push_leaf("Kind", id.kind().display_name());
        match id {
            EntityId::Vertex(v) => {
                let vertex = self.vertex(v)?;
                let p = vertex.coord();
                desc.push(
                    Description::section("Coordinates")
                        .with(Description::leaf("X", p.x))
                        .with(Description::leaf("Y", p.y))
                        .with(Description::leaf("Z", p.z)),
                );
                desc.push_leaf("CoEdges", list(vertex.coedges()));
                describe_header(&mut desc, &vertex.header, geom);
            }
            EntityId::CoEdge(c) => {
                let coedge = self.coedge(c)?;
                desc.push_leaf("Vertices", list(coedge.vertices()));
                desc.push(coedge.meshing().describe());
                desc.push_leaf("Edges", list(coedge.edges()));
                describe_header(&mut desc, &coedge.header, geom);
            }
            EntityId::Edge(e) => {
                let edge = self.edge(e)?;
                desc.push_leaf("Vertices", list(edge.vertices()));
                let mut coedges = Description::section("CoEdges");
                for c in edge.coedges() {
                    coedges.push_leaf(c.to_string(), format!("ratio {}", edge.ratio(*c)));
                }
                desc.push(coedges);
                desc.push_leaf("Meshing edges", self.edge_nb_meshing_edges(e)?);
                desc.push_leaf("CoFaces", list(edge.cofaces()));
                describe_header(&mut desc, &edge.header, geom);
            }
            EntityId::CoFace(f) => {
                let coface = self.coface(f)?;
                let mut meshing = coface.law().describe();
                if coface.is_structured() {
                    let (ni, nj) = self.nb_meshing_edges_ij(f)?;
                    meshing.push_leaf("Meshing edges I", ni);
                    meshing.push_leaf("Meshing edges J", nj);
                    meshing.push_leaf("Degenerate", coface.is_degenerate());
                } else {
                    meshing.push_leaf("Holed", coface.is_holed());
                }
                desc.push(meshing);
                desc.push_leaf("Vertices", list(coface.vertices()));
                desc.push_leaf("Edges", list(coface.edges()));
                desc.push_leaf("Faces", list(coface.faces()));
                describe_header(&mut desc, &coface.header, geom);
            }
            EntityId::Face(f) => {
                let face = self.face(f)?;
                desc.push_leaf("Vertices", list(face.vertices()));
                desc.push_leaf("CoFaces", list(face.cofaces()));
                desc.push_leaf("Blocks", list(face.blocks()));
                describe_header(&mut desc, &face.header, geom);
            }
            EntityId::Block(b) => {
                let block = self.block(b)?;
                desc.push(block.law().describe());
                desc.push_leaf("Vertices", list(block.vertices()));
                desc.push_leaf("Faces", list(block.faces()));
                describe_header(&mut desc, &block.header, geom);
            }
        }
        Ok(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_value_depth_first() {
        let tree = Description::section("CoFace0001")
            .with(Description::leaf("Name", "CoFace0001"))
            .with(
                Description::section("Meshing")
                    .with(Description::leaf("Law", "Transfinite"))
                    .with(Description::leaf("Structured", true)),
            );
        assert_eq!(tree.find_value("Law"), Some("Transfinite"));
        assert_eq!(tree.find_value("Structured"), Some("true"));
        assert!(tree.child("Meshing").is_some());
        assert_eq!(tree.find_value("Missing"), None);
    }

    #[test]
    fn test_describe_coface() {
        use crate::config::TopoConfig;
        use crate::edit::build_quad;
        use crate::provider::NullGeometry;
        use crate::txn::TransactionLog;
        use glam::DVec3;

        let mut store = TopoStore::new(TopoConfig::default());
        let mut log = TransactionLog::begin(&store);
        let corners = [DVec3::ZERO, DVec3::X, DVec3::new(1.0, 1.0, 0.0), DVec3::Y];
        let quad = build_quad(&mut store, &mut log, corners, 2, 3).unwrap();
        log.commit(&mut store);

        let desc = store.describe(quad.coface.into(), &NullGeometry).unwrap();
        assert_eq!(desc.find_value("Kind"), Some("CoFace"));
        assert_eq!(desc.find_value("Law"), Some("transfinite"));
        assert_eq!(desc.find_value("Meshing edges I"), Some("2"));
        assert_eq!(desc.find_value("Meshing edges J"), Some("3"));
        assert_eq!(desc.find_value("Meshed"), Some("false"));

        let desc = store.describe(quad.vertices[2].into(), &NullGeometry).unwrap();
        assert_eq!(desc.child("Coordinates").and_then(|c| c.find_value("X")), Some("1"));
    }
}
