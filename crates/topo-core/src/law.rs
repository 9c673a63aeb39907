//! Meshing laws
//!
//! Discretization laws are closed enums. Each law knows whether it is
//! structured, how it is written in a replayable script, and which properties
//! it contributes to an introspection [`Description`].

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::constants::PARAM_EPSILON;
use crate::describe::Description;
use crate::error::{TopoError, TopoResult};
use crate::id::CoEdgeId;

/// Parametric direction on a structured coface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dir {
    I,
    J,
}

impl Dir {
    pub fn other(self) -> Dir {
        match self {
            Dir::I => Dir::J,
            Dir::J => Dir::I,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dir::I => "i",
            Dir::J => "j",
        }
    }
}

/// Parametric direction in a structured block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dir3 {
    I,
    J,
    K,
}

impl Dir3 {
    pub fn name(self) -> &'static str {
        match self {
            Dir3::I => "i",
            Dir3::J => "j",
            Dir3::K => "k",
        }
    }
}

// ============== CoEdge laws ==============

/// How the nodes of a coedge are distributed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EdgeLaw {
    /// Equal segments
    Uniform,
    /// Segment lengths grow by `ratio` from the first vertex
    Geometric { ratio: f64 },
    /// Geometric growth from both ends
    BiGeometric { ratio1: f64, ratio2: f64 },
    /// Hyperbolic tangent clustering toward the first vertex
    Hyperbolic { delta: f64 },
    /// Segments close to a given size (count already derived)
    SpecificSize { size: f64 },
    /// Node placement copied from another coedge
    Interpolated { reference: CoEdgeId },
    /// Node placement blended from two facing coedge chains
    GlobalInterpolated {
        first: Vec<CoEdgeId>,
        second: Vec<CoEdgeId>,
    },
    /// Explicit segment lengths
    Tabulated { lengths: Vec<f64> },
    /// Roberts stretching with coefficient `beta` > 1
    BetaTightening { beta: f64 },
    /// Uniform in angle around `center`
    PolarCut { center: DVec3 },
}

impl EdgeLaw {
    pub fn name(&self) -> &'static str {
        match self {
            EdgeLaw::Uniform => "uniform",
            EdgeLaw::Geometric { .. } => "geometric",
            EdgeLaw::BiGeometric { .. } => "bigeometric",
            EdgeLaw::Hyperbolic { .. } => "hyperbolic",
            EdgeLaw::SpecificSize { .. } => "specific size",
            EdgeLaw::Interpolated { .. } => "interpolated",
            EdgeLaw::GlobalInterpolated { .. } => "global interpolated",
            EdgeLaw::Tabulated { .. } => "tabulated",
            EdgeLaw::BetaTightening { .. } => "beta tightening",
            EdgeLaw::PolarCut { .. } => "polar cut",
        }
    }
}

/// Discretization of a coedge: a law and a number of meshing edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeMeshing {
    pub nb_edges: u32,
    pub law: EdgeLaw,
    /// False when the law runs from the second vertex to the first
    pub direct: bool,
}

impl EdgeMeshing {
    pub fn new(nb_edges: u32, law: EdgeLaw) -> Self {
        Self {
            nb_edges,
            law,
            direct: true,
        }
    }

    pub fn uniform(nb_edges: u32) -> Self {
        Self::new(nb_edges, EdgeLaw::Uniform)
    }

    pub fn reversed(mut self) -> Self {
        self.direct = !self.direct;
        self
    }

    pub fn nb_nodes(&self) -> u32 {
        self.nb_edges + 1
    }

    /// Same law with another number of meshing edges
    pub fn with_nb_edges(&self, nb_edges: u32) -> Self {
        let mut meshing = self.clone();
        meshing.nb_edges = nb_edges;
        if let EdgeLaw::Tabulated { lengths } = &self.law {
            if lengths.len() != nb_edges as usize {
                meshing.law = EdgeLaw::Uniform;
            }
        }
        meshing
    }

    /// Reject laws that cannot produce a discretization
    pub fn validate(&self) -> TopoResult<()> {
        if self.nb_edges == 0 {
            return Err(TopoError::InvalidArgument(
                "a coedge needs at least one meshing edge".into(),
            ));
        }
        match &self.law {
            EdgeLaw::Geometric { ratio } if *ratio <= 0.0 => Err(TopoError::InvalidArgument(
                format!("geometric ratio must be positive, got {ratio}"),
            )),
            EdgeLaw::BiGeometric { ratio1, ratio2 } if *ratio1 <= 0.0 || *ratio2 <= 0.0 => {
                Err(TopoError::InvalidArgument(
                    "bigeometric ratios must be positive".into(),
                ))
            }
            EdgeLaw::BetaTightening { beta } if *beta <= 1.0 => Err(TopoError::InvalidArgument(
                format!("beta must be greater than 1, got {beta}"),
            )),
            EdgeLaw::Tabulated { lengths } if lengths.len() != self.nb_edges as usize => {
                Err(TopoError::InvalidArgument(format!(
                    "{} tabulated lengths for {} meshing edges",
                    lengths.len(),
                    self.nb_edges
                )))
            }
            EdgeLaw::Tabulated { lengths } if lengths.iter().any(|l| *l <= 0.0) => Err(
                TopoError::InvalidArgument("tabulated lengths must be positive".into()),
            ),
            _ => Ok(()),
        }
    }

    /// Coedges whose discretization this law depends on
    pub fn references(&self) -> Vec<CoEdgeId> {
        match &self.law {
            EdgeLaw::Interpolated { reference } => vec![*reference],
            EdgeLaw::GlobalInterpolated { first, second } => {
                first.iter().chain(second.iter()).copied().collect()
            }
            _ => Vec::new(),
        }
    }

    /// Node parameters in [0, 1], one per node.
    ///
    /// Reference-bound laws need the parameters of their reference chain,
    /// resampled to the same number of nodes.
    pub fn parameters(&self, reference: Option<&[f64]>) -> TopoResult<Vec<f64>> {
        self.validate()?;
        let n = self.nb_edges as usize;
        let uniform = || (0..=n).map(|i| i as f64 / n as f64).collect::<Vec<f64>>();

        let params = match &self.law {
            EdgeLaw::Uniform | EdgeLaw::SpecificSize { .. } | EdgeLaw::PolarCut { .. } => {
                uniform()
            }
            EdgeLaw::Geometric { ratio } => {
                if (ratio - 1.0).abs() < PARAM_EPSILON {
                    uniform()
                } else {
                    let total = 1.0 - ratio.powi(n as i32);
                    (0..=n)
                        .map(|i| (1.0 - ratio.powi(i as i32)) / total)
                        .collect()
                }
            }
            EdgeLaw::BiGeometric { ratio1, ratio2 } => {
                let lengths: Vec<f64> = (0..n)
                    .map(|k| {
                        ratio1
                            .powi(k as i32)
                            .min(ratio2.powi((n - 1 - k) as i32))
                    })
                    .collect();
                cumulate(&lengths)
            }
            EdgeLaw::Hyperbolic { delta } => {
                if *delta <= PARAM_EPSILON {
                    uniform()
                } else {
                    (0..=n)
                        .map(|i| {
                            let eta = i as f64 / n as f64;
                            1.0 + (delta * (eta - 1.0)).tanh() / delta.tanh()
                        })
                        .collect()
                }
            }
            EdgeLaw::Tabulated { lengths } => cumulate(lengths),
            EdgeLaw::BetaTightening { beta } => {
                let q = (beta + 1.0) / (beta - 1.0);
                (0..=n)
                    .map(|i| {
                        let eta = i as f64 / n as f64;
                        let p = q.powf(1.0 - eta);
                        ((beta + 1.0) - (beta - 1.0) * p) / (p + 1.0)
                    })
                    .collect()
            }
            EdgeLaw::Interpolated { .. } | EdgeLaw::GlobalInterpolated { .. } => {
                match reference {
                    Some(reference) if reference.len() == n + 1 => reference.to_vec(),
                    Some(reference) => {
                        return Err(TopoError::InvalidArgument(format!(
                            "{} law needs {} reference nodes, got {}",
                            self.law.name(),
                            n + 1,
                            reference.len()
                        )));
                    }
                    None => {
                        return Err(TopoError::InvalidArgument(format!(
                            "{} law needs reference parameters",
                            self.law.name()
                        )));
                    }
                }
            }
        };

        if self.direct {
            Ok(params)
        } else {
            Ok(params.iter().rev().map(|t| 1.0 - t).collect())
        }
    }

    /// Node positions between two end points for the given parameters
    pub fn positions(&self, p0: DVec3, p1: DVec3, params: &[f64]) -> Vec<DVec3> {
        if let EdgeLaw::PolarCut { center } = &self.law {
            let a = p0 - *center;
            let b = p1 - *center;
            let (ra, rb) = (a.length(), b.length());
            if ra > PARAM_EPSILON && rb > PARAM_EPSILON {
                let (ua, ub) = (a / ra, b / rb);
                let theta = ua.angle_between(ub);
                if theta > PARAM_EPSILON {
                    let sin_theta = theta.sin();
                    return params
                        .iter()
                        .map(|t| {
                            let dir = ua * (((1.0 - t) * theta).sin() / sin_theta)
                                + ub * ((t * theta).sin() / sin_theta);
                            *center + dir * (ra + t * (rb - ra))
                        })
                        .collect();
                }
            }
        }
        params.iter().map(|t| p0.lerp(p1, *t)).collect()
    }

    /// Split into two discretizations, the first one holding `first` edges.
    ///
    /// Count-only laws keep their kind; laws bound to other coedges fall back
    /// to uniform.
    pub fn split(&self, first: u32) -> TopoResult<(EdgeMeshing, EdgeMeshing)> {
        if first == 0 || first >= self.nb_edges {
            return Err(TopoError::InvalidArgument(format!(
                "cannot split {} meshing edges after {}",
                self.nb_edges, first
            )));
        }
        let second = self.nb_edges - first;
        let (law1, law2) = match &self.law {
            EdgeLaw::Uniform => (EdgeLaw::Uniform, EdgeLaw::Uniform),
            EdgeLaw::SpecificSize { size } => (
                EdgeLaw::SpecificSize { size: *size },
                EdgeLaw::SpecificSize { size: *size },
            ),
            EdgeLaw::Geometric { ratio } => (
                EdgeLaw::Geometric { ratio: *ratio },
                EdgeLaw::Geometric { ratio: *ratio },
            ),
            EdgeLaw::BiGeometric { ratio1, ratio2 } => (
                EdgeLaw::Geometric { ratio: *ratio1 },
                EdgeLaw::Geometric {
                    ratio: 1.0 / *ratio2,
                },
            ),
            EdgeLaw::Tabulated { lengths } => {
                let (a, b) = if self.direct {
                    lengths.split_at(first as usize)
                } else {
                    lengths.split_at(second as usize)
                };
                let (a, b) = if self.direct { (a, b) } else { (b, a) };
                (
                    EdgeLaw::Tabulated { lengths: a.to_vec() },
                    EdgeLaw::Tabulated { lengths: b.to_vec() },
                )
            }
            EdgeLaw::PolarCut { center } => (
                EdgeLaw::PolarCut { center: *center },
                EdgeLaw::PolarCut { center: *center },
            ),
            EdgeLaw::Hyperbolic { .. }
            | EdgeLaw::BetaTightening { .. }
            | EdgeLaw::Interpolated { .. }
            | EdgeLaw::GlobalInterpolated { .. } => (EdgeLaw::Uniform, EdgeLaw::Uniform),
        };
        Ok((
            EdgeMeshing {
                nb_edges: first,
                law: law1,
                direct: self.direct,
            },
            EdgeMeshing {
                nb_edges: second,
                law: law2,
                direct: self.direct,
            },
        ))
    }

    /// Replayable script text creating this discretization
    pub fn script_command(&self) -> String {
        let body = match &self.law {
            EdgeLaw::Uniform => format!("EdgeMeshingPropertyUniform({})", self.nb_edges),
            EdgeLaw::Geometric { ratio } => {
                format!("EdgeMeshingPropertyGeometric({}, {})", self.nb_edges, ratio)
            }
            EdgeLaw::BiGeometric { ratio1, ratio2 } => format!(
                "EdgeMeshingPropertyBigeometric({}, {}, {})",
                self.nb_edges, ratio1, ratio2
            ),
            EdgeLaw::Hyperbolic { delta } => {
                format!("EdgeMeshingPropertyHyperbolic({}, {})", self.nb_edges, delta)
            }
            EdgeLaw::SpecificSize { size } => {
                format!("EdgeMeshingPropertySpecificSize({})", size)
            }
            EdgeLaw::Interpolated { reference } => format!(
                "EdgeMeshingPropertyInterpolate({}, \"{}\")",
                self.nb_edges, reference
            ),
            EdgeLaw::GlobalInterpolated { first, second } => format!(
                "EdgeMeshingPropertyGlobalInterpolate({}, [{}], [{}])",
                self.nb_edges,
                quoted(first),
                quoted(second)
            ),
            EdgeLaw::Tabulated { lengths } => format!(
                "EdgeMeshingPropertyTabulated([{}])",
                lengths
                    .iter()
                    .map(|l| l.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            EdgeLaw::BetaTightening { beta } => {
                format!("EdgeMeshingPropertyBeta({}, {})", self.nb_edges, beta)
            }
            EdgeLaw::PolarCut { center } => format!(
                "EdgeMeshingPropertyUniform({}, Point({}, {}, {}))",
                self.nb_edges, center.x, center.y, center.z
            ),
        };
        if self.direct {
            body
        } else {
            format!("{body}.reversed()")
        }
    }

    /// Properties for introspection
    pub fn describe(&self) -> Description {
        let mut desc = Description::section("Meshing");
        desc.push_leaf("Law", self.law.name());
        desc.push_leaf("Meshing edges", self.nb_edges);
        desc.push_leaf("Direct", self.direct);
        match &self.law {
            EdgeLaw::Geometric { ratio } => desc.push_leaf("Ratio", ratio),
            EdgeLaw::BiGeometric { ratio1, ratio2 } => {
                desc.push_leaf("Ratio at start", ratio1);
                desc.push_leaf("Ratio at end", ratio2);
            }
            EdgeLaw::Hyperbolic { delta } => desc.push_leaf("Delta", delta),
            EdgeLaw::SpecificSize { size } => desc.push_leaf("Size", size),
            EdgeLaw::Interpolated { reference } => desc.push_leaf("Reference", reference),
            EdgeLaw::GlobalInterpolated { first, second } => {
                desc.push_leaf("First references", quoted(first));
                desc.push_leaf("Second references", quoted(second));
            }
            EdgeLaw::Tabulated { lengths } => desc.push_leaf("Lengths", format!("{lengths:?}")),
            EdgeLaw::BetaTightening { beta } => desc.push_leaf("Beta", beta),
            EdgeLaw::PolarCut { center } => desc.push_leaf("Center", center),
            EdgeLaw::Uniform => {}
        }
        desc
    }
}

fn cumulate(lengths: &[f64]) -> Vec<f64> {
    let total: f64 = lengths.iter().sum();
    let mut params = Vec::with_capacity(lengths.len() + 1);
    let mut acc = 0.0;
    params.push(0.0);
    for l in lengths {
        acc += l;
        params.push(acc / total);
    }
    params
}

fn quoted(ids: &[CoEdgeId]) -> String {
    ids.iter()
        .map(|id| format!("\"{id}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============== CoFace laws ==============

/// How a coface is meshed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum FaceLaw {
    /// Transfinite interpolation of the boundary
    #[default]
    Transfinite,
    /// Sweep of one side along a direction
    Directional { dir: Dir },
    /// Directional with orthogonal layers at the start side
    Orthogonal { dir: Dir, layers: u32 },
    /// Rotation of one side around an axis
    Rotational { dir: Dir, axis: [DVec3; 2] },
    /// Unstructured triangles
    Delaunay,
    /// Unstructured quads by triangle pairing
    QuadPairing,
}

impl FaceLaw {
    pub fn is_structured(&self) -> bool {
        !matches!(self, FaceLaw::Delaunay | FaceLaw::QuadPairing)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FaceLaw::Transfinite => "transfinite",
            FaceLaw::Directional { .. } => "directional",
            FaceLaw::Orthogonal { .. } => "orthogonal",
            FaceLaw::Rotational { .. } => "rotational",
            FaceLaw::Delaunay => "delaunay",
            FaceLaw::QuadPairing => "quad pairing",
        }
    }

    /// Simplest law that stays adequate for a coface with `nb_edges` sides.
    ///
    /// Sweeping laws need four sides, degenerate cofaces go transfinite.
    pub fn select_basic(&self, nb_edges: usize) -> FaceLaw {
        match self {
            FaceLaw::Directional { .. } | FaceLaw::Orthogonal { .. } | FaceLaw::Rotational { .. }
                if nb_edges != 4 =>
            {
                FaceLaw::Transfinite
            }
            law => law.clone(),
        }
    }

    /// Rank used when two cofaces are fused: the higher one survives
    pub fn priority(&self) -> u8 {
        if self.is_structured() { 1 } else { 0 }
    }

    pub fn script_command(&self) -> String {
        match self {
            FaceLaw::Transfinite => "FaceMeshingPropertyTransfinite()".into(),
            FaceLaw::Directional { dir } => {
                format!("FaceMeshingPropertyDirectional(\"{}\")", dir.name())
            }
            FaceLaw::Orthogonal { dir, layers } => {
                format!("FaceMeshingPropertyOrthogonal(\"{}\", {})", dir.name(), layers)
            }
            FaceLaw::Rotational { dir, axis } => format!(
                "FaceMeshingPropertyRotational(\"{}\", Point({}, {}, {}), Point({}, {}, {}))",
                dir.name(),
                axis[0].x,
                axis[0].y,
                axis[0].z,
                axis[1].x,
                axis[1].y,
                axis[1].z
            ),
            FaceLaw::Delaunay => "FaceMeshingPropertyDelaunay()".into(),
            FaceLaw::QuadPairing => "FaceMeshingPropertyQuadPairing()".into(),
        }
    }

    pub fn describe(&self) -> Description {
        let mut desc = Description::section("Meshing");
        desc.push_leaf("Law", self.name());
        desc.push_leaf("Structured", self.is_structured());
        match self {
            FaceLaw::Directional { dir } => desc.push_leaf("Direction", dir.name()),
            FaceLaw::Orthogonal { dir, layers } => {
                desc.push_leaf("Direction", dir.name());
                desc.push_leaf("Layers", layers);
            }
            FaceLaw::Rotational { dir, axis } => {
                desc.push_leaf("Direction", dir.name());
                desc.push_leaf("Axis", format!("{} -> {}", axis[0], axis[1]));
            }
            _ => {}
        }
        desc
    }
}

// ============== Block laws ==============

/// How a block is meshed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum BlockLaw {
    #[default]
    Transfinite,
    Directional { dir: Dir3 },
    Orthogonal { dir: Dir3, layers: u32 },
    Rotational { dir: Dir3, axis: [DVec3; 2] },
    Delaunay,
}

impl BlockLaw {
    pub fn is_structured(&self) -> bool {
        !matches!(self, BlockLaw::Delaunay)
    }

    pub fn name(&self) -> &'static str {
        match self {
            BlockLaw::Transfinite => "transfinite",
            BlockLaw::Directional { .. } => "directional",
            BlockLaw::Orthogonal { .. } => "orthogonal",
            BlockLaw::Rotational { .. } => "rotational",
            BlockLaw::Delaunay => "delaunay",
        }
    }

    pub fn script_command(&self) -> String {
        match self {
            BlockLaw::Transfinite => "BlockMeshingPropertyTransfinite()".into(),
            BlockLaw::Directional { dir } => {
                format!("BlockMeshingPropertyDirectional(\"{}\")", dir.name())
            }
            BlockLaw::Orthogonal { dir, layers } => format!(
                "BlockMeshingPropertyOrthogonal(\"{}\", {})",
                dir.name(),
                layers
            ),
            BlockLaw::Rotational { dir, axis } => format!(
                "BlockMeshingPropertyRotational(\"{}\", Point({}, {}, {}), Point({}, {}, {}))",
                dir.name(),
                axis[0].x,
                axis[0].y,
                axis[0].z,
                axis[1].x,
                axis[1].y,
                axis[1].z
            ),
            BlockLaw::Delaunay => "BlockMeshingPropertyDelaunay()".into(),
        }
    }

    pub fn describe(&self) -> Description {
        let mut desc = Description::section("Meshing");
        desc.push_leaf("Law", self.name());
        desc.push_leaf("Structured", self.is_structured());
        match self {
            BlockLaw::Directional { dir } => desc.push_leaf("Direction", dir.name()),
            BlockLaw::Orthogonal { dir, layers } => {
                desc.push_leaf("Direction", dir.name());
                desc.push_leaf("Layers", layers);
            }
            BlockLaw::Rotational { dir, axis } => {
                desc.push_leaf("Direction", dir.name());
                desc.push_leaf("Axis", format!("{} -> {}", axis[0], axis[1]));
            }
            _ => {}
        }
        desc
    }
}
