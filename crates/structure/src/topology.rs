//! Structural topology: samples node grids from named regions and wires them
//! together with beams according to a connection plan.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::material::{MaterialKind, PartTag};

/// Beams shorter than this are never created; their strain would be undefined.
const MIN_BEAM_LENGTH: f32 = 1e-3;

/// Errors raised while turning a layout into a topology.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("region {part} has invalid bounds: min {min:?} max {max:?}")]
    InvalidRegion { part: PartTag, min: Vec3, max: Vec3 },
    #[error("connection strength must be positive and finite, got {0}")]
    InvalidStrength(f32),
    #[error("topology parameter {name} must be positive and finite, got {value}")]
    InvalidParameter { name: &'static str, value: f32 },
    #[error("beam {beam} joins nodes {node_a} and {node_b}, but the topology has {nodes} nodes")]
    DanglingBeam {
        beam: usize,
        node_a: usize,
        node_b: usize,
        nodes: usize,
    },
    #[error("beam {beam} has invalid rest length {rest_length}")]
    InvalidRestLength { beam: usize, rest_length: f32 },
    #[error("damage parameter {name} {reason}, got {value}")]
    InvalidDamage {
        name: &'static str,
        value: f32,
        reason: &'static str,
    },
}

/// An axis-aligned box sampled into a grid of nodes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub part: PartTag,
    pub material: MaterialKind,
    pub min: Vec3,
    pub max: Vec3,
}

/// One step of the connection plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConnectionSpec {
    /// Link every pair of nodes in `part` closer than the proximity radius.
    Intra {
        part: PartTag,
        material: MaterialKind,
        strength: f32,
    },
    /// Link each node of `from` to its nearest node in `to`.
    Connect {
        from: PartTag,
        to: PartTag,
        strength: f32,
    },
    /// Diagonal skip-connections for torsional rigidity.
    CrossBrace { part: PartTag, strength: f32 },
    /// A/B/C pillars from roof nodes down to the nearest frame node.
    Pillars { roof: PartTag, frame: PartTag },
}

/// Geometric and strength constants of the builder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyParams {
    pub proximity_radius: f32,
    /// Connector beams are only created below this distance.
    pub connector_reach: f32,
    pub cross_brace_min: f32,
    pub cross_brace_max: f32,
    pub cross_brace_factor: f32,
    pub pillar_front: f32,
    pub pillar_center: f32,
    pub pillar_rear: f32,
    /// Longitudinal offset separating front/center/rear pillar roof nodes.
    pub pillar_split: f32,
    pub node_mass_scale: f32,
    pub node_radius: f32,
}

impl Default for TopologyParams {
    fn default() -> Self {
        Self {
            proximity_radius: 0.8,
            connector_reach: 1.0,
            cross_brace_min: 0.5,
            cross_brace_max: 1.5,
            cross_brace_factor: 0.7,
            pillar_front: 2.0,
            pillar_center: 2.5,
            pillar_rear: 2.0,
            pillar_split: 0.5,
            node_mass_scale: 0.1,
            node_radius: 0.02,
        }
    }
}

/// Regions plus the ordered plan of connections between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyLayout {
    pub regions: Vec<RegionSpec>,
    pub connections: Vec<ConnectionSpec>,
    #[serde(default)]
    pub params: TopologyParams,
}

impl Default for BodyLayout {
    fn default() -> Self {
        Self::sedan()
    }
}

impl BodyLayout {
    /// Four-door sedan: crumple zones front and rear, a strong passenger cell.
    pub fn sedan() -> Self {
        use ConnectionSpec::*;
        use MaterialKind as M;
        use PartTag as P;

        let region = |part, material, min: [f32; 3], max: [f32; 3]| RegionSpec {
            part,
            material,
            min: Vec3::from_array(min),
            max: Vec3::from_array(max),
        };
        let regions = vec![
            region(P::FrontBumper, M::Bumper, [-0.9, -0.4, -2.1], [0.9, 0.4, -1.8]),
            region(P::FrontFrame, M::Frame, [-0.8, -0.2, -1.8], [0.8, 0.6, -1.2]),
            region(P::CabinFrame, M::Frame, [-0.9, -0.3, -1.2], [0.9, 1.0, 1.2]),
            region(P::Roof, M::Roof, [-0.7, 0.8, -0.8], [0.7, 1.2, 0.8]),
            region(P::DoorsLeft, M::Door, [-0.9, -0.2, -0.8], [-0.7, 0.8, 0.8]),
            region(P::DoorsRight, M::Door, [0.7, -0.2, -0.8], [0.9, 0.8, 0.8]),
            region(P::RearFrame, M::Frame, [-0.8, -0.2, 1.2], [0.8, 0.6, 1.8]),
            region(P::RearBumper, M::Bumper, [-0.9, -0.4, 1.8], [0.9, 0.4, 2.1]),
            region(P::EngineBay, M::Frame, [-0.6, 0.0, -1.5], [0.6, 0.5, -0.5]),
            region(P::Floor, M::Frame, [-0.8, -0.5, -1.0], [0.8, -0.2, 1.0]),
        ];

        let connections = vec![
            // Main frame
            Intra { part: P::CabinFrame, material: M::Frame, strength: 1.5 },
            Intra { part: P::EngineBay, material: M::Frame, strength: 1.2 },
            Intra { part: P::Floor, material: M::Frame, strength: 1.0 },
            CrossBrace { part: P::CabinFrame, strength: 2.0 },
            // Crumple zones
            Intra { part: P::FrontBumper, material: M::Bumper, strength: 0.4 },
            Intra { part: P::FrontFrame, material: M::Frame, strength: 0.8 },
            Intra { part: P::RearBumper, material: M::Bumper, strength: 0.4 },
            Intra { part: P::RearFrame, material: M::Frame, strength: 0.8 },
            Connect { from: P::FrontBumper, to: P::FrontFrame, strength: 0.6 },
            Connect { from: P::RearBumper, to: P::RearFrame, strength: 0.6 },
            // Safety cell
            Intra { part: P::DoorsLeft, material: M::Door, strength: 1.0 },
            Intra { part: P::DoorsRight, material: M::Door, strength: 1.0 },
            Intra { part: P::Roof, material: M::Roof, strength: 1.2 },
            Connect { from: P::Roof, to: P::CabinFrame, strength: 1.5 },
            Pillars { roof: P::Roof, frame: P::CabinFrame },
            // Panel mounts
            Connect { from: P::DoorsLeft, to: P::CabinFrame, strength: 0.3 },
            Connect { from: P::DoorsRight, to: P::CabinFrame, strength: 0.3 },
            Connect { from: P::Roof, to: P::DoorsLeft, strength: 0.4 },
            Connect { from: P::Roof, to: P::DoorsRight, strength: 0.4 },
        ];

        Self {
            regions,
            connections,
            params: TopologyParams::default(),
        }
    }
}

/// Which pillar a pillar beam belongs to, front to rear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PillarSegment {
    A,
    B,
    C,
}

/// How a beam came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeamKind {
    Intra,
    Connector,
    CrossBrace,
    Pillar(PillarSegment),
}

/// A node as produced by the builder, in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub part: PartTag,
    pub material: MaterialKind,
    pub position: Vec3,
    pub mass: f32,
}

/// A beam as produced by the builder. Node fields index into `Topology::nodes`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamSpec {
    pub node_a: usize,
    pub node_b: usize,
    pub kind: BeamKind,
    pub material: MaterialKind,
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
    pub break_threshold: f32,
}

/// Non-fatal problems found while building. The structure is degraded but usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TopologyWarning {
    EmptyConnection { from: PartTag, to: PartTag },
    EmptyPillars { roof: PartTag, frame: PartTag },
}

/// Immutable output of [`TopologyBuilder::build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// World position of the layout origin.
    pub origin: Vec3,
    pub nodes: Vec<NodeSpec>,
    pub beams: Vec<BeamSpec>,
    pub node_radius: f32,
    pub warnings: Vec<TopologyWarning>,
}

impl Topology {
    pub fn nodes_in(&self, part: PartTag) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.part == part)
            .map(|(i, _)| i)
    }

    pub fn beams_of_kind(&self, kind: BeamKind) -> usize {
        self.beams.iter().filter(|b| b.kind == kind).count()
    }
}

/// Turns a [`BodyLayout`] into a [`Topology`] placed at `origin`.
pub struct TopologyBuilder<'a> {
    layout: &'a BodyLayout,
    origin: Vec3,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(layout: &'a BodyLayout) -> Self {
        Self {
            layout,
            origin: Vec3::ZERO,
        }
    }

    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.origin = origin;
        self
    }

    pub fn build(&self) -> Result<Topology, BuildError> {
        self.validate()?;
        let params = self.layout.params;
        let mut topology = Topology {
            origin: self.origin,
            nodes: Vec::new(),
            beams: Vec::new(),
            node_radius: params.node_radius,
            warnings: Vec::new(),
        };

        for region in &self.layout.regions {
            self.sample_region(region, &mut topology);
        }
        for connection in &self.layout.connections {
            match *connection {
                ConnectionSpec::Intra {
                    part,
                    material,
                    strength,
                } => self.connect_within(&mut topology, part, material, strength),
                ConnectionSpec::Connect { from, to, strength } => {
                    self.connect_parts(&mut topology, from, to, strength)
                }
                ConnectionSpec::CrossBrace { part, strength } => {
                    self.cross_brace(&mut topology, part, strength)
                }
                ConnectionSpec::Pillars { roof, frame } => {
                    self.pillars(&mut topology, roof, frame)
                }
            }
        }

        tracing::info!(
            nodes = topology.nodes.len(),
            beams = topology.beams.len(),
            warnings = topology.warnings.len(),
            "topology built"
        );
        Ok(topology)
    }

    fn validate(&self) -> Result<(), BuildError> {
        let p = &self.layout.params;
        for (name, value) in [
            ("proximity_radius", p.proximity_radius),
            ("connector_reach", p.connector_reach),
            ("cross_brace_max", p.cross_brace_max),
            ("cross_brace_factor", p.cross_brace_factor),
            ("pillar_front", p.pillar_front),
            ("pillar_center", p.pillar_center),
            ("pillar_rear", p.pillar_rear),
            ("node_mass_scale", p.node_mass_scale),
            ("node_radius", p.node_radius),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(BuildError::InvalidParameter { name, value });
            }
        }
        for r in &self.layout.regions {
            let ordered = r.min.cmple(r.max).all();
            if !(ordered && r.min.is_finite() && r.max.is_finite()) {
                return Err(BuildError::InvalidRegion {
                    part: r.part,
                    min: r.min,
                    max: r.max,
                });
            }
        }
        for c in &self.layout.connections {
            let strength = match *c {
                ConnectionSpec::Intra { strength, .. }
                | ConnectionSpec::Connect { strength, .. }
                | ConnectionSpec::CrossBrace { strength, .. } => strength,
                ConnectionSpec::Pillars { .. } => 1.0,
            };
            if !(strength.is_finite() && strength > 0.0) {
                return Err(BuildError::InvalidStrength(strength));
            }
        }
        Ok(())
    }

    fn sample_region(&self, region: &RegionSpec, topology: &mut Topology) {
        let spacing = region.material.grid_spacing();
        let mass = region.material.profile().mass * self.layout.params.node_mass_scale;
        for x in axis_samples(region.min.x, region.max.x, spacing) {
            for y in axis_samples(region.min.y, region.max.y, spacing) {
                for z in axis_samples(region.min.z, region.max.z, spacing) {
                    topology.nodes.push(NodeSpec {
                        part: region.part,
                        material: region.material,
                        position: self.origin + Vec3::new(x, y, z),
                        mass,
                    });
                }
            }
        }
    }

    fn connect_within(
        &self,
        topology: &mut Topology,
        part: PartTag,
        material: MaterialKind,
        strength: f32,
    ) {
        let radius = self.layout.params.proximity_radius;
        let members: Vec<usize> = topology.nodes_in(part).collect();
        for (i, &a) in members.iter().enumerate() {
            for &b in &members[i + 1..] {
                let d = topology.nodes[a].position.distance(topology.nodes[b].position);
                if d < radius {
                    push_beam(topology, a, b, BeamKind::Intra, material, strength);
                }
            }
        }
    }

    fn connect_parts(&self, topology: &mut Topology, from: PartTag, to: PartTag, strength: f32) {
        let sources: Vec<usize> = topology.nodes_in(from).collect();
        let targets: Vec<usize> = topology.nodes_in(to).collect();
        if sources.is_empty() || targets.is_empty() {
            tracing::warn!(%from, %to, "cannot connect parts: one or both parts have no nodes");
            topology
                .warnings
                .push(TopologyWarning::EmptyConnection { from, to });
            return;
        }
        let reach = self.layout.params.connector_reach;
        for a in sources {
            if let Some((b, d)) = nearest(topology, a, &targets) {
                if d < reach {
                    push_beam(
                        topology,
                        a,
                        b,
                        BeamKind::Connector,
                        MaterialKind::Frame,
                        strength,
                    );
                }
            }
        }
    }

    fn cross_brace(&self, topology: &mut Topology, part: PartTag, strength: f32) {
        let p = self.layout.params;
        let members: Vec<usize> = topology.nodes_in(part).collect();
        let len = members.len();
        for i in (0..len.saturating_sub(2)).step_by(2) {
            for j in (i + 2..(i + 6).min(len)).step_by(2) {
                let (a, b) = (members[i], members[j]);
                let d = topology.nodes[a].position.distance(topology.nodes[b].position);
                if d > p.cross_brace_min && d < p.cross_brace_max {
                    push_beam(
                        topology,
                        a,
                        b,
                        BeamKind::CrossBrace,
                        MaterialKind::Frame,
                        strength * p.cross_brace_factor,
                    );
                }
            }
        }
    }

    fn pillars(&self, topology: &mut Topology, roof: PartTag, frame: PartTag) {
        let p = self.layout.params;
        let roof_nodes: Vec<usize> = topology.nodes_in(roof).collect();
        let frame_nodes: Vec<usize> = topology.nodes_in(frame).collect();
        if roof_nodes.is_empty() || frame_nodes.is_empty() {
            tracing::warn!(%roof, %frame, "cannot create pillars: missing roof or frame nodes");
            topology
                .warnings
                .push(TopologyWarning::EmptyPillars { roof, frame });
            return;
        }
        // Front to rear, matching the A/B/C order.
        let segments = [
            (PillarSegment::A, p.pillar_front),
            (PillarSegment::B, p.pillar_center),
            (PillarSegment::C, p.pillar_rear),
        ];
        for (segment, multiplier) in segments {
            for &r in &roof_nodes {
                let z = topology.nodes[r].position.z - self.origin.z;
                let in_segment = match segment {
                    PillarSegment::A => z < -p.pillar_split,
                    PillarSegment::B => z.abs() < p.pillar_split,
                    PillarSegment::C => z > p.pillar_split,
                };
                if !in_segment {
                    continue;
                }
                if let Some((f, _)) = nearest(topology, r, &frame_nodes) {
                    push_beam(
                        topology,
                        r,
                        f,
                        BeamKind::Pillar(segment),
                        MaterialKind::Frame,
                        multiplier,
                    );
                }
            }
        }
    }
}

/// Evenly spaced samples from `min` up to and including `max` when it lands on the grid.
fn axis_samples(min: f32, max: f32, spacing: f32) -> impl Iterator<Item = f32> {
    let count = ((max - min) / spacing + 1e-4).floor() as usize + 1;
    (0..count).map(move |i| min + i as f32 * spacing)
}

/// Nearest candidate to `node`, skipping coincident nodes. Earlier candidates win ties.
fn nearest(topology: &Topology, node: usize, candidates: &[usize]) -> Option<(usize, f32)> {
    let origin = topology.nodes[node].position;
    let mut best: Option<(usize, f32)> = None;
    for &c in candidates {
        if c == node {
            continue;
        }
        let d = origin.distance(topology.nodes[c].position);
        if d < MIN_BEAM_LENGTH {
            continue;
        }
        if best.is_none_or(|(_, bd)| d < bd) {
            best = Some((c, d));
        }
    }
    best
}

fn push_beam(
    topology: &mut Topology,
    a: usize,
    b: usize,
    kind: BeamKind,
    material: MaterialKind,
    strength: f32,
) {
    let rest_length = topology.nodes[a].position.distance(topology.nodes[b].position);
    if rest_length < MIN_BEAM_LENGTH {
        return;
    }
    let profile = material.profile();
    topology.beams.push(BeamSpec {
        node_a: a,
        node_b: b,
        kind,
        material,
        rest_length,
        stiffness: profile.stiffness * strength,
        damping: profile.damping * strength,
        break_threshold: profile.break_threshold * strength,
    });
}
