use std::collections::BTreeMap;

use beamdrive_common::{BodyHandle, ConstraintHandle, Transform};
use beamdrive_physics::{BodyDesc, DistanceConstraint, RigidBodyEngine};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::material::{MaterialKind, PartTag};
use crate::topology::{BeamKind, BodyLayout, BuildError, Topology, TopologyBuilder};

/// Damage and fatigue tunables.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageConfig {
    /// Fraction of the break threshold above which a beam weakens every update.
    pub weaken_ratio: f32,
    pub weaken_step: f32,
    /// Fraction of the break threshold above which fatigue accumulates.
    pub fatigue_ratio: f32,
    /// Health lost per unit stress per second while fatigued.
    pub fatigue_rate: f32,
    /// Flat health penalty applied to beams sharing an endpoint with a broken beam.
    pub redistribution_penalty: f32,
    /// Beams below this health start to loosen.
    pub loosen_below: f32,
    pub loosen_factor: f32,
    /// Constraint distance never loosens past `rest_length * max_loosening`.
    pub max_loosening: f32,
    pub stress_normalizer: f32,
    pub max_damage_score: f32,
    /// A node above this health counts as intact for part health.
    pub intact_node_health: f32,
    /// Radius of impulses applied by [`DeformableStructure::apply_damage`].
    pub impact_radius: f32,
    pub min_impact_falloff: f32,
    /// Health a beam loses per unit impact magnitude, relative to its break
    /// threshold. Zero makes impacts push nodes without wearing beams.
    pub impact_damage: f32,
}

impl Default for DamageConfig {
    fn default() -> Self {
        Self {
            weaken_ratio: 0.7,
            weaken_step: 0.001,
            fatigue_ratio: 0.5,
            fatigue_rate: 1e-6,
            redistribution_penalty: 0.1,
            loosen_below: 0.5,
            loosen_factor: 1.01,
            max_loosening: 1.25,
            stress_normalizer: 10_000.0,
            max_damage_score: 100.0,
            intact_node_health: 0.5,
            impact_radius: 0.6,
            min_impact_falloff: 0.25,
            impact_damage: 100.0,
        }
    }
}

impl DamageConfig {
    /// Reject values that would let health grow, divide by zero or shrink beams.
    pub fn validate(&self) -> Result<(), BuildError> {
        let checks: [(&'static str, f32, bool, &'static str); 11] = [
            ("weaken_ratio", self.weaken_ratio, self.weaken_ratio >= 0.0, "must not be negative"),
            ("weaken_step", self.weaken_step, self.weaken_step >= 0.0, "must not be negative"),
            ("fatigue_ratio", self.fatigue_ratio, self.fatigue_ratio >= 0.0, "must not be negative"),
            ("fatigue_rate", self.fatigue_rate, self.fatigue_rate >= 0.0, "must not be negative"),
            (
                "redistribution_penalty",
                self.redistribution_penalty,
                self.redistribution_penalty >= 0.0,
                "must not be negative",
            ),
            ("loosen_factor", self.loosen_factor, self.loosen_factor >= 1.0, "must be at least 1"),
            ("max_loosening", self.max_loosening, self.max_loosening >= 1.0, "must be at least 1"),
            (
                "stress_normalizer",
                self.stress_normalizer,
                self.stress_normalizer > 0.0,
                "must be positive",
            ),
            ("impact_radius", self.impact_radius, self.impact_radius > 0.0, "must be positive"),
            (
                "min_impact_falloff",
                self.min_impact_falloff,
                (0.0..=1.0).contains(&self.min_impact_falloff),
                "must lie in [0, 1]",
            ),
            ("impact_damage", self.impact_damage, self.impact_damage >= 0.0, "must not be negative"),
        ];
        for (name, value, ok, reason) in checks {
            if !(value.is_finite() && ok) {
                return Err(BuildError::InvalidDamage { name, value, reason });
            }
        }
        Ok(())
    }
}

/// A point mass of the structure, backed by an engine body.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub body: BodyHandle,
    pub original_position: Vec3,
    /// Position relative to the layout origin.
    pub local_position: Vec3,
    pub part: PartTag,
    pub material: MaterialKind,
    /// Indices of incident beams.
    pub beams: Vec<usize>,
    pub health: f32,
    pub broken: bool,
    pub deformation: f32,
    pub max_deformation: f32,
}

/// A spring-like link between two nodes, backed by an engine constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct Beam {
    pub node_a: usize,
    pub node_b: usize,
    pub kind: BeamKind,
    pub rest_length: f32,
    pub stiffness: f32,
    pub damping: f32,
    pub break_threshold: f32,
    pub stress: f32,
    pub health: f32,
    pub broken: bool,
    pub constraint: ConstraintHandle,
    /// Target distance currently pushed to the engine; grows while loosening.
    pub constraint_distance: f32,
}

/// Emitted when a beam fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StructureEvent {
    BeamBroken {
        beam: usize,
        midpoint: Vec3,
        parts: (PartTag, PartTag),
    },
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub position: Vec3,
    pub velocity: Vec3,
    pub health: f32,
    pub broken: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeamSnapshot {
    pub stress: f32,
    pub health: f32,
    pub broken: bool,
    pub constraint_active: bool,
    pub constraint_distance: f32,
}

/// Value snapshot of the whole structure, for comparison and export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureSnapshot {
    pub nodes: Vec<NodeSnapshot>,
    pub beams: Vec<BeamSnapshot>,
    pub total_stress: f32,
    pub broken_beams: usize,
    pub damage_score: f32,
}

/// Arena of nodes and beams evolving under load.
///
/// Owns its node and beam records. Bodies and constraints live in the engine
/// and are referenced by handle only.
#[derive(Debug, Clone)]
pub struct DeformableStructure {
    config: DamageConfig,
    topology: Topology,
    /// Frame carrying the layout. `None` pins rest positions to the build site.
    frame: Option<Transform>,
    nodes: Vec<Node>,
    beams: Vec<Beam>,
    part_health: BTreeMap<PartTag, f32>,
    total_stress: f32,
    damage_score: f32,
    broken_beams: usize,
    events: Vec<StructureEvent>,
}

impl DeformableStructure {
    /// Build the topology for `layout` at `origin` and instantiate it in `engine`.
    pub fn build<E: RigidBodyEngine + ?Sized>(
        engine: &mut E,
        layout: &BodyLayout,
        origin: Vec3,
        config: DamageConfig,
    ) -> Result<Self, BuildError> {
        let topology = TopologyBuilder::new(layout).with_origin(origin).build()?;
        Self::instantiate(engine, topology, config)
    }

    /// Create one body per node and one constraint per beam.
    ///
    /// The topology and config are checked before anything is added to
    /// `engine`, so a rejected topology leaves the engine untouched.
    pub fn instantiate<E: RigidBodyEngine + ?Sized>(
        engine: &mut E,
        topology: Topology,
        config: DamageConfig,
    ) -> Result<Self, BuildError> {
        let _span = tracing::info_span!("structure_instantiate").entered();
        config.validate()?;
        check_beams(&topology)?;
        let mut nodes: Vec<Node> = topology
            .nodes
            .iter()
            .map(|spec| Node {
                body: engine.add_body(BodyDesc::sphere(
                    spec.position,
                    spec.mass,
                    topology.node_radius,
                )),
                original_position: spec.position,
                local_position: spec.position - topology.origin,
                part: spec.part,
                material: spec.material,
                beams: Vec::new(),
                health: 1.0,
                broken: false,
                deformation: 0.0,
                max_deformation: 0.0,
            })
            .collect();

        let mut beams = Vec::with_capacity(topology.beams.len());
        for (index, spec) in topology.beams.iter().enumerate() {
            let constraint = engine.create_constraint(DistanceConstraint {
                body_a: nodes[spec.node_a].body,
                body_b: nodes[spec.node_b].body,
                distance: spec.rest_length,
                max_force: spec.stiffness,
            });
            nodes[spec.node_a].beams.push(index);
            nodes[spec.node_b].beams.push(index);
            beams.push(Beam {
                node_a: spec.node_a,
                node_b: spec.node_b,
                kind: spec.kind,
                rest_length: spec.rest_length,
                stiffness: spec.stiffness,
                damping: spec.damping,
                break_threshold: spec.break_threshold,
                stress: 0.0,
                health: 1.0,
                broken: false,
                constraint,
                constraint_distance: spec.rest_length,
            });
        }

        let part_health = nodes.iter().map(|n| (n.part, 1.0)).collect();
        tracing::info!(
            nodes = nodes.len(),
            beams = beams.len(),
            "deformable structure created"
        );
        Ok(Self {
            config,
            topology,
            frame: None,
            nodes,
            beams,
            part_health,
            total_stress: 0.0,
            damage_score: 0.0,
            broken_beams: 0,
            events: Vec::new(),
        })
    }

    /// One structural tick: stress analysis, progressive damage, breaks,
    /// then node and part health.
    pub fn update<E: RigidBodyEngine + ?Sized>(&mut self, engine: &mut E, dt: f32) {
        let _span = tracing::info_span!("structure_update").entered();
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.analyze_stress(engine);
        self.apply_progressive_damage(engine, dt);
        self.process_breaks(engine);
        self.update_nodes(engine);
        self.update_part_health();
        tracing::trace!(
            total_stress = self.total_stress,
            damage = self.damage_score,
            broken = self.broken_beams,
            "structure updated"
        );
    }

    fn analyze_stress<E: RigidBodyEngine + ?Sized>(&mut self, engine: &E) {
        let mut total = 0.0;
        for beam in &mut self.beams {
            if beam.broken {
                continue;
            }
            let a = engine.body_position(self.nodes[beam.node_a].body);
            let b = engine.body_position(self.nodes[beam.node_b].body);
            if let (Some(a), Some(b)) = (a, b) {
                let strain = (a.distance(b) - beam.rest_length).abs() / beam.rest_length;
                let stress = strain * beam.stiffness;
                beam.stress = if stress.is_finite() { stress.max(0.0) } else { 0.0 };
            }
            total += beam.stress;
        }
        self.total_stress = total;
        self.damage_score = if self.beams.is_empty() {
            0.0
        } else {
            (total / (self.beams.len() as f32 * self.config.stress_normalizer))
                .min(self.config.max_damage_score)
        };
    }

    fn apply_progressive_damage<E: RigidBodyEngine + ?Sized>(&mut self, engine: &mut E, dt: f32) {
        let c = self.config;
        for beam in &mut self.beams {
            if beam.broken {
                continue;
            }
            if beam.stress > beam.break_threshold * c.weaken_ratio {
                beam.health -= c.weaken_step;
            }
            if beam.stress > beam.break_threshold * c.fatigue_ratio {
                beam.health -= beam.stress * c.fatigue_rate * dt;
            }
            beam.health = beam.health.clamp(0.0, 1.0);

            if beam.health < c.loosen_below {
                let loosened =
                    (beam.constraint_distance * c.loosen_factor).min(beam.rest_length * c.max_loosening);
                if loosened > beam.constraint_distance {
                    beam.constraint_distance = loosened;
                    engine.set_constraint_distance(beam.constraint, loosened);
                }
            }
        }
    }

    fn process_breaks<E: RigidBodyEngine + ?Sized>(&mut self, engine: &mut E) {
        // Redistribution can push neighbours to zero; keep sweeping until stable.
        loop {
            let pending: Vec<usize> = self
                .beams
                .iter()
                .enumerate()
                .filter(|(_, b)| !b.broken && b.health <= 0.0)
                .map(|(i, _)| i)
                .collect();
            if pending.is_empty() {
                break;
            }
            for index in pending {
                self.break_beam(engine, index);
            }
        }
    }

    /// Break a beam: detach its constraint and penalise its neighbours.
    /// Returns `false` if the beam was already broken or does not exist.
    pub fn break_beam<E: RigidBodyEngine + ?Sized>(&mut self, engine: &mut E, index: usize) -> bool {
        let Some(beam) = self.beams.get_mut(index) else {
            return false;
        };
        if beam.broken {
            return false;
        }
        beam.broken = true;
        beam.health = 0.0;
        beam.stress = 0.0;
        let (a, b, constraint) = (beam.node_a, beam.node_b, beam.constraint);
        engine.remove_constraint(constraint);
        self.broken_beams += 1;

        let pa = engine
            .body_position(self.nodes[a].body)
            .unwrap_or(self.nodes[a].original_position);
        let pb = engine
            .body_position(self.nodes[b].body)
            .unwrap_or(self.nodes[b].original_position);
        let parts = (self.nodes[a].part, self.nodes[b].part);
        tracing::debug!(beam = index, a = %parts.0, b = %parts.1, "beam broken");
        self.events.push(StructureEvent::BeamBroken {
            beam: index,
            midpoint: pa.lerp(pb, 0.5),
            parts,
        });

        self.redistribute(index, a);
        self.redistribute(index, b);
        true
    }

    fn redistribute(&mut self, broken: usize, node: usize) {
        let penalty = self.config.redistribution_penalty;
        for &i in &self.nodes[node].beams {
            if i == broken {
                continue;
            }
            let beam = &mut self.beams[i];
            if !beam.broken {
                beam.health = (beam.health - penalty).clamp(0.0, 1.0);
            }
        }
    }

    fn update_nodes<E: RigidBodyEngine + ?Sized>(&mut self, engine: &E) {
        let frame = self.frame;
        for node in &mut self.nodes {
            if let Some(p) = engine.body_position(node.body) {
                node.deformation = p.distance(rest_position(frame, node));
                node.max_deformation = node.max_deformation.max(node.deformation);
            }
            if node.beams.is_empty() {
                continue;
            }
            let mut sum = 0.0;
            let mut all_broken = true;
            for &i in &node.beams {
                let beam = &self.beams[i];
                if !beam.broken {
                    sum += beam.health;
                    all_broken = false;
                }
            }
            node.health = (sum / node.beams.len() as f32).clamp(0.0, 1.0);
            node.broken = all_broken;
        }
    }

    fn update_part_health(&mut self) {
        let threshold = self.config.intact_node_health;
        let mut counts: BTreeMap<PartTag, (usize, usize)> = BTreeMap::new();
        for node in &self.nodes {
            let entry = counts.entry(node.part).or_default();
            entry.1 += 1;
            if node.health > threshold {
                entry.0 += 1;
            }
        }
        for (part, (intact, total)) in counts {
            self.part_health.insert(part, intact as f32 / total as f32);
        }
    }

    /// Strike the structure at `point`.
    ///
    /// Nodes within the impact radius are pushed outward with a linearly
    /// attenuated impulse; with none in range the nearest node takes it all.
    /// Every intact beam touching a hit node loses health in proportion to the
    /// impact and inversely to its break threshold, and beams driven to zero
    /// break immediately. Returns how many nodes were hit.
    pub fn apply_damage<E: RigidBodyEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        point: Vec3,
        magnitude: f32,
    ) -> usize {
        if !magnitude.is_finite() || magnitude <= 0.0 || !point.is_finite() {
            return 0;
        }
        let radius = self.config.impact_radius;
        let positions: Vec<(usize, Vec3)> = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| engine.body_position(n.body).map(|p| (i, p)))
            .collect();

        let mut hits: Vec<(usize, Vec3, f32)> = positions
            .iter()
            .filter_map(|&(node, p)| {
                let d = p.distance(point);
                (d <= radius).then(|| {
                    let falloff = (1.0 - d / radius).max(self.config.min_impact_falloff);
                    (node, p, falloff)
                })
            })
            .collect();
        if hits.is_empty() {
            let nearest = positions.iter().min_by(|x, y| {
                x.1.distance_squared(point)
                    .total_cmp(&y.1.distance_squared(point))
            });
            if let Some(&(node, p)) = nearest {
                hits.push((node, p, 1.0));
            }
        }

        // A beam with both ends hit takes the stronger of the two.
        let mut beam_falloff: BTreeMap<usize, f32> = BTreeMap::new();
        for &(node, p, falloff) in &hits {
            let direction = (p - point).try_normalize().unwrap_or(Vec3::NEG_Y);
            engine.apply_impulse(self.nodes[node].body, direction * magnitude * falloff);
            for &beam in &self.nodes[node].beams {
                let entry = beam_falloff.entry(beam).or_insert(0.0);
                *entry = entry.max(falloff);
            }
        }

        let impact = magnitude * self.config.impact_damage;
        for (index, falloff) in beam_falloff {
            let beam = &mut self.beams[index];
            if beam.broken {
                continue;
            }
            let loss = impact * falloff / beam.break_threshold;
            if loss.is_finite() {
                beam.health = (beam.health - loss).clamp(0.0, 1.0);
            }
        }
        let broken_before = self.broken_beams;
        self.process_breaks(engine);
        tracing::debug!(
            magnitude,
            nodes = hits.len(),
            broken = self.broken_beams - broken_before,
            "impact applied to structure"
        );
        hits.len()
    }

    /// Move the frame that carries the layout, e.g. to follow a chassis.
    pub fn set_frame(&mut self, frame: Transform) {
        self.frame = Some(frame);
    }

    /// The frame set by [`Self::set_frame`] or [`Self::follow_frame`], if any.
    pub fn frame(&self) -> Option<Transform> {
        self.frame
    }

    /// Set the frame and drag every node of the `mounts` parts rigidly with it.
    /// Returns the number of nodes moved.
    pub fn follow_frame<E: RigidBodyEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        frame: Transform,
        linear_velocity: Vec3,
        angular_velocity: Vec3,
        mounts: &[PartTag],
    ) -> usize {
        self.frame = Some(frame);
        let mut moved = 0;
        for node in self.nodes.iter().filter(|n| mounts.contains(&n.part)) {
            let p = frame.transform_point(node.local_position);
            let v = linear_velocity + angular_velocity.cross(p - frame.position);
            if engine.set_body_position(node.body, p) {
                engine.set_body_velocity(node.body, v);
                moved += 1;
            }
        }
        moved
    }

    /// Undeformed position of a node under the current frame.
    pub fn rest_position_of(&self, node: usize) -> Option<Vec3> {
        self.nodes.get(node).map(|n| rest_position(self.frame, n))
    }

    /// Restore the pristine state: constraints re-attached at rest length, nodes
    /// at their rest positions with zero velocity, all health at 1.
    pub fn reset<E: RigidBodyEngine + ?Sized>(&mut self, engine: &mut E) {
        for beam in &mut self.beams {
            if beam.broken {
                engine.add_constraint(beam.constraint);
            }
            if beam.constraint_distance != beam.rest_length {
                engine.set_constraint_distance(beam.constraint, beam.rest_length);
            }
            beam.constraint_distance = beam.rest_length;
            beam.broken = false;
            beam.health = 1.0;
            beam.stress = 0.0;
        }
        let frame = self.frame;
        for node in &mut self.nodes {
            engine.set_body_position(node.body, rest_position(frame, node));
            engine.set_body_velocity(node.body, Vec3::ZERO);
            engine.set_body_angular_velocity(node.body, Vec3::ZERO);
            node.health = 1.0;
            node.broken = false;
            node.deformation = 0.0;
            node.max_deformation = 0.0;
        }
        for health in self.part_health.values_mut() {
            *health = 1.0;
        }
        self.total_stress = 0.0;
        self.damage_score = 0.0;
        self.broken_beams = 0;
        self.events.push(StructureEvent::Reset);
        tracing::info!("structure reset");
    }

    /// Release every constraint and body owned by this structure.
    pub fn destroy<E: RigidBodyEngine + ?Sized>(self, engine: &mut E) {
        for beam in &self.beams {
            engine.destroy_constraint(beam.constraint);
        }
        for node in &self.nodes {
            engine.remove_body(node.body);
        }
        tracing::info!(
            nodes = self.nodes.len(),
            beams = self.beams.len(),
            "deformable structure destroyed"
        );
    }

    /// Mean stress over all beams relative to `stress_normalizer`, capped at
    /// `max_damage_score`. Recomputed by [`Self::update`].
    pub fn damage_score(&self) -> f32 {
        self.damage_score
    }

    /// Sum of stress over intact beams at the last update.
    pub fn total_stress(&self) -> f32 {
        self.total_stress
    }

    /// Beams broken since build or the last reset.
    pub fn broken_beam_count(&self) -> usize {
        self.broken_beams
    }

    /// Fraction of intact nodes in `part`. Unknown parts report 1.
    pub fn part_health(&self, part: PartTag) -> f32 {
        self.part_health.get(&part).copied().unwrap_or(1.0)
    }

    /// Health of every part present in the topology.
    pub fn part_health_map(&self) -> &BTreeMap<PartTag, f32> {
        &self.part_health
    }

    /// Distance of `node` from its rest position at the last update.
    /// `None` for an out-of-range index.
    pub fn node_deformation(&self, node: usize) -> Option<f32> {
        self.nodes.get(node).map(|n| n.deformation)
    }

    /// Largest displacement any node has reached since the last reset.
    pub fn max_deformation(&self) -> f32 {
        self.nodes
            .iter()
            .map(|n| n.max_deformation)
            .fold(0.0, f32::max)
    }

    /// Node records, indexed as in the topology.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Beam records, indexed as in the topology.
    pub fn beams(&self) -> &[Beam] {
        &self.beams
    }

    /// The topology this structure was instantiated from.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &DamageConfig {
        &self.config
    }

    /// Events recorded since the last [`Self::drain_events`].
    pub fn events(&self) -> &[StructureEvent] {
        &self.events
    }

    /// Take every pending event, leaving the log empty.
    pub fn drain_events(&mut self) -> Vec<StructureEvent> {
        std::mem::take(&mut self.events)
    }

    /// Capture node and beam state for comparison or export. Nodes whose body
    /// is gone from `engine` report their build position and zero velocity.
    pub fn snapshot<E: RigidBodyEngine + ?Sized>(&self, engine: &E) -> StructureSnapshot {
        let nodes = self
            .nodes
            .iter()
            .map(|n| {
                let state = engine.body_state(n.body);
                NodeSnapshot {
                    position: state.map_or(n.original_position, |s| s.position),
                    velocity: state.map_or(Vec3::ZERO, |s| s.velocity),
                    health: n.health,
                    broken: n.broken,
                }
            })
            .collect();
        let beams = self
            .beams
            .iter()
            .map(|b| {
                let state = engine.constraint(b.constraint);
                BeamSnapshot {
                    stress: b.stress,
                    health: b.health,
                    broken: b.broken,
                    constraint_active: state.is_some_and(|s| s.active),
                    constraint_distance: state.map_or(b.constraint_distance, |s| s.constraint.distance),
                }
            })
            .collect();
        StructureSnapshot {
            nodes,
            beams,
            total_stress: self.total_stress,
            broken_beams: self.broken_beams,
            damage_score: self.damage_score,
        }
    }
}

fn check_beams(topology: &Topology) -> Result<(), BuildError> {
    let nodes = topology.nodes.len();
    for (beam, spec) in topology.beams.iter().enumerate() {
        if spec.node_a >= nodes || spec.node_b >= nodes {
            return Err(BuildError::DanglingBeam {
                beam,
                node_a: spec.node_a,
                node_b: spec.node_b,
                nodes,
            });
        }
        if !(spec.rest_length.is_finite() && spec.rest_length > 0.0) {
            return Err(BuildError::InvalidRestLength {
                beam,
                rest_length: spec.rest_length,
            });
        }
    }
    Ok(())
}

fn rest_position(frame: Option<Transform>, node: &Node) -> Vec3 {
    match frame {
        Some(f) => f.transform_point(node.local_position),
        None => node.original_position,
    }
}
