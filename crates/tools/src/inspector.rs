use std::collections::BTreeMap;
use std::fmt;

use beamdrive_structure::{BeamKind, DeformableStructure, PartTag, Topology};
use beamdrive_vehicle::VehicleController;
use serde::Serialize;

/// Read-only queries against a structure for debugging and reports.
pub struct StructureInspector;

impl StructureInspector {
    pub fn topology_summary(topology: &Topology) -> TopologySummary {
        let mut nodes_per_part = BTreeMap::new();
        for node in &topology.nodes {
            *nodes_per_part.entry(node.part).or_insert(0) += 1;
        }
        let pillars = topology
            .beams
            .iter()
            .filter(|b| matches!(b.kind, BeamKind::Pillar(_)))
            .count();
        TopologySummary {
            nodes: topology.nodes.len(),
            beams: topology.beams.len(),
            intra: topology.beams_of_kind(BeamKind::Intra),
            connectors: topology.beams_of_kind(BeamKind::Connector),
            cross_braces: topology.beams_of_kind(BeamKind::CrossBrace),
            pillars,
            warnings: topology.warnings.len(),
            nodes_per_part,
        }
    }

    pub fn damage_report(structure: &DeformableStructure) -> DamageReport {
        DamageReport {
            broken_beams: structure.broken_beam_count(),
            total_beams: structure.beams().len(),
            total_stress: structure.total_stress(),
            damage_score: structure.damage_score(),
            max_deformation: structure.max_deformation(),
            part_health: structure.part_health_map().clone(),
        }
    }

    /// Intact beams ordered by how close they are to breaking, worst first.
    pub fn worst_beams(structure: &DeformableStructure, limit: usize) -> Vec<BeamInfo> {
        let nodes = structure.nodes();
        let mut beams: Vec<BeamInfo> = structure
            .beams()
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.broken)
            .map(|(index, b)| BeamInfo {
                index,
                parts: (nodes[b.node_a].part, nodes[b.node_b].part),
                kind: b.kind,
                stress: b.stress,
                load: if b.break_threshold > 0.0 {
                    b.stress / b.break_threshold
                } else {
                    0.0
                },
                health: b.health,
            })
            .collect();
        beams.sort_by(|a, b| b.load.total_cmp(&a.load).then(a.index.cmp(&b.index)));
        beams.truncate(limit);
        beams
    }
}

/// Read-only queries against a vehicle.
pub struct VehicleInspector;

impl VehicleInspector {
    pub fn summary(vehicle: &VehicleController) -> VehicleSummary {
        let t = vehicle.telemetry();
        VehicleSummary {
            tick: t.tick,
            speed_kmh: t.speed_kmh(),
            rpm: t.rpm,
            gear: t.gear_label.clone(),
            damage: t.damage_percentage,
            broken_beams: t.broken_beams,
            nodes: vehicle.structure().nodes().len(),
            beams: vehicle.structure().beams().len(),
            hottest_tire: t.tire_temperatures.iter().copied().fold(f32::MIN, f32::max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopologySummary {
    pub nodes: usize,
    pub beams: usize,
    pub intra: usize,
    pub connectors: usize,
    pub cross_braces: usize,
    pub pillars: usize,
    pub warnings: usize,
    pub nodes_per_part: BTreeMap<PartTag, usize>,
}

impl fmt::Display for TopologySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Topology: nodes={} beams={} (intra={} connectors={} cross_braces={} pillars={}) warnings={}",
            self.nodes,
            self.beams,
            self.intra,
            self.connectors,
            self.cross_braces,
            self.pillars,
            self.warnings
        )?;
        for (part, count) in &self.nodes_per_part {
            writeln!(f, "  {part:<14} {count:>4} nodes")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DamageReport {
    pub broken_beams: usize,
    pub total_beams: usize,
    pub total_stress: f32,
    pub damage_score: f32,
    pub max_deformation: f32,
    pub part_health: BTreeMap<PartTag, f32>,
}

impl fmt::Display for DamageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Damage: score={:.1} broken={}/{} stress={:.0} max_deformation={:.3}m",
            self.damage_score,
            self.broken_beams,
            self.total_beams,
            self.total_stress,
            self.max_deformation
        )?;
        for (part, health) in &self.part_health {
            writeln!(f, "  {part:<14} {:>5.1}%", health * 100.0)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BeamInfo {
    pub index: usize,
    pub parts: (PartTag, PartTag),
    pub kind: BeamKind,
    pub stress: f32,
    /// Stress as a fraction of the break threshold.
    pub load: f32,
    pub health: f32,
}

impl fmt::Display for BeamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Beam #{} {}-{} {:?} stress={:.0} load={:.0}% health={:.2}",
            self.index,
            self.parts.0,
            self.parts.1,
            self.kind,
            self.stress,
            self.load * 100.0,
            self.health
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleSummary {
    pub tick: u64,
    pub speed_kmh: f32,
    pub rpm: f32,
    pub gear: String,
    pub damage: f32,
    pub broken_beams: usize,
    pub nodes: usize,
    pub beams: usize,
    pub hottest_tire: f32,
}

impl fmt::Display for VehicleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Vehicle: tick={} speed={:.1}km/h rpm={:.0} gear={} damage={:.1}% broken={} structure={}n/{}b tire_max={:.1}C",
            self.tick,
            self.speed_kmh,
            self.rpm,
            self.gear,
            self.damage,
            self.broken_beams,
            self.nodes,
            self.beams,
            self.hottest_tire
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beamdrive_physics::PointMassWorld;
    use beamdrive_structure::{BodyLayout, DamageConfig, TopologyBuilder};
    use beamdrive_vehicle::VehicleConfig;
    use glam::Vec3;

    fn sedan() -> (PointMassWorld, DeformableStructure) {
        let mut world = PointMassWorld::new();
        let s = DeformableStructure::build(
            &mut world,
            &BodyLayout::sedan(),
            Vec3::new(0.0, 2.0, 0.0),
            DamageConfig::default(),
        )
        .unwrap();
        (world, s)
    }

    #[test]
    fn topology_summary_counts_add_up() {
        let topology = TopologyBuilder::new(&BodyLayout::sedan()).build().unwrap();
        let summary = StructureInspector::topology_summary(&topology);
        assert_eq!(summary.nodes, topology.nodes.len());
        assert_eq!(
            summary.intra + summary.connectors + summary.cross_braces + summary.pillars,
            summary.beams
        );
        assert_eq!(summary.nodes_per_part.values().sum::<usize>(), summary.nodes);
        assert_eq!(summary.nodes_per_part.len(), PartTag::ALL.len());
        assert!(summary.pillars > 0);
        assert!(format!("{summary}").contains("Topology: nodes="));
    }

    #[test]
    fn damage_report_reflects_breaks() {
        let (mut world, mut s) = sedan();
        let pristine = StructureInspector::damage_report(&s);
        assert_eq!(pristine.broken_beams, 0);
        assert!(pristine.part_health.values().all(|h| *h == 1.0));

        assert!(s.break_beam(&mut world, 0));
        let report = StructureInspector::damage_report(&s);
        assert_eq!(report.broken_beams, 1);
        assert_eq!(report.total_beams, s.beams().len());
        assert!(format!("{report}").contains("broken=1/"));
    }

    #[test]
    fn worst_beams_skips_broken_and_respects_limit() {
        let (mut world, mut s) = sedan();
        s.break_beam(&mut world, 3);
        let worst = StructureInspector::worst_beams(&s, 5);
        assert_eq!(worst.len(), 5);
        assert!(worst.iter().all(|b| b.index != 3));
        assert!(worst.windows(2).all(|w| w[0].load >= w[1].load));
        assert!(StructureInspector::worst_beams(&s, 0).is_empty());
    }

    #[test]
    fn vehicle_summary_display() {
        let mut world = PointMassWorld::new();
        let vehicle =
            VehicleController::spawn(&mut world, VehicleConfig::default(), Vec3::new(0.0, 1.4, 0.0))
                .unwrap();
        let summary = VehicleInspector::summary(&vehicle);
        assert_eq!(summary.tick, 0);
        assert_eq!(summary.gear, "1");
        assert_eq!(summary.nodes, vehicle.structure().nodes().len());
        let s = format!("{summary}");
        assert!(s.contains("gear=1"));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["broken_beams"], 0);
    }
}
