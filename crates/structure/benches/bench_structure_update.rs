use std::hint::black_box;
use std::time::Instant;

use beamdrive_physics::{PointMassWorld, RigidBodyEngine};
use beamdrive_structure::{BodyLayout, DamageConfig, DeformableStructure, TopologyBuilder};
use glam::Vec3;

const DT: f32 = 1.0 / 120.0;

fn bench_topology_build(iterations: usize) {
    let layout = BodyLayout::sedan();
    let start = Instant::now();
    let mut beams = 0;
    for _ in 0..iterations {
        if let Ok(t) = TopologyBuilder::new(black_box(&layout)).build() {
            beams = t.beams.len();
        }
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!("  sedan topology ({beams} beams, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}");
}

fn bench_structure_update(iterations: usize) {
    let mut world = PointMassWorld::new();
    let Ok(mut structure) = DeformableStructure::build(
        &mut world,
        &BodyLayout::sedan(),
        Vec3::new(0.0, 1.0, 0.0),
        DamageConfig::default(),
    ) else {
        println!("  sedan layout failed to build");
        return;
    };

    let start = Instant::now();
    for _ in 0..iterations {
        structure.update(&mut world, black_box(DT));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  structure update ({} beams, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}",
        structure.beams().len()
    );
}

fn bench_step_and_update(iterations: usize) {
    let mut world = PointMassWorld::new();
    let Ok(mut structure) = DeformableStructure::build(
        &mut world,
        &BodyLayout::sedan(),
        Vec3::new(0.0, 1.0, 0.0),
        DamageConfig::default(),
    ) else {
        println!("  sedan layout failed to build");
        return;
    };
    structure.apply_damage(&mut world, Vec3::new(0.0, 1.0, -2.3), 50.0);

    let start = Instant::now();
    for _ in 0..iterations {
        world.step(DT, DT, 3);
        structure.update(&mut world, DT);
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  step + update ({iterations} iters): {per_iter:?}/iter, total {elapsed:?}, {} broken",
        structure.broken_beam_count()
    );
}

fn main() {
    println!("=== Structure Benchmarks ===\n");

    println!("Topology build:");
    bench_topology_build(100);

    println!("\nStress/damage update:");
    bench_structure_update(1000);

    println!("\nWorld step with structure update:");
    bench_step_and_update(240);

    println!("\n=== Done ===");
}
