use beamdrive_common::{CollisionEvent, ControlInput};
use beamdrive_physics::{PointMassWorld, RigidBodyEngine};
use beamdrive_vehicle::{VehicleConfig, VehicleController};
use glam::Vec3;

const DT: f32 = 1.0 / 60.0;

fn spawn() -> (PointMassWorld, VehicleController) {
    let mut world = PointMassWorld::new();
    let vehicle =
        VehicleController::spawn(&mut world, VehicleConfig::default(), Vec3::new(0.0, 1.4, 0.0))
            .unwrap();
    (world, vehicle)
}

fn run(world: &mut PointMassWorld, vehicle: &mut VehicleController, input: ControlInput, ticks: usize) {
    for _ in 0..ticks {
        vehicle.advance(world, input, DT).unwrap();
    }
}

#[test]
fn full_throttle_drives_forward() {
    let (mut world, mut vehicle) = spawn();
    run(&mut world, &mut vehicle, ControlInput::default(), 30);
    let start = vehicle.telemetry().position;

    run(&mut world, &mut vehicle, ControlInput::new(1.0, 0.0, 0.0, false), 120);
    let t = vehicle.telemetry();
    assert!(t.speed > 1.0, "speed {}", t.speed);
    assert!(t.position.z < start.z);
    assert!(t.rpm > 800.0);
    assert!(t.gear >= 1);
}

#[test]
fn reverse_engages_at_standstill_and_releases_only_when_stopped() {
    let (mut world, mut vehicle) = spawn();
    let chassis = vehicle.chassis();

    for _ in 0..5 {
        vehicle
            .tick(&mut world, ControlInput::new(0.0, 1.0, 0.0, true), DT)
            .unwrap();
    }
    assert_eq!(vehicle.telemetry().gear_label, "R");

    // Rolling backwards: throttle keeps reverse and pushes the car back.
    world.set_body_velocity(chassis, Vec3::new(0.0, 0.0, 2.0));
    let t = vehicle
        .tick(&mut world, ControlInput::new(1.0, 0.0, 0.0, false), DT)
        .unwrap();
    assert_eq!(t.gear, -1);
    assert!(world.wheel(2).unwrap().engine_force < 0.0);

    world.set_body_velocity(chassis, Vec3::ZERO);
    let t = vehicle
        .tick(&mut world, ControlInput::new(1.0, 0.0, 0.0, false), DT)
        .unwrap();
    assert_eq!(t.gear, 1);
    assert!(world.wheel(2).unwrap().engine_force > 0.0);
}

#[test]
fn telemetry_stays_in_range_while_cornering() {
    let (mut world, mut vehicle) = spawn();
    for i in 0..240 {
        let steering = if i % 120 < 60 { 1.0 } else { -1.0 };
        let brake = if i > 180 { 1.0 } else { 0.0 };
        let t = vehicle
            .advance(&mut world, ControlInput::new(1.0 - brake, brake, steering, false), DT)
            .unwrap();
        assert!(t.speed.is_finite());
        assert!((800.0..=7000.0).contains(&t.rpm));
        assert!((0.0..=100.0).contains(&t.damage_percentage));
        assert!(t.steering_angle.abs() <= 0.35 + 1e-6);
        for w in 0..4 {
            assert!((20.0..=150.0).contains(&t.tire_temperatures[w]));
            assert!((0.0..=1.0).contains(&t.tire_wear[w]));
            assert!((0.0..=1.0).contains(&t.wheel_slip[w]));
        }
    }
    assert_eq!(vehicle.ticks(), 240);
}

#[test]
fn crash_then_reset_restores_the_car() {
    let (mut world, mut vehicle) = spawn();
    run(&mut world, &mut vehicle, ControlInput::new(1.0, 0.0, 0.0, false), 30);

    let front = vehicle.telemetry().position + Vec3::new(0.0, 0.0, -2.1);
    for _ in 0..3 {
        vehicle.on_collision(
            &mut world,
            CollisionEvent {
                impact_point: front,
                impact_normal: Vec3::Z,
                impulse_magnitude: 20_000.0,
            },
        );
        run(&mut world, &mut vehicle, ControlInput::default(), 10);
    }
    assert!(vehicle.damage_percentage() > 0.0);
    assert!(vehicle.collision_damage() > 0.0);
    let broken = vehicle.structure().broken_beam_count();
    assert!(broken > 0);
    assert_eq!(vehicle.telemetry().broken_beams, broken);
    assert!(world.active_constraint_count() < vehicle.structure().beams().len());

    vehicle.reset(&mut world);
    assert_eq!(vehicle.collision_damage(), 0.0);
    assert_eq!(vehicle.structure().broken_beam_count(), 0);
    assert_eq!(world.active_constraint_count(), vehicle.structure().beams().len());
    assert!(vehicle.structure().beams().iter().all(|b| !b.broken && b.health == 1.0));
    assert_eq!(vehicle.damage_percentage(), 0.0);
    assert_eq!(vehicle.telemetry().gear_label, "1");
    assert_eq!(vehicle.input(), ControlInput::default());
    let chassis = world.body_state(vehicle.chassis()).unwrap();
    assert_eq!(chassis.velocity, Vec3::ZERO);
    for (i, node) in vehicle.structure().nodes().iter().enumerate() {
        let p = world.body_position(node.body).unwrap();
        let rest = vehicle.structure().rest_position_of(i).unwrap();
        assert!((p - rest).length() < 1e-4);
    }
}

#[test]
fn reset_twice_matches_reset_once() {
    let (mut world, mut vehicle) = spawn();
    run(&mut world, &mut vehicle, ControlInput::new(1.0, 0.0, 0.5, false), 60);

    vehicle.reset(&mut world);
    let once = vehicle.structure().snapshot(&world);
    let chassis_once = world.body_state(vehicle.chassis()).unwrap();
    let telemetry_once = vehicle.telemetry().clone();

    vehicle.reset(&mut world);
    assert_eq!(vehicle.structure().snapshot(&world), once);
    assert_eq!(world.body_state(vehicle.chassis()).unwrap(), chassis_once);
    assert_eq!(vehicle.telemetry(), &telemetry_once);
}

#[test]
fn two_vehicles_share_one_engine() {
    let mut world = PointMassWorld::new();
    let mut a =
        VehicleController::spawn(&mut world, VehicleConfig::default(), Vec3::new(-5.0, 1.4, 0.0))
            .unwrap();
    let b = VehicleController::spawn(&mut world, VehicleConfig::default(), Vec3::new(5.0, 1.4, 0.0))
        .unwrap();
    assert_eq!(world.wheel_count(), 8);

    b.destroy(&mut world);
    assert_eq!(world.wheel_count(), 4);
    run(&mut world, &mut a, ControlInput::new(0.5, 0.0, 0.0, false), 10);
    assert_eq!(a.ticks(), 10);
}
