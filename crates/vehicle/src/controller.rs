use beamdrive_common::{
    BodyHandle, CollisionEvent, ControlInput, Transform, WHEEL_COUNT, WheelPosition,
};
use beamdrive_dynamics::{
    AeroForces, AerodynamicsModel, AntiRoll, DrivetrainInput, DrivetrainModel, SuspensionModel,
    TireCompound, TireModel, TireSample,
};
use beamdrive_physics::{BodyDesc, RigidBodyEngine};
use beamdrive_structure::{BuildError, DeformableStructure, StructureEvent, TopologyBuilder};
use glam::{Quat, Vec3};

use crate::config::{ConfigError, VehicleConfig};
use crate::telemetry::{AeroTelemetry, Telemetry};

#[derive(Debug, thiserror::Error)]
pub enum VehicleError {
    #[error("structure build failed: {0}")]
    Build(#[from] BuildError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("chassis body {0:?} no longer exists in the engine")]
    MissingChassis(BodyHandle),
    #[error("chassis {chassis:?} has {found} wheels, expected 4")]
    MissingWheel { chassis: BodyHandle, found: usize },
}

/// Wheel commands computed for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct WheelCommand {
    steering: f32,
    engine_force: f32,
    brake: f32,
    friction_slip: f32,
}

/// A drivable vehicle: chassis, raycast wheels, deformable structure and the
/// four dynamics models, ticked in a fixed order.
#[derive(Debug, Clone)]
pub struct VehicleController {
    config: VehicleConfig,
    chassis: BodyHandle,
    structure: DeformableStructure,
    tires: TireModel,
    drivetrain: DrivetrainModel,
    aero: AerodynamicsModel,
    suspension: SuspensionModel,
    input: ControlInput,
    collision_damage: f32,
    telemetry: Telemetry,
    ticks: u64,
}

impl VehicleController {
    /// Create the chassis, its wheels and the structure at `position`.
    pub fn spawn<E: RigidBodyEngine + ?Sized>(
        engine: &mut E,
        config: VehicleConfig,
        position: Vec3,
    ) -> Result<Self, VehicleError> {
        let _span = tracing::info_span!("vehicle_spawn").entered();
        config.validate()?;
        let topology = TopologyBuilder::new(&config.layout)
            .with_origin(position)
            .build()?;

        let chassis = engine.add_body(BodyDesc::cuboid(
            position,
            config.chassis.mass,
            config.chassis.half_extents,
        ));
        for wheel in WheelPosition::ALL {
            engine.attach_wheel(chassis, config.chassis.wheel_desc(wheel));
        }
        let mut structure = DeformableStructure::instantiate(engine, topology, config.damage)?;
        structure.set_frame(Transform::from_position(position));

        let mut vehicle = Self {
            chassis,
            structure,
            tires: TireModel::new(config.tires, config.compound),
            drivetrain: DrivetrainModel::new(config.drivetrain.clone()),
            aero: AerodynamicsModel::new(config.aero),
            suspension: SuspensionModel::new(config.suspension),
            input: ControlInput::default(),
            collision_damage: 0.0,
            telemetry: Telemetry::default(),
            ticks: 0,
            config,
        };
        vehicle.telemetry = vehicle.collect_telemetry(engine, [0.0; WHEEL_COUNT], 0.0);
        tracing::info!(
            chassis = chassis.0,
            nodes = vehicle.structure.nodes().len(),
            beams = vehicle.structure.beams().len(),
            "vehicle spawned"
        );
        Ok(vehicle)
    }

    /// Engine indices of this chassis' wheels, in [`WheelPosition`] order.
    fn wheel_indices<E: RigidBodyEngine + ?Sized>(
        &self,
        engine: &E,
    ) -> Result<[usize; WHEEL_COUNT], VehicleError> {
        let mut indices = [0; WHEEL_COUNT];
        let mut found = 0;
        for i in 0..engine.wheel_count() {
            if engine.wheel(i).is_some_and(|w| w.chassis == self.chassis) {
                if found < WHEEL_COUNT {
                    indices[found] = i;
                }
                found += 1;
            }
        }
        if found != WHEEL_COUNT {
            return Err(VehicleError::MissingWheel {
                chassis: self.chassis,
                found,
            });
        }
        Ok(indices)
    }

    /// One control tick. Models are updated before any command reaches the
    /// engine; the structure is stepped last. Does not step the engine.
    pub fn tick<E: RigidBodyEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        input: ControlInput,
        dt: f32,
    ) -> Result<&Telemetry, VehicleError> {
        let _span = tracing::info_span!("vehicle_tick", tick = self.ticks).entered();
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.input = input.clamped();
        let wheels = self.wheel_indices(engine)?;
        let body = engine
            .body_state(self.chassis)
            .ok_or(VehicleError::MissingChassis(self.chassis))?;
        let speed = horizontal_speed(body.velocity);
        let infos = wheels.map(|i| engine.wheel(i).copied());

        // 1. Tires
        let mut slips = [0.0; WHEEL_COUNT];
        let mut frictions = [0.0; WHEEL_COUNT];
        for wheel in WheelPosition::ALL {
            let i = wheel.index();
            let sample = infos[i].map_or(TireSample::default(), |w| TireSample {
                slip: w.slip_info.abs().min(1.0),
                speed: w.rim_speed(),
            });
            slips[i] = sample.slip;
            frictions[i] = self.tires.update(wheel, sample, dt);
        }

        // 2. Aerodynamics
        let aero = self.aero.update(body.velocity, body.rotation);

        // 3. Anti-roll
        let length = |w: WheelPosition| {
            infos[w.index()].map_or(self.config.chassis.wheel.suspension_rest_length, |i| {
                i.suspension_length
            })
        };
        let (front, rear) = self.suspension.update(
            (length(WheelPosition::FrontLeft), length(WheelPosition::FrontRight)),
            (length(WheelPosition::RearLeft), length(WheelPosition::RearRight)),
        );

        // 4. Drivetrain
        let rear_spin = [WheelPosition::RearLeft, WheelPosition::RearRight]
            .iter()
            .filter_map(|w| infos[w.index()])
            .map(|w| w.angular_velocity.abs())
            .sum::<f32>()
            / 2.0;
        self.drivetrain.update(
            DrivetrainInput {
                throttle: self.input.throttle,
                brake: self.input.brake,
                speed,
                driven_wheel_spin: rear_spin,
            },
            dt,
        );

        // 5. Commands
        let steering = self.steering_angle(speed);
        let commands = self.wheel_commands(steering, frictions);
        for (index, command) in wheels.iter().zip(commands) {
            if let Some(w) = engine.wheel_mut(*index) {
                w.steering = command.steering;
                w.engine_force = command.engine_force;
                w.brake = command.brake;
                w.friction_slip = command.friction_slip;
            }
        }
        self.apply_aero(engine, &aero);
        self.apply_anti_roll(engine, body.position, body.rotation, front, rear);

        // 6. Structure
        self.structure.follow_frame(
            engine,
            body.transform(),
            body.velocity,
            body.angular_velocity,
            &self.config.mounts.parts,
        );
        self.structure.update(engine, dt);

        // 7. Telemetry
        self.ticks += 1;
        self.telemetry = self.collect_telemetry(engine, slips, steering);
        tracing::trace!(
            speed = self.telemetry.speed,
            rpm = self.telemetry.rpm,
            gear = %self.telemetry.gear_label,
            "vehicle ticked"
        );
        Ok(&self.telemetry)
    }

    /// [`Self::tick`] followed by an engine step over `real_dt`.
    pub fn advance<E: RigidBodyEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        input: ControlInput,
        real_dt: f32,
    ) -> Result<&Telemetry, VehicleError> {
        self.tick(engine, input, real_dt)?;
        let step = self.config.step;
        engine.step(step.fixed_dt, real_dt, step.max_substeps);
        Ok(&self.telemetry)
    }

    fn steering_angle(&self, speed: f32) -> f32 {
        let c = &self.config.control;
        let factor = if c.steering_fade_speed > 0.0 {
            (1.0 - speed / c.steering_fade_speed).clamp(c.min_steering_factor.min(1.0), 1.0)
        } else {
            1.0
        };
        self.input.steering * c.max_steering_angle * factor
    }

    fn wheel_commands(
        &self,
        steering: f32,
        frictions: [f32; WHEEL_COUNT],
    ) -> [WheelCommand; WHEEL_COUNT] {
        let c = &self.config.control;
        let engine_force = self.drivetrain.wheel_force() * c.engine_force_scale;
        let service_brake = self.input.brake * c.brake_force;
        WheelPosition::ALL.map(|wheel| {
            let front = wheel.is_front();
            let brake = if self.input.handbrake && !front {
                service_brake.max(c.brake_force * c.handbrake_multiplier)
            } else {
                service_brake
            };
            WheelCommand {
                steering: if front { steering } else { 0.0 },
                engine_force: if front { 0.0 } else { engine_force },
                brake,
                friction_slip: frictions[wheel.index()],
            }
        })
    }

    fn apply_aero<E: RigidBodyEngine + ?Sized>(&self, engine: &mut E, aero: &AeroForces) {
        if aero.is_zero() {
            return;
        }
        engine.apply_force(self.chassis, aero.drag_force + aero.downforce_force);
        engine.apply_torque(self.chassis, aero.pitch_torque);
    }

    fn apply_anti_roll<E: RigidBodyEngine + ?Sized>(
        &self,
        engine: &mut E,
        position: Vec3,
        rotation: Quat,
        front: AntiRoll,
        rear: AntiRoll,
    ) {
        let up = rotation * Vec3::Y;
        let hardpoints = &self.config.chassis.wheel_positions;
        let axles = [
            (front, WheelPosition::FrontLeft, WheelPosition::FrontRight),
            (rear, WheelPosition::RearLeft, WheelPosition::RearRight),
        ];
        for (correction, left, right) in axles {
            if !correction.is_active() {
                continue;
            }
            let left_point = position + rotation * hardpoints[left.index()];
            let right_point = position + rotation * hardpoints[right.index()];
            engine.apply_force_at(self.chassis, -up * correction.force, left_point);
            engine.apply_force_at(self.chassis, up * correction.force, right_point);
        }
    }

    /// Forward a contact to the structure and accumulate collision damage.
    /// Contacts at or below `collision.min_impulse` are ignored.
    /// Returns the damage added by this hit.
    pub fn on_collision<E: RigidBodyEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        event: CollisionEvent,
    ) -> f32 {
        let c = self.config.collision;
        let magnitude = event.impulse_magnitude;
        if !magnitude.is_finite() || magnitude <= c.min_impulse.max(0.0) {
            return 0.0;
        }
        let increment = (magnitude / c.impulse_per_damage).min(c.max_damage_per_hit);
        self.collision_damage = (self.collision_damage + increment).clamp(0.0, c.max_damage);
        let hit = self.structure.apply_damage(
            engine,
            event.impact_point,
            magnitude * c.structure_impulse_scale,
        );
        tracing::debug!(
            impulse = magnitude,
            increment,
            total = self.collision_damage,
            nodes = hit,
            "collision"
        );
        self.telemetry.damage_percentage = self.damage_percentage();
        self.telemetry.broken_beams = self.structure.broken_beam_count();
        increment
    }

    /// Take the structure's pending break and reset events.
    ///
    /// The structure keeps every event until drained, so hosts that do not
    /// consume them should still call this periodically.
    pub fn drain_structure_events(&mut self) -> Vec<StructureEvent> {
        self.structure.drain_events()
    }

    /// Structural damage score plus collision damage, capped at 100.
    pub fn damage_percentage(&self) -> f32 {
        (self.structure.damage_score() + self.collision_damage).min(100.0)
    }

    /// Zero inputs and chassis motion, idle the drivetrain, refit the tires and
    /// restore the structure around the chassis. The chassis keeps its position.
    pub fn reset<E: RigidBodyEngine + ?Sized>(&mut self, engine: &mut E) {
        self.input = ControlInput::default();
        self.drivetrain.reset();
        self.tires.reset();
        self.aero.reset();
        self.suspension.reset();
        self.collision_damage = 0.0;

        engine.set_body_velocity(self.chassis, Vec3::ZERO);
        engine.set_body_angular_velocity(self.chassis, Vec3::ZERO);
        engine.set_body_rotation(self.chassis, Quat::IDENTITY);
        if let Ok(indices) = self.wheel_indices(engine) {
            for i in indices {
                if let Some(w) = engine.wheel_mut(i) {
                    w.steering = 0.0;
                    w.engine_force = 0.0;
                    w.brake = 0.0;
                    w.settle();
                }
            }
        }
        if let Some(body) = engine.body_state(self.chassis) {
            self.structure.set_frame(body.transform());
        }
        self.structure.reset(engine);
        self.telemetry = self.collect_telemetry(engine, [0.0; WHEEL_COUNT], 0.0);
        tracing::info!(chassis = self.chassis.0, "vehicle reset");
    }

    /// Remove wheels, chassis, node bodies and constraints from the engine.
    pub fn destroy<E: RigidBodyEngine + ?Sized>(self, engine: &mut E) {
        let wheels = engine.detach_wheels(self.chassis);
        engine.remove_body(self.chassis);
        self.structure.destroy(engine);
        tracing::info!(chassis = self.chassis.0, wheels, "vehicle destroyed");
    }

    fn collect_telemetry<E: RigidBodyEngine + ?Sized>(
        &self,
        engine: &E,
        wheel_slip: [f32; WHEEL_COUNT],
        steering_angle: f32,
    ) -> Telemetry {
        let body = engine.body_state(self.chassis);
        let gear = self.drivetrain.gear();
        let aero = self.aero.forces();
        Telemetry {
            tick: self.ticks,
            position: body.map_or(Vec3::ZERO, |b| b.position),
            speed: body.map_or(0.0, |b| horizontal_speed(b.velocity)),
            rpm: self.drivetrain.rpm(),
            gear: gear.display_number(),
            gear_label: gear.label(),
            throttle: self.input.throttle,
            brake: self.input.brake,
            handbrake: self.input.handbrake,
            steering_angle,
            wheel_slip,
            tire_temperatures: self.tires.temperatures(),
            tire_wear: self.tires.wear(),
            damage_percentage: self.damage_percentage(),
            broken_beams: self.structure.broken_beam_count(),
            total_stress: self.structure.total_stress(),
            aero: AeroTelemetry {
                drag: aero.drag,
                downforce: aero.downforce,
            },
        }
    }

    /// Swap the compound on all four tires; temperature and wear carry over.
    pub fn set_tire_compound(&mut self, compound: TireCompound) {
        self.tires.set_compound(compound);
    }

    /// Engine handle of the chassis body.
    pub fn chassis(&self) -> BodyHandle {
        self.chassis
    }

    /// Config the vehicle was spawned with.
    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    /// Telemetry from the last tick, collision or reset.
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Input applied on the last tick, after clamping.
    pub fn input(&self) -> ControlInput {
        self.input
    }

    /// Accumulated collision damage, in `[0, collision.max_damage]`.
    pub fn collision_damage(&self) -> f32 {
        self.collision_damage
    }

    /// Ticks run since spawn. Not cleared by [`Self::reset`].
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The deformable body. Use [`Self::drain_structure_events`] to consume its events.
    pub fn structure(&self) -> &DeformableStructure {
        &self.structure
    }

    /// Per-wheel tire state: temperature, wear and pressure.
    pub fn tires(&self) -> &TireModel {
        &self.tires
    }

    /// Gear, rpm and wheel force of the last tick.
    pub fn drivetrain(&self) -> &DrivetrainModel {
        &self.drivetrain
    }

    /// Forces of the last aero update.
    pub fn aero(&self) -> &AerodynamicsModel {
        &self.aero
    }

    /// Anti-roll state of both axles.
    pub fn suspension(&self) -> &SuspensionModel {
        &self.suspension
    }
}

fn horizontal_speed(velocity: Vec3) -> f32 {
    Vec3::new(velocity.x, 0.0, velocity.z).length()
}

#[cfg(test)]
mod tests {
    use super::*;
    use beamdrive_physics::PointMassWorld;
    use beamdrive_structure::PartTag;

    fn spawn() -> (PointMassWorld, VehicleController) {
        let mut world = PointMassWorld::new();
        let vehicle =
            VehicleController::spawn(&mut world, VehicleConfig::default(), Vec3::new(0.0, 1.4, 0.0))
                .unwrap();
        (world, vehicle)
    }

    #[test]
    fn spawn_attaches_four_wheels() {
        let (world, vehicle) = spawn();
        assert_eq!(world.wheel_count(), WHEEL_COUNT);
        assert_eq!(vehicle.wheel_indices(&world).unwrap(), [0, 1, 2, 3]);
        assert_eq!(vehicle.telemetry().gear_label, "1");
        assert_eq!(vehicle.telemetry().rpm, 800.0);
    }

    #[test]
    fn steering_fades_with_speed() {
        let (_, mut vehicle) = spawn();
        vehicle.input = ControlInput::new(0.0, 0.0, 1.0, false);
        assert!((vehicle.steering_angle(0.0) - 0.35).abs() < 1e-6);
        assert!((vehicle.steering_angle(25.0) - 0.175).abs() < 1e-6);
        assert!((vehicle.steering_angle(200.0) - 0.35 * 0.35).abs() < 1e-6);
    }

    #[test]
    fn commands_route_force_to_rear_and_steering_to_front() {
        let (mut world, mut vehicle) = spawn();
        vehicle
            .tick(&mut world, ControlInput::new(1.0, 0.0, -0.5, false), 1.0 / 60.0)
            .unwrap();
        let front = world.wheel(0).unwrap();
        let rear = world.wheel(2).unwrap();
        assert!(front.steering < 0.0);
        assert_eq!(front.engine_force, 0.0);
        assert_eq!(rear.steering, 0.0);
        assert!(rear.engine_force > 0.0);
        let cold = vehicle.tires().friction(WheelPosition::FrontLeft);
        assert!(cold > 0.0);
        assert_eq!(front.friction_slip, cold);
    }

    #[test]
    fn handbrake_locks_rear_wheels() {
        let (mut world, mut vehicle) = spawn();
        vehicle
            .tick(&mut world, ControlInput::new(0.0, 0.0, 0.0, true), 1.0 / 60.0)
            .unwrap();
        assert_eq!(world.wheel(0).unwrap().brake, 0.0);
        assert_eq!(world.wheel(3).unwrap().brake, 100.0);
        vehicle
            .tick(&mut world, ControlInput::new(0.0, 1.0, 0.0, false), 1.0 / 60.0)
            .unwrap();
        assert_eq!(world.wheel(0).unwrap().brake, 50.0);
    }

    #[test]
    fn floor_follows_the_chassis() {
        let (mut world, mut vehicle) = spawn();
        let floor = vehicle
            .structure()
            .nodes()
            .iter()
            .position(|n| n.part == PartTag::Floor)
            .unwrap();
        world.set_body_position(vehicle.chassis(), Vec3::new(5.0, 1.4, 0.0));
        vehicle.tick(&mut world, ControlInput::default(), 1.0 / 60.0).unwrap();
        let node = &vehicle.structure().nodes()[floor];
        let p = world.body_position(node.body).unwrap();
        assert!((p - (node.original_position + Vec3::X * 5.0)).length() < 1e-4);
        assert!(vehicle.structure().node_deformation(floor).unwrap() < 1e-4);
    }

    #[test]
    fn collision_damage_is_clamped() {
        let (mut world, mut vehicle) = spawn();
        let hit = CollisionEvent {
            impact_point: Vec3::new(0.0, 1.4, -2.2),
            impact_normal: Vec3::Z,
            impulse_magnitude: 400.0,
        };
        assert!((vehicle.on_collision(&mut world, hit) - 20.0).abs() < 1e-4);
        let huge = CollisionEvent {
            impulse_magnitude: 1.0e6,
            ..hit
        };
        assert_eq!(vehicle.on_collision(&mut world, huge), 50.0);
        vehicle.on_collision(&mut world, huge);
        assert_eq!(vehicle.collision_damage(), 100.0);
        assert_eq!(vehicle.damage_percentage(), 100.0);
        let ignored = CollisionEvent {
            impulse_magnitude: f32::NAN,
            ..hit
        };
        assert_eq!(vehicle.on_collision(&mut world, ignored), 0.0);
    }

    #[test]
    fn reset_keeps_tick_count_and_clears_input() {
        let (mut world, mut vehicle) = spawn();
        vehicle
            .tick(&mut world, ControlInput::new(2.0, 0.0, -3.0, false), 1.0 / 60.0)
            .unwrap();
        assert_eq!(vehicle.input(), ControlInput::new(1.0, 0.0, -1.0, false));
        assert_eq!(vehicle.ticks(), 1);
        vehicle.reset(&mut world);
        assert_eq!(vehicle.ticks(), 1);
        assert_eq!(vehicle.telemetry().tick, 1);
        assert_eq!(vehicle.input(), ControlInput::default());
        assert_eq!(vehicle.collision_damage(), 0.0);
    }

    #[test]
    fn light_contacts_are_ignored() {
        let (mut world, mut vehicle) = spawn();
        let before = vehicle.structure().snapshot(&world);
        for impulse in [1.0, 5.0] {
            let touch = CollisionEvent {
                impact_point: Vec3::new(0.0, 1.4, -2.2),
                impact_normal: Vec3::Z,
                impulse_magnitude: impulse,
            };
            assert_eq!(vehicle.on_collision(&mut world, touch), 0.0);
        }
        assert_eq!(vehicle.collision_damage(), 0.0);
        assert_eq!(vehicle.structure().snapshot(&world), before);

        let knock = CollisionEvent {
            impact_point: Vec3::new(0.0, 1.4, -2.2),
            impact_normal: Vec3::Z,
            impulse_magnitude: 6.0,
        };
        assert!((vehicle.on_collision(&mut world, knock) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn draining_structure_events_empties_the_log() {
        let (mut world, mut vehicle) = spawn();
        let crash = CollisionEvent {
            impact_point: Vec3::new(0.0, 1.4, -2.2),
            impact_normal: Vec3::Z,
            impulse_magnitude: 20_000.0,
        };
        for _ in 0..5 {
            vehicle.on_collision(&mut world, crash);
            vehicle.reset(&mut world);
            let events = vehicle.drain_structure_events();
            assert!(events.iter().any(|e| matches!(e, StructureEvent::BeamBroken { .. })));
            assert_eq!(events.last(), Some(&StructureEvent::Reset));
            assert!(vehicle.structure().events().is_empty());
        }
        assert!(vehicle.drain_structure_events().is_empty());
    }

    #[test]
    fn tick_fails_once_chassis_is_gone() {
        let (mut world, mut vehicle) = spawn();
        world.detach_wheels(vehicle.chassis());
        assert!(matches!(
            vehicle.tick(&mut world, ControlInput::default(), 1.0 / 60.0),
            Err(VehicleError::MissingWheel { found: 0, .. })
        ));
    }

    #[test]
    fn destroy_releases_everything() {
        let (mut world, vehicle) = spawn();
        vehicle.destroy(&mut world);
        assert_eq!(world.body_count(), 0);
        assert_eq!(world.constraint_count(), 0);
        assert_eq!(world.wheel_count(), 0);
    }

    #[test]
    fn invalid_config_is_rejected_before_touching_engine() {
        let mut world = PointMassWorld::new();
        let mut config = VehicleConfig::default();
        config.chassis.mass = -1.0;
        let err = VehicleController::spawn(&mut world, config, Vec3::ZERO).unwrap_err();
        assert!(matches!(err, VehicleError::Config(_)));
        assert_eq!(world.body_count(), 0);
    }
}
