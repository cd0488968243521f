use beamdrive_common::{BodyHandle, ConstraintHandle, Transform};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::{
    BodyDesc, BodyShape, BodyState, ConstraintState, DistanceConstraint, RigidBodyEngine,
    WheelDesc, WheelInfo,
};

/// An event record produced by every structural mutation of the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    BodyAdded { body: BodyHandle },
    BodyRemoved { body: BodyHandle },
    ConstraintCreated { constraint: ConstraintHandle },
    /// Constraint detached from the world; storage kept.
    ConstraintRemoved { constraint: ConstraintHandle },
    /// Previously removed constraint attached again.
    ConstraintRestored { constraint: ConstraintHandle },
    ConstraintDestroyed { constraint: ConstraintHandle },
    WheelAttached { chassis: BodyHandle, index: usize },
    WheelsDetached { chassis: BodyHandle, count: usize },
    /// One internal fixed step completed.
    Stepped { tick: u64 },
}

/// Tunables of the reference backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    pub gravity: Vec3,
    /// Height of the infinite ground plane. `None` disables ground contact.
    pub ground_height: Option<f32>,
    pub solver_iterations: u32,
    /// Fraction of the constraint error corrected per solver iteration.
    pub constraint_relaxation: f32,
    /// Fraction of linear velocity lost per second.
    pub linear_damping: f32,
    pub angular_damping: f32,
    /// Horizontal velocity retained per ground-contact step.
    pub ground_friction: f32,
    /// Converts the wheel brake value into newtons.
    pub brake_scale: f32,
    /// Spin added to a driven wheel while it slides, in rad/s at full slip.
    pub sliding_rotational_speed: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            ground_height: Some(0.0),
            solver_iterations: 10,
            constraint_relaxation: 0.5,
            linear_damping: 0.01,
            angular_damping: 0.01,
            ground_friction: 0.98,
            brake_scale: 100.0,
            sliding_rotational_speed: 30.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Body {
    position: Vec3,
    rotation: Quat,
    velocity: Vec3,
    angular_velocity: Vec3,
    mass: f32,
    inv_mass: f32,
    inv_inertia: f32,
    shape: BodyShape,
    force: Vec3,
    torque: Vec3,
}

impl Body {
    fn from_desc(desc: BodyDesc) -> Self {
        let mass = desc.mass.max(0.0);
        let (inv_mass, inv_inertia) = if mass > 0.0 {
            let inertia = desc.shape.inertia(mass);
            let inv_inertia = if inertia > 0.0 { 1.0 / inertia } else { 0.0 };
            (1.0 / mass, inv_inertia)
        } else {
            (0.0, 0.0)
        };
        Self {
            position: desc.position,
            rotation: desc.rotation.normalize(),
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass,
            inv_mass,
            inv_inertia,
            shape: desc.shape,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
        }
    }

    fn state(&self) -> BodyState {
        BodyState {
            position: self.position,
            rotation: self.rotation,
            velocity: self.velocity,
            angular_velocity: self.angular_velocity,
            mass: self.mass,
        }
    }

    fn is_dynamic(&self) -> bool {
        self.inv_mass > 0.0
    }

    fn point_velocity(&self, point: Vec3) -> Vec3 {
        self.velocity + self.angular_velocity.cross(point - self.position)
    }
}

/// Deterministic point-mass world implementing [`RigidBodyEngine`].
///
/// Bodies integrate with semi-implicit Euler, distance constraints are solved by
/// iterative position projection, and wheels are rays cast against the ground
/// plane. Uses BTreeMap storage so iteration order never depends on hashing.
/// Chassis space is right-handed with +X right, +Y up and -Z forward.
#[derive(Debug, Clone, Default)]
pub struct PointMassWorld {
    config: WorldConfig,
    bodies: BTreeMap<BodyHandle, Body>,
    constraints: BTreeMap<ConstraintHandle, ConstraintState>,
    wheels: Vec<WheelInfo>,
    next_body: u32,
    next_constraint: u32,
    accumulator: f32,
    tick: u64,
    /// Append-only event log of all structural mutations.
    event_log: Vec<EngineEvent>,
}

impl PointMassWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: WorldConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Number of internal fixed steps taken so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Constraints with live storage, attached or not.
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Constraints currently attached to the world.
    pub fn active_constraint_count(&self) -> usize {
        self.constraints.values().filter(|c| c.active).count()
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.event_log)
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[EngineEvent] {
        &self.event_log
    }

    /// Deterministic FNV hash over tick, body kinematics and constraint flags.
    pub fn state_hash(&self) -> u64 {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        let mix = |h: &mut u64, bytes: &[u8]| {
            for &b in bytes {
                *h ^= b as u64;
                *h = h.wrapping_mul(0x0100_0000_01b3);
            }
        };
        mix(&mut h, &self.tick.to_le_bytes());
        for (handle, body) in &self.bodies {
            mix(&mut h, &handle.0.to_le_bytes());
            for v in [body.position, body.velocity, body.angular_velocity] {
                mix(&mut h, &v.x.to_le_bytes());
                mix(&mut h, &v.y.to_le_bytes());
                mix(&mut h, &v.z.to_le_bytes());
            }
        }
        for (handle, c) in &self.constraints {
            mix(&mut h, &handle.0.to_le_bytes());
            mix(&mut h, &c.constraint.distance.to_le_bytes());
            mix(&mut h, &[c.active as u8]);
        }
        h
    }

    fn internal_step(&mut self, dt: f32) {
        self.update_wheels(dt);
        self.integrate(dt);
        self.solve_constraints(dt);
        self.resolve_ground();
        for body in self.bodies.values_mut() {
            body.force = Vec3::ZERO;
            body.torque = Vec3::ZERO;
        }
        self.tick += 1;
        self.event_log.push(EngineEvent::Stepped { tick: self.tick });
    }

    fn update_wheels(&mut self, dt: f32) {
        let wheel_count = self.wheels.len();
        for i in 0..wheel_count {
            let wheel = self.wheels[i];
            let Some(chassis) = self.bodies.get(&wheel.chassis).copied() else {
                continue;
            };
            let share = self
                .wheels
                .iter()
                .filter(|w| w.chassis == wheel.chassis)
                .count()
                .max(1) as f32;
            let (updated, force, torque) =
                self.evaluate_wheel(wheel, &chassis, chassis.mass / share, dt);
            self.wheels[i] = updated;
            if let Some(body) = self.bodies.get_mut(&wheel.chassis) {
                body.force += force;
                body.torque += torque;
            }
        }
    }

    /// Raycast one wheel against the ground plane. Returns the updated wheel and
    /// the force and torque it exerts on the chassis.
    fn evaluate_wheel(
        &self,
        mut wheel: WheelInfo,
        chassis: &Body,
        mass_share: f32,
        dt: f32,
    ) -> (WheelInfo, Vec3, Vec3) {
        let desc = wheel.desc;
        let pose = Transform {
            position: chassis.position,
            rotation: chassis.rotation,
        };
        let anchor = pose.transform_point(desc.connection_local);
        let ray = (chassis.rotation * desc.direction_local).normalize_or_zero();
        let steer = Quat::from_rotation_y(wheel.steering);
        let min_len = (desc.suspension_rest_length - desc.max_suspension_travel).max(0.0);
        let max_len = desc.suspension_rest_length + desc.max_suspension_travel;

        let hit_distance = match self.config.ground_height {
            Some(ground) if ray.y < -1e-3 => Some((ground - anchor.y) / ray.y),
            _ => None,
        };
        let raw_length = hit_distance.map(|d| d - desc.radius);

        wheel.in_contact = matches!(raw_length, Some(len) if len <= max_len && len >= -desc.radius);
        if !wheel.in_contact {
            wheel.suspension_length = desc.suspension_rest_length;
            wheel.suspension_force = 0.0;
            wheel.slip_info = 0.0;
            wheel.angular_velocity *= 0.99;
            wheel.rotation += wheel.angular_velocity * dt;
            wheel.world_transform = Transform {
                position: anchor + ray * wheel.suspension_length,
                rotation: chassis.rotation * steer * Quat::from_rotation_x(wheel.rotation),
            };
            return (wheel, Vec3::ZERO, Vec3::ZERO);
        }

        let length = raw_length.unwrap_or(desc.suspension_rest_length).clamp(min_len, max_len);
        wheel.suspension_length = length;
        let contact = anchor + ray * (length + desc.radius);
        let up = Vec3::Y;
        let v_point = chassis.point_velocity(anchor);

        // Spring/damper along the ground normal, scaled by chassis mass.
        let compression = desc.suspension_rest_length - length;
        let relative_velocity = v_point.dot(up);
        let damping = if relative_velocity < 0.0 {
            desc.damping_compression
        } else {
            desc.damping_relaxation
        };
        let suspension = ((desc.suspension_stiffness * compression - damping * relative_velocity)
            * chassis.mass)
            .clamp(0.0, desc.max_suspension_force);
        wheel.suspension_force = suspension;

        let forward = flatten(chassis.rotation * (steer * Vec3::NEG_Z), up);
        let side = flatten(chassis.rotation * (steer * Vec3::X), up);
        let v_forward = v_point.dot(forward);
        let v_side = v_point.dot(side);

        let brake_limit = wheel.brake.max(0.0) * self.config.brake_scale;
        let brake_force =
            -v_forward.signum() * brake_limit.min(v_forward.abs() * mass_share / dt);
        let mut f_long = wheel.engine_force + brake_force;
        let mut f_lat = -v_side * mass_share / dt;

        let grip = wheel.friction_slip.max(0.0) * suspension;
        let demand = (f_long * f_long + f_lat * f_lat).sqrt();
        if demand > grip && demand > 0.0 {
            let scale = grip / demand;
            f_long *= scale;
            f_lat *= scale;
            wheel.slip_info = (1.0 - scale).clamp(0.0, 1.0);
        } else {
            wheel.slip_info = 0.0;
        }

        wheel.angular_velocity = v_forward / desc.radius.max(1e-3);
        if wheel.slip_info > 0.0 && wheel.engine_force != 0.0 {
            wheel.angular_velocity += wheel.engine_force.signum()
                * wheel.slip_info
                * self.config.sliding_rotational_speed;
        }
        wheel.rotation += wheel.angular_velocity * dt;
        wheel.world_transform = Transform {
            position: anchor + ray * length,
            rotation: chassis.rotation * steer * Quat::from_rotation_x(wheel.rotation),
        };

        // Friction acts closer to the centre of mass height to limit body roll.
        let lever = contact - chassis.position;
        let vertical = up * lever.dot(up);
        let friction_point = chassis.position + lever - vertical * (1.0 - desc.roll_influence);

        let suspension_force = up * suspension;
        let friction_force = forward * f_long + side * f_lat;
        let torque = (anchor - chassis.position).cross(suspension_force)
            + (friction_point - chassis.position).cross(friction_force);
        (wheel, suspension_force + friction_force, torque)
    }

    fn integrate(&mut self, dt: f32) {
        let gravity = self.config.gravity;
        let linear_keep = (1.0 - self.config.linear_damping).clamp(0.0, 1.0).powf(dt);
        let angular_keep = (1.0 - self.config.angular_damping).clamp(0.0, 1.0).powf(dt);
        for body in self.bodies.values_mut() {
            if !body.is_dynamic() {
                continue;
            }
            body.velocity += (gravity + body.force * body.inv_mass) * dt;
            body.velocity *= linear_keep;
            body.angular_velocity += body.torque * body.inv_inertia * dt;
            body.angular_velocity *= angular_keep;
            body.position += body.velocity * dt;
            let w = body.angular_velocity;
            let spin = Quat::from_xyzw(w.x, w.y, w.z, 0.0) * body.rotation;
            body.rotation = Quat::from_xyzw(
                body.rotation.x + 0.5 * spin.x * dt,
                body.rotation.y + 0.5 * spin.y * dt,
                body.rotation.z + 0.5 * spin.z * dt,
                body.rotation.w + 0.5 * spin.w * dt,
            )
            .normalize();
        }
    }

    fn solve_constraints(&mut self, dt: f32) {
        if self.constraints.is_empty() || dt <= 0.0 {
            return;
        }
        let before: BTreeMap<BodyHandle, Vec3> = self
            .bodies
            .iter()
            .map(|(h, b)| (*h, b.position))
            .collect();
        let relaxation = self.config.constraint_relaxation;

        for _ in 0..self.config.solver_iterations {
            for state in self.constraints.values() {
                if !state.active {
                    continue;
                }
                let c = state.constraint;
                let (Some(a), Some(b)) = (self.bodies.get(&c.body_a), self.bodies.get(&c.body_b))
                else {
                    continue;
                };
                let w = a.inv_mass + b.inv_mass;
                if w <= 0.0 {
                    continue;
                }
                let delta = b.position - a.position;
                let len = delta.length();
                if len < 1e-6 {
                    continue;
                }
                let mut correction = delta * ((len - c.distance) / len) * relaxation / w;
                let limit = c.max_force * dt * dt;
                if c.max_force > 0.0 && correction.length() > limit {
                    correction = correction.normalize_or_zero() * limit;
                }
                let (wa, wb) = (a.inv_mass, b.inv_mass);
                if let Some(a) = self.bodies.get_mut(&c.body_a) {
                    a.position += correction * wa;
                }
                if let Some(b) = self.bodies.get_mut(&c.body_b) {
                    b.position -= correction * wb;
                }
            }
        }

        for (handle, body) in self.bodies.iter_mut() {
            if let Some(prev) = before.get(handle) {
                body.velocity += (body.position - *prev) / dt;
            }
        }
    }

    fn resolve_ground(&mut self) {
        let Some(ground) = self.config.ground_height else {
            return;
        };
        let friction = self.config.ground_friction;
        for body in self.bodies.values_mut() {
            if !body.is_dynamic() {
                continue;
            }
            let floor = ground + body.shape.support_height();
            if body.position.y < floor {
                body.position.y = floor;
                if body.velocity.y < 0.0 {
                    body.velocity.y = 0.0;
                }
                body.velocity.x *= friction;
                body.velocity.z *= friction;
            }
        }
    }
}

/// Project `v` onto the plane orthogonal to `normal` and normalize.
fn flatten(v: Vec3, normal: Vec3) -> Vec3 {
    (v - normal * v.dot(normal)).normalize_or_zero()
}

impl RigidBodyEngine for PointMassWorld {
    fn add_body(&mut self, desc: BodyDesc) -> BodyHandle {
        let handle = BodyHandle(self.next_body);
        self.next_body += 1;
        self.bodies.insert(handle, Body::from_desc(desc));
        self.event_log.push(EngineEvent::BodyAdded { body: handle });
        handle
    }

    fn remove_body(&mut self, body: BodyHandle) -> bool {
        let removed = self.bodies.remove(&body).is_some();
        if removed {
            self.event_log.push(EngineEvent::BodyRemoved { body });
        }
        removed
    }

    fn body_state(&self, body: BodyHandle) -> Option<BodyState> {
        self.bodies.get(&body).map(Body::state)
    }

    fn set_body_position(&mut self, body: BodyHandle, position: Vec3) -> bool {
        self.bodies
            .get_mut(&body)
            .map(|b| b.position = position)
            .is_some()
    }

    fn set_body_rotation(&mut self, body: BodyHandle, rotation: Quat) -> bool {
        self.bodies
            .get_mut(&body)
            .map(|b| b.rotation = rotation.normalize())
            .is_some()
    }

    fn set_body_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> bool {
        self.bodies
            .get_mut(&body)
            .map(|b| b.velocity = velocity)
            .is_some()
    }

    fn set_body_angular_velocity(&mut self, body: BodyHandle, angular_velocity: Vec3) -> bool {
        self.bodies
            .get_mut(&body)
            .map(|b| b.angular_velocity = angular_velocity)
            .is_some()
    }

    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3) -> bool {
        self.bodies
            .get_mut(&body)
            .map(|b| b.velocity += impulse * b.inv_mass)
            .is_some()
    }

    fn apply_force(&mut self, body: BodyHandle, force: Vec3) -> bool {
        self.bodies
            .get_mut(&body)
            .map(|b| b.force += force)
            .is_some()
    }

    fn apply_force_at(&mut self, body: BodyHandle, force: Vec3, point: Vec3) -> bool {
        self.bodies
            .get_mut(&body)
            .map(|b| {
                b.force += force;
                b.torque += (point - b.position).cross(force);
            })
            .is_some()
    }

    fn apply_torque(&mut self, body: BodyHandle, torque: Vec3) -> bool {
        self.bodies
            .get_mut(&body)
            .map(|b| b.torque += torque)
            .is_some()
    }

    fn create_constraint(&mut self, constraint: DistanceConstraint) -> ConstraintHandle {
        let handle = ConstraintHandle(self.next_constraint);
        self.next_constraint += 1;
        self.constraints.insert(
            handle,
            ConstraintState {
                constraint,
                active: true,
            },
        );
        self.event_log
            .push(EngineEvent::ConstraintCreated { constraint: handle });
        handle
    }

    fn remove_constraint(&mut self, handle: ConstraintHandle) -> bool {
        match self.constraints.get_mut(&handle) {
            Some(state) if state.active => {
                state.active = false;
                self.event_log
                    .push(EngineEvent::ConstraintRemoved { constraint: handle });
                true
            }
            _ => false,
        }
    }

    fn add_constraint(&mut self, handle: ConstraintHandle) -> bool {
        match self.constraints.get_mut(&handle) {
            Some(state) if !state.active => {
                state.active = true;
                self.event_log
                    .push(EngineEvent::ConstraintRestored { constraint: handle });
                true
            }
            _ => false,
        }
    }

    fn set_constraint_distance(&mut self, handle: ConstraintHandle, distance: f32) -> bool {
        self.constraints
            .get_mut(&handle)
            .map(|s| s.constraint.distance = distance.max(0.0))
            .is_some()
    }

    fn constraint(&self, handle: ConstraintHandle) -> Option<ConstraintState> {
        self.constraints.get(&handle).copied()
    }

    fn destroy_constraint(&mut self, handle: ConstraintHandle) -> bool {
        let removed = self.constraints.remove(&handle).is_some();
        if removed {
            self.event_log
                .push(EngineEvent::ConstraintDestroyed { constraint: handle });
        }
        removed
    }

    fn attach_wheel(&mut self, chassis: BodyHandle, desc: WheelDesc) -> usize {
        let index = self.wheels.len();
        self.wheels.push(WheelInfo::new(chassis, desc));
        self.event_log
            .push(EngineEvent::WheelAttached { chassis, index });
        index
    }

    fn detach_wheels(&mut self, chassis: BodyHandle) -> usize {
        let before = self.wheels.len();
        self.wheels.retain(|w| w.chassis != chassis);
        let count = before - self.wheels.len();
        if count > 0 {
            self.event_log
                .push(EngineEvent::WheelsDetached { chassis, count });
        }
        count
    }

    fn wheel_count(&self) -> usize {
        self.wheels.len()
    }

    fn wheel(&self, index: usize) -> Option<&WheelInfo> {
        self.wheels.get(index)
    }

    fn wheel_mut(&mut self, index: usize) -> Option<&mut WheelInfo> {
        self.wheels.get_mut(index)
    }

    fn step(&mut self, fixed_dt: f32, real_dt: f32, max_substeps: u32) -> u32 {
        if fixed_dt <= 0.0 {
            return 0;
        }
        self.accumulator += real_dt.max(0.0);
        let mut substeps = 0;
        while self.accumulator >= fixed_dt && substeps < max_substeps {
            self.internal_step(fixed_dt);
            self.accumulator -= fixed_dt;
            substeps += 1;
        }
        if substeps == max_substeps {
            // Drop backlog that cannot be simulated this call.
            self.accumulator %= fixed_dt;
        }
        tracing::trace!(substeps, tick = self.tick, "world step");
        substeps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 120.0;

    fn no_ground() -> PointMassWorld {
        PointMassWorld::with_config(WorldConfig {
            ground_height: None,
            ..WorldConfig::default()
        })
    }

    #[test]
    fn world_starts_empty() {
        let w = PointMassWorld::new();
        assert_eq!(w.tick(), 0);
        assert_eq!(w.body_count(), 0);
        assert_eq!(w.constraint_count(), 0);
    }

    #[test]
    fn add_and_remove_body() {
        let mut w = PointMassWorld::new();
        let b = w.add_body(BodyDesc::sphere(Vec3::ONE, 1.0, 0.1));
        assert_eq!(w.body_count(), 1);
        assert_eq!(w.body_position(b), Some(Vec3::ONE));
        assert!(w.remove_body(b));
        assert!(!w.remove_body(b));
        assert!(w.body_state(b).is_none());
    }

    #[test]
    fn step_respects_substep_budget() {
        let mut w = PointMassWorld::new();
        assert_eq!(w.step(DT, DT, 3), 1);
        // A long frame is capped at the substep budget.
        assert_eq!(w.step(DT, 1.0, 3), 3);
        assert_eq!(w.tick(), 4);
        assert_eq!(w.step(DT, 0.0, 3), 0);
    }

    #[test]
    fn free_fall_without_ground() {
        let mut w = no_ground();
        let b = w.add_body(BodyDesc::sphere(Vec3::ZERO, 1.0, 0.1));
        for _ in 0..120 {
            w.step(DT, DT, 3);
        }
        let s = w.body_state(b).unwrap();
        // v = g t with light damping.
        assert!(s.velocity.y < -9.0 && s.velocity.y > -10.0);
        assert!(s.position.y < -4.0);
    }

    #[test]
    fn ground_stops_falling_bodies() {
        let mut w = PointMassWorld::new();
        let b = w.add_body(BodyDesc::sphere(Vec3::new(0.0, 2.0, 0.0), 1.0, 0.1));
        for _ in 0..600 {
            w.step(DT, DT, 3);
        }
        let s = w.body_state(b).unwrap();
        assert!((s.position.y - 0.1).abs() < 1e-4);
        assert!(s.velocity.y.abs() < 0.2);
    }

    #[test]
    fn distance_constraint_holds_length() {
        let mut w = no_ground();
        let a = w.add_body(BodyDesc::sphere(Vec3::ZERO, 0.0, 0.1));
        let b = w.add_body(BodyDesc::sphere(Vec3::new(1.0, 0.0, 0.0), 1.0, 0.1));
        w.create_constraint(DistanceConstraint {
            body_a: a,
            body_b: b,
            distance: 1.0,
            max_force: 1e6,
        });
        for _ in 0..240 {
            w.step(DT, DT, 3);
        }
        let pa = w.body_position(a).unwrap();
        let pb = w.body_position(b).unwrap();
        // Pendulum under gravity keeps its length.
        assert!(((pb - pa).length() - 1.0).abs() < 0.05);
        assert_eq!(pa, Vec3::ZERO);
    }

    #[test]
    fn removed_constraint_can_be_restored() {
        let mut w = PointMassWorld::new();
        let a = w.add_body(BodyDesc::sphere(Vec3::ZERO, 1.0, 0.1));
        let b = w.add_body(BodyDesc::sphere(Vec3::X, 1.0, 0.1));
        let c = w.create_constraint(DistanceConstraint {
            body_a: a,
            body_b: b,
            distance: 1.0,
            max_force: 1e6,
        });
        assert!(w.remove_constraint(c));
        assert!(!w.remove_constraint(c));
        assert_eq!(w.active_constraint_count(), 0);
        assert_eq!(w.constraint_count(), 1);
        assert!(w.add_constraint(c));
        assert!(!w.add_constraint(c));
        assert_eq!(w.active_constraint_count(), 1);
        assert!(w.destroy_constraint(c));
        assert!(w.constraint(c).is_none());
    }

    #[test]
    fn events_are_recorded() {
        let mut w = PointMassWorld::new();
        let a = w.add_body(BodyDesc::sphere(Vec3::ZERO, 1.0, 0.1));
        let b = w.add_body(BodyDesc::sphere(Vec3::X, 1.0, 0.1));
        w.create_constraint(DistanceConstraint {
            body_a: a,
            body_b: b,
            distance: 1.0,
            max_force: 1e6,
        });
        w.step(DT, DT, 3);
        // 2 bodies + constraint + step
        assert_eq!(w.events().len(), 4);
        let drained = w.drain_events();
        assert_eq!(drained.len(), 4);
        assert!(w.events().is_empty());
    }

    #[test]
    fn impulse_changes_velocity_by_inverse_mass() {
        let mut w = no_ground();
        let b = w.add_body(BodyDesc::sphere(Vec3::ZERO, 2.0, 0.1));
        w.apply_impulse(b, Vec3::new(4.0, 0.0, 0.0));
        assert_eq!(w.body_velocity(b), Some(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn state_hash_deterministic() {
        let build = || {
            let mut w = PointMassWorld::new();
            let a = w.add_body(BodyDesc::sphere(Vec3::new(0.0, 1.0, 0.0), 1.0, 0.1));
            let b = w.add_body(BodyDesc::sphere(Vec3::new(0.5, 1.5, 0.0), 1.0, 0.1));
            w.create_constraint(DistanceConstraint {
                body_a: a,
                body_b: b,
                distance: 0.7,
                max_force: 1e6,
            });
            for _ in 0..50 {
                w.step(DT, DT, 3);
            }
            w
        };
        assert_eq!(build().state_hash(), build().state_hash());
    }

    #[test]
    fn wheels_hold_chassis_off_the_ground() {
        let mut w = PointMassWorld::new();
        let chassis = w.add_body(BodyDesc::cuboid(
            Vec3::new(0.0, 1.46, 0.0),
            1500.0,
            Vec3::new(0.9, 0.4, 2.1),
        ));
        for (x, z) in [(-0.8, -1.3), (0.8, -1.3), (-0.8, 1.3), (0.8, 1.3)] {
            w.attach_wheel(
                chassis,
                WheelDesc {
                    connection_local: Vec3::new(x, -0.5, z),
                    ..WheelDesc::default()
                },
            );
        }
        for _ in 0..480 {
            w.step(DT, DT, 3);
        }
        let s = w.body_state(chassis).unwrap();
        assert!(s.position.y > 1.2 && s.position.y < 1.7, "y = {}", s.position.y);
        assert!(s.velocity.y.abs() < 0.5);
        for i in 0..4 {
            let wheel = w.wheel(i).unwrap();
            assert!(wheel.in_contact);
            assert!(wheel.suspension_force > 0.0);
            assert!(wheel.slip_info.abs() < 1e-3);
        }
    }

    #[test]
    fn detach_wheels_removes_only_that_chassis() {
        let mut w = PointMassWorld::new();
        let c1 = w.add_body(BodyDesc::cuboid(Vec3::Y, 10.0, Vec3::splat(0.5)));
        let c2 = w.add_body(BodyDesc::cuboid(Vec3::Y, 10.0, Vec3::splat(0.5)));
        w.attach_wheel(c1, WheelDesc::default());
        w.attach_wheel(c2, WheelDesc::default());
        w.attach_wheel(c1, WheelDesc::default());
        assert_eq!(w.detach_wheels(c1), 2);
        assert_eq!(w.wheel_count(), 1);
        assert_eq!(w.wheel(0).unwrap().chassis, c2);
    }
}
