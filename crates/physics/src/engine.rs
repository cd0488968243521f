use beamdrive_common::{BodyHandle, ConstraintHandle, Transform};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Collision shape of a body. Only used for inertia and ground contact.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BodyShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
}

impl BodyShape {
    /// Distance from the body centre to its lowest point, ignoring rotation.
    pub fn support_height(&self) -> f32 {
        match *self {
            BodyShape::Sphere { radius } => radius,
            BodyShape::Box { half_extents } => half_extents.y,
        }
    }

    /// Scalar moment of inertia for a body of the given mass.
    pub fn inertia(&self, mass: f32) -> f32 {
        match *self {
            BodyShape::Sphere { radius } => 0.4 * mass * radius * radius,
            BodyShape::Box { half_extents } => {
                let e = half_extents * 2.0;
                mass * (e.x * e.x + e.y * e.y + e.z * e.z) / 18.0
            }
        }
    }
}

/// Creation request for a body. Zero mass makes the body static.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyDesc {
    pub position: Vec3,
    pub rotation: Quat,
    pub mass: f32,
    pub shape: BodyShape,
}

impl BodyDesc {
    pub fn sphere(position: Vec3, mass: f32, radius: f32) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            mass,
            shape: BodyShape::Sphere { radius },
        }
    }

    pub fn cuboid(position: Vec3, mass: f32, half_extents: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            mass,
            shape: BodyShape::Box { half_extents },
        }
    }
}

/// Read-only snapshot of a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub mass: f32,
}

impl BodyState {
    pub fn transform(&self) -> Transform {
        Transform {
            position: self.position,
            rotation: self.rotation,
        }
    }
}

/// Keeps two bodies at a fixed distance. `max_force` bounds the solver correction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceConstraint {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub distance: f32,
    pub max_force: f32,
}

/// A constraint as stored by the engine, with its attachment flag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstraintState {
    pub constraint: DistanceConstraint,
    pub active: bool,
}

/// Static description of a raycast wheel in chassis space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelDesc {
    pub connection_local: Vec3,
    /// Suspension ray direction in chassis space, normally -Y.
    pub direction_local: Vec3,
    pub radius: f32,
    pub suspension_rest_length: f32,
    pub suspension_stiffness: f32,
    pub damping_relaxation: f32,
    pub damping_compression: f32,
    pub max_suspension_force: f32,
    pub max_suspension_travel: f32,
    pub friction_slip: f32,
    pub roll_influence: f32,
}

impl Default for WheelDesc {
    fn default() -> Self {
        Self {
            connection_local: Vec3::ZERO,
            direction_local: Vec3::NEG_Y,
            radius: 0.4,
            suspension_rest_length: 0.6,
            suspension_stiffness: 60.0,
            damping_relaxation: 2.3,
            damping_compression: 4.4,
            max_suspension_force: 200_000.0,
            max_suspension_travel: 0.5,
            friction_slip: 2.0,
            roll_influence: 0.01,
        }
    }
}

/// Per-wheel state of the engine's raycast vehicle.
///
/// `steering`, `engine_force`, `brake` and `friction_slip` are written by the
/// vehicle core every tick. The remaining fields are produced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelInfo {
    pub chassis: BodyHandle,
    pub desc: WheelDesc,
    pub steering: f32,
    pub engine_force: f32,
    pub brake: f32,
    pub friction_slip: f32,
    pub suspension_length: f32,
    pub suspension_force: f32,
    /// 0 while the tire grips, rising towards 1 as demanded force exceeds grip.
    pub slip_info: f32,
    /// Wheel spin in rad/s.
    pub angular_velocity: f32,
    pub rotation: f32,
    pub in_contact: bool,
    pub world_transform: Transform,
}

impl WheelInfo {
    pub fn new(chassis: BodyHandle, desc: WheelDesc) -> Self {
        Self {
            chassis,
            desc,
            steering: 0.0,
            engine_force: 0.0,
            brake: 0.0,
            friction_slip: desc.friction_slip,
            suspension_length: desc.suspension_rest_length,
            suspension_force: 0.0,
            slip_info: 0.0,
            angular_velocity: 0.0,
            rotation: 0.0,
            in_contact: false,
            world_transform: Transform::from_position(desc.connection_local),
        }
    }

    /// Ground speed implied by the wheel spin.
    pub fn rim_speed(&self) -> f32 {
        self.angular_velocity.abs() * self.desc.radius
    }

    /// Return the wheel to rest: no spin, suspension at rest length.
    pub fn settle(&mut self) {
        self.angular_velocity = 0.0;
        self.rotation = 0.0;
        self.slip_info = 0.0;
        self.suspension_force = 0.0;
        self.suspension_length = self.desc.suspension_rest_length;
    }
}

/// Everything the vehicle core consumes from a rigid-body engine.
///
/// Mutating calls on unknown handles are no-ops that return `false`.
pub trait RigidBodyEngine {
    fn add_body(&mut self, desc: BodyDesc) -> BodyHandle;
    fn remove_body(&mut self, body: BodyHandle) -> bool;
    fn body_state(&self, body: BodyHandle) -> Option<BodyState>;
    fn set_body_position(&mut self, body: BodyHandle, position: Vec3) -> bool;
    fn set_body_rotation(&mut self, body: BodyHandle, rotation: Quat) -> bool;
    fn set_body_velocity(&mut self, body: BodyHandle, velocity: Vec3) -> bool;
    fn set_body_angular_velocity(&mut self, body: BodyHandle, angular_velocity: Vec3) -> bool;
    /// Instantaneous change of linear momentum.
    fn apply_impulse(&mut self, body: BodyHandle, impulse: Vec3) -> bool;
    /// Force through the centre of mass, consumed by the next internal step.
    fn apply_force(&mut self, body: BodyHandle, force: Vec3) -> bool;
    /// Force at a world-space point, producing torque about the centre of mass.
    fn apply_force_at(&mut self, body: BodyHandle, force: Vec3, point: Vec3) -> bool;
    fn apply_torque(&mut self, body: BodyHandle, torque: Vec3) -> bool;

    /// Allocate a constraint and attach it to the world.
    fn create_constraint(&mut self, constraint: DistanceConstraint) -> ConstraintHandle;
    /// Detach a constraint from the world. Storage is kept for [`Self::add_constraint`].
    fn remove_constraint(&mut self, handle: ConstraintHandle) -> bool;
    /// Re-attach a previously removed constraint.
    fn add_constraint(&mut self, handle: ConstraintHandle) -> bool;
    fn set_constraint_distance(&mut self, handle: ConstraintHandle, distance: f32) -> bool;
    fn constraint(&self, handle: ConstraintHandle) -> Option<ConstraintState>;
    /// Free the constraint's storage. The handle is dead afterwards.
    fn destroy_constraint(&mut self, handle: ConstraintHandle) -> bool;

    /// Add a raycast wheel to a chassis body. Returns the wheel index.
    fn attach_wheel(&mut self, chassis: BodyHandle, desc: WheelDesc) -> usize;
    /// Remove every wheel attached to `chassis`. Returns how many were removed.
    fn detach_wheels(&mut self, chassis: BodyHandle) -> usize;
    fn wheel_count(&self) -> usize;
    fn wheel(&self, index: usize) -> Option<&WheelInfo>;
    fn wheel_mut(&mut self, index: usize) -> Option<&mut WheelInfo>;

    /// Advance by `real_dt` using fixed internal steps of `fixed_dt`, at most
    /// `max_substeps` of them. Returns the number of internal steps taken.
    fn step(&mut self, fixed_dt: f32, real_dt: f32, max_substeps: u32) -> u32;

    fn body_position(&self, body: BodyHandle) -> Option<Vec3> {
        self.body_state(body).map(|s| s.position)
    }

    fn body_velocity(&self, body: BodyHandle) -> Option<Vec3> {
        self.body_state(body).map(|s| s.velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_and_box_support_heights() {
        assert_eq!(BodyShape::Sphere { radius: 0.02 }.support_height(), 0.02);
        let b = BodyShape::Box {
            half_extents: Vec3::new(0.9, 0.4, 2.1),
        };
        assert_eq!(b.support_height(), 0.4);
    }

    #[test]
    fn wheel_info_starts_at_rest_length() {
        let desc = WheelDesc::default();
        let w = WheelInfo::new(BodyHandle(0), desc);
        assert_eq!(w.suspension_length, desc.suspension_rest_length);
        assert_eq!(w.friction_slip, desc.friction_slip);
        assert!(!w.in_contact);
    }

    #[test]
    fn settle_clears_spin() {
        let mut w = WheelInfo::new(BodyHandle(0), WheelDesc::default());
        w.angular_velocity = 40.0;
        w.suspension_length = 0.2;
        w.settle();
        assert_eq!(w.angular_velocity, 0.0);
        assert_eq!(w.suspension_length, 0.6);
        assert_eq!(w.rim_speed(), 0.0);
    }
}
