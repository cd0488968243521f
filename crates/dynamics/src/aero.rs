use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AeroConfig {
    /// kg/m³
    pub air_density: f32,
    pub drag_coefficient: f32,
    /// m²
    pub frontal_area: f32,
    pub downforce_coefficient: f32,
    /// Distance of the centre of pressure behind the centre of mass, in metres.
    pub center_of_pressure_offset: f32,
    /// Below this horizontal speed no forces are produced.
    pub min_speed: f32,
}

impl Default for AeroConfig {
    fn default() -> Self {
        Self {
            air_density: 1.225,
            drag_coefficient: 0.32,
            frontal_area: 2.2,
            downforce_coefficient: 0.3,
            center_of_pressure_offset: 0.2,
            min_speed: 0.5,
        }
    }
}

/// Forces for one tick. Vectors are world space; scalars are magnitudes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AeroForces {
    pub drag: f32,
    pub downforce: f32,
    pub pitch_moment: f32,
    pub drag_force: Vec3,
    pub downforce_force: Vec3,
    pub pitch_torque: Vec3,
}

impl AeroForces {
    pub fn is_zero(&self) -> bool {
        self.drag == 0.0 && self.downforce == 0.0
    }
}

/// Drag, downforce and pitch moment from chassis velocity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AerodynamicsModel {
    config: AeroConfig,
    last: AeroForces,
}

impl AerodynamicsModel {
    pub fn new(config: AeroConfig) -> Self {
        Self {
            config,
            last: AeroForces::default(),
        }
    }

    pub fn config(&self) -> &AeroConfig {
        &self.config
    }

    /// Forces computed by the most recent [`Self::update`].
    pub fn forces(&self) -> AeroForces {
        self.last
    }

    pub fn update(&mut self, velocity: Vec3, rotation: Quat) -> AeroForces {
        self.last = self.compute(velocity, rotation);
        self.last
    }

    pub fn reset(&mut self) {
        self.last = AeroForces::default();
    }

    pub fn compute(&self, velocity: Vec3, rotation: Quat) -> AeroForces {
        let c = &self.config;
        let horizontal = Vec3::new(velocity.x, 0.0, velocity.z);
        let speed = horizontal.length();
        if !speed.is_finite() || speed < c.min_speed {
            return AeroForces::default();
        }
        let dynamic_pressure = 0.5 * c.air_density * c.frontal_area * speed * speed;
        let drag = dynamic_pressure * c.drag_coefficient;
        let downforce = dynamic_pressure * c.downforce_coefficient;
        let pitch_moment = downforce * c.center_of_pressure_offset;
        let lateral = rotation * Vec3::X;
        AeroForces {
            drag,
            downforce,
            pitch_moment,
            drag_force: -horizontal / speed * drag,
            downforce_force: Vec3::NEG_Y * downforce,
            pitch_torque: lateral * pitch_moment,
        }
    }
}
