use std::fmt;

use serde::{Deserialize, Serialize};

/// Selected gear. Forward gears are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gear {
    Reverse,
    Neutral,
    Forward(u8),
}

impl Gear {
    pub const FIRST: Gear = Gear::Forward(1);

    /// -1 for reverse, 0 for neutral, 1..n for forward gears.
    pub fn display_number(self) -> i32 {
        match self {
            Gear::Reverse => -1,
            Gear::Neutral => 0,
            Gear::Forward(n) => n as i32,
        }
    }

    pub fn label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Gear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gear::Reverse => f.write_str("R"),
            Gear::Neutral => f.write_str("N"),
            Gear::Forward(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrivetrainConfig {
    pub idle_rpm: f32,
    pub max_rpm: f32,
    pub reverse_ratio: f32,
    /// Ratios of forward gears 1..n.
    pub forward_ratios: Vec<f32>,
    pub final_drive: f32,
    pub max_engine_force: f32,
    pub wheel_radius: f32,
    /// Fraction of the gap to the target rpm closed per second under throttle.
    pub rpm_response: f32,
    /// Rpm lost per second with the throttle closed.
    pub engine_braking: f32,
    pub min_torque: f32,
    pub reverse_force_factor: f32,
    pub upshift_ratio: f32,
    pub downshift_ratio: f32,
    /// Below this chassis speed (m/s) the direction of travel may change.
    pub standstill_speed: f32,
    pub reverse_brake_threshold: f32,
}

impl Default for DrivetrainConfig {
    fn default() -> Self {
        Self {
            idle_rpm: 800.0,
            max_rpm: 7000.0,
            reverse_ratio: -3.5,
            forward_ratios: vec![3.8, 2.5, 1.8, 1.3, 1.0, 0.8],
            final_drive: 3.5,
            max_engine_force: 2000.0,
            wheel_radius: 0.4,
            rpm_response: 5.0,
            engine_braking: 1000.0,
            min_torque: 0.3,
            reverse_force_factor: 0.5,
            upshift_ratio: 0.9,
            downshift_ratio: 0.3,
            standstill_speed: 0.5,
            reverse_brake_threshold: 0.5,
        }
    }
}

impl DrivetrainConfig {
    pub fn gear_ratio(&self, gear: Gear) -> f32 {
        match gear {
            Gear::Reverse => self.reverse_ratio,
            Gear::Neutral => 0.0,
            Gear::Forward(n) => self
                .forward_ratios
                .get((n as usize).wrapping_sub(1))
                .copied()
                .unwrap_or(0.0),
        }
    }

    pub fn top_gear(&self) -> u8 {
        self.forward_ratios.len().min(u8::MAX as usize) as u8
    }

    /// Inverted parabola over normalised rpm, peaking at half of max rpm.
    pub fn torque_multiplier(&self, rpm: f32) -> f32 {
        let n = rpm / self.max_rpm;
        (1.0 - (n - 0.5).powi(2)).max(self.min_torque)
    }
}

/// Per-tick inputs sampled by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DrivetrainInput {
    pub throttle: f32,
    pub brake: f32,
    /// Horizontal chassis speed in m/s.
    pub speed: f32,
    /// Mean absolute spin of the driven wheels in rad/s.
    pub driven_wheel_spin: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrivetrainState {
    pub rpm: f32,
    pub gear: Gear,
    pub throttle: f32,
    pub brake: f32,
}

/// A gear transition made during an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GearChange {
    pub from: Gear,
    pub to: Gear,
}

/// Engine rpm, gear selection and wheel force.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrivetrainModel {
    config: DrivetrainConfig,
    state: DrivetrainState,
}

impl DrivetrainModel {
    pub fn new(config: DrivetrainConfig) -> Self {
        let state = DrivetrainState {
            rpm: config.idle_rpm,
            gear: Gear::FIRST,
            throttle: 0.0,
            brake: 0.0,
        };
        Self { config, state }
    }

    pub fn config(&self) -> &DrivetrainConfig {
        &self.config
    }

    pub fn state(&self) -> &DrivetrainState {
        &self.state
    }

    pub fn rpm(&self) -> f32 {
        self.state.rpm
    }

    pub fn gear(&self) -> Gear {
        self.state.gear
    }

    /// Force a gear and rpm, clamping both into range.
    pub fn set_state(&mut self, gear: Gear, rpm: f32) {
        self.state.gear = match gear {
            Gear::Forward(n) => Gear::Forward(n.clamp(1, self.config.top_gear().max(1))),
            other => other,
        };
        self.state.rpm = self.clamp_rpm(rpm);
    }

    /// Idle, first gear, inputs released.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// One tick: direction changes, auto-shift on the incoming rpm, rpm update.
    /// Returns the gear change made this tick, if any.
    pub fn update(&mut self, input: DrivetrainInput, dt: f32) -> Option<GearChange> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.state.throttle = unit(input.throttle);
        self.state.brake = unit(input.brake);
        let from = self.state.gear;

        self.select_direction(input.speed);
        self.auto_shift();

        let spin = if input.driven_wheel_spin.is_finite() {
            input.driven_wheel_spin.abs()
        } else {
            0.0
        };
        let target = self.target_rpm(spin);
        let rpm = if self.state.throttle > 0.0 {
            self.state.rpm + (target - self.state.rpm) * (dt * self.config.rpm_response).min(1.0)
        } else {
            self.state.rpm - self.config.engine_braking * dt
        };
        self.state.rpm = self.clamp_rpm(rpm);

        let to = self.state.gear;
        tracing::trace!(rpm = self.state.rpm, gear = %to, "drivetrain updated");
        (from != to).then(|| {
            tracing::debug!(%from, %to, rpm = self.state.rpm, "gear change");
            GearChange { from, to }
        })
    }

    fn select_direction(&mut self, speed: f32) {
        let c = &self.config;
        let stopped = speed.is_finite() && speed.abs() < c.standstill_speed;
        if !stopped {
            return;
        }
        if self.state.brake > c.reverse_brake_threshold && self.state.gear != Gear::Reverse {
            self.state.gear = Gear::Reverse;
        } else if self.state.throttle > 0.0 && self.state.gear == Gear::Reverse {
            self.state.gear = Gear::FIRST;
        }
    }

    fn auto_shift(&mut self) {
        let Gear::Forward(n) = self.state.gear else {
            return;
        };
        let c = &self.config;
        if self.state.throttle > 0.0 && self.state.rpm >= c.max_rpm * c.upshift_ratio && n < c.top_gear() {
            self.state.gear = Gear::Forward(n + 1);
        } else if self.state.rpm < c.max_rpm * c.downshift_ratio && n > 1 {
            self.state.gear = Gear::Forward(n - 1);
        }
    }

    /// Rpm implied by the driven-wheel spin through the current ratio, above idle.
    pub fn target_rpm(&self, wheel_spin: f32) -> f32 {
        let wheel_rpm = wheel_spin * 60.0 / std::f32::consts::TAU;
        let ratio = (self.config.gear_ratio(self.state.gear) * self.config.final_drive).abs();
        self.config.idle_rpm + wheel_rpm * ratio
    }

    /// Longitudinal force at the driven wheels for the current state.
    pub fn wheel_force(&self) -> f32 {
        let c = &self.config;
        if self.state.gear == Gear::Neutral {
            return 0.0;
        }
        let total_ratio = (c.gear_ratio(self.state.gear) * c.final_drive).abs();
        let torque = c.max_engine_force * c.torque_multiplier(self.state.rpm) * self.state.throttle;
        let force = torque * total_ratio / c.wheel_radius;
        if self.state.gear == Gear::Reverse {
            -force * c.reverse_force_factor
        } else {
            force
        }
    }

    fn clamp_rpm(&self, rpm: f32) -> f32 {
        if rpm.is_finite() {
            rpm.clamp(self.config.idle_rpm, self.config.max_rpm)
        } else {
            self.config.idle_rpm
        }
    }
}

fn unit(v: f32) -> f32 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 }
}
