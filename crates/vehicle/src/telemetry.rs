use beamdrive_common::WHEEL_COUNT;
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AeroTelemetry {
    pub drag: f32,
    pub downforce: f32,
}

/// Per-tick vehicle state for HUD, audio and effect collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub tick: u64,
    pub position: Vec3,
    /// Horizontal speed in m/s.
    pub speed: f32,
    pub rpm: f32,
    /// -1 reverse, 0 neutral, 1.. forward.
    pub gear: i32,
    pub gear_label: String,
    pub throttle: f32,
    pub brake: f32,
    pub handbrake: bool,
    /// Front wheel angle in radians after speed attenuation.
    pub steering_angle: f32,
    pub wheel_slip: [f32; WHEEL_COUNT],
    pub tire_temperatures: [f32; WHEEL_COUNT],
    pub tire_wear: [f32; WHEEL_COUNT],
    pub damage_percentage: f32,
    pub broken_beams: usize,
    pub total_stress: f32,
    pub aero: AeroTelemetry,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            tick: 0,
            position: Vec3::ZERO,
            speed: 0.0,
            rpm: 0.0,
            gear: 1,
            gear_label: "1".to_string(),
            throttle: 0.0,
            brake: 0.0,
            handbrake: false,
            steering_angle: 0.0,
            wheel_slip: [0.0; WHEEL_COUNT],
            tire_temperatures: [0.0; WHEEL_COUNT],
            tire_wear: [0.0; WHEEL_COUNT],
            damage_percentage: 0.0,
            broken_beams: 0,
            total_stress: 0.0,
            aero: AeroTelemetry::default(),
        }
    }
}

impl Telemetry {
    pub fn speed_kmh(&self) -> f32 {
        self.speed * 3.6
    }

    pub fn max_wheel_slip(&self) -> f32 {
        self.wheel_slip.iter().copied().fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn telemetry_serializes_to_json() {
        let t = Telemetry {
            speed: 10.0,
            wheel_slip: [0.1, 0.4, 0.0, 0.2],
            ..Default::default()
        };
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["gear_label"], "1");
        assert_eq!(json["wheel_slip"].as_array().unwrap().len(), WHEEL_COUNT);
        assert!((t.speed_kmh() - 36.0).abs() < 1e-4);
        assert!((t.max_wheel_slip() - 0.4).abs() < 1e-6);
    }
}
