//! Vehicle configuration, loadable from YAML or JSON.

use std::path::Path;

use beamdrive_common::{WHEEL_COUNT, WheelPosition};
use beamdrive_dynamics::{AeroConfig, DrivetrainConfig, SuspensionConfig, TireCompound, TireConfig};
use beamdrive_physics::WheelDesc;
use beamdrive_structure::{BodyLayout, BuildError, DamageConfig, PartTag};
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported config format: {0:?} (expected .yaml, .yml or .json)")]
    UnsupportedFormat(String),
    #[error("invalid config: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("invalid damage config: {0}")]
    Damage(BuildError),
}

/// Chassis body and wheel geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisConfig {
    pub mass: f32,
    pub half_extents: Vec3,
    /// Shared suspension and tire geometry. `connection_local` is overridden per wheel.
    pub wheel: WheelDesc,
    /// Hardpoints in chassis space, indexed like [`WheelPosition`].
    pub wheel_positions: [Vec3; WHEEL_COUNT],
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            mass: 1500.0,
            half_extents: Vec3::new(0.9, 0.4, 2.1),
            wheel: WheelDesc::default(),
            wheel_positions: [
                Vec3::new(-0.8, -0.5, -1.3),
                Vec3::new(0.8, -0.5, -1.3),
                Vec3::new(-0.8, -0.5, 1.3),
                Vec3::new(0.8, -0.5, 1.3),
            ],
        }
    }
}

impl ChassisConfig {
    pub fn wheel_desc(&self, wheel: WheelPosition) -> WheelDesc {
        WheelDesc {
            connection_local: self.wheel_positions[wheel.index()],
            ..self.wheel
        }
    }
}

/// How driver input maps onto wheel commands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Front wheel angle at full lock, radians.
    pub max_steering_angle: f32,
    pub brake_force: f32,
    pub handbrake_multiplier: f32,
    /// Fraction of drivetrain force handed to each driven wheel.
    pub engine_force_scale: f32,
    /// Speed (m/s) at which steering authority reaches its minimum.
    pub steering_fade_speed: f32,
    pub min_steering_factor: f32,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            max_steering_angle: 0.35,
            brake_force: 50.0,
            handbrake_multiplier: 2.0,
            engine_force_scale: 0.1,
            steering_fade_speed: 50.0,
            min_steering_factor: 0.35,
        }
    }
}

/// Engine stepping used by [`crate::VehicleController::advance`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub fixed_dt: f32,
    pub max_substeps: u32,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 120.0,
            max_substeps: 3,
        }
    }
}

/// Collision-driven damage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Contacts at or below this impulse are ignored entirely.
    pub min_impulse: f32,
    /// Impulse per damage point.
    pub impulse_per_damage: f32,
    pub max_damage_per_hit: f32,
    pub max_damage: f32,
    /// Share of the collision impulse handed to the structure. Beam wear per
    /// unit of it is set by `damage.impact_damage`.
    pub structure_impulse_scale: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            min_impulse: 5.0,
            impulse_per_damage: 20.0,
            max_damage_per_hit: 50.0,
            max_damage: 100.0,
            structure_impulse_scale: 0.02,
        }
    }
}

/// Structure parts carried rigidly by the chassis; the rest hang off them
/// through beams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    pub parts: Vec<PartTag>,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            parts: vec![
                PartTag::Floor,
                PartTag::CabinFrame,
                PartTag::EngineBay,
                PartTag::FrontFrame,
                PartTag::RearFrame,
            ],
        }
    }
}

/// Everything needed to spawn a vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub chassis: ChassisConfig,
    pub layout: BodyLayout,
    pub mounts: MountConfig,
    pub damage: DamageConfig,
    pub tires: TireConfig,
    pub compound: TireCompound,
    pub drivetrain: DrivetrainConfig,
    pub aero: AeroConfig,
    pub suspension: SuspensionConfig,
    pub control: ControlConfig,
    pub step: StepConfig,
    pub collision: CollisionConfig,
}

impl VehicleConfig {
    /// Load from a `.yaml`/`.yml` or `.json` file. Missing fields take defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let config: Self = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&text)?,
            "json" => serde_json::from_str(&text)?,
            _ => return Err(ConfigError::UnsupportedFormat(ext)),
        };
        config.validate()?;
        tracing::info!(path = %path.display(), "vehicle config loaded");
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values no physical vehicle could have.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.chassis;
        positive("chassis.mass", c.mass)?;
        positive("chassis.half_extents", c.half_extents.min_element())?;
        positive("chassis.wheel.radius", c.wheel.radius)?;
        positive("chassis.wheel.suspension_rest_length", c.wheel.suspension_rest_length)?;
        non_negative("chassis.wheel.friction_slip", c.wheel.friction_slip)?;

        let d = &self.drivetrain;
        if d.forward_ratios.is_empty() {
            return Err(invalid("drivetrain.forward_ratios", "must not be empty"));
        }
        if d.forward_ratios.len() > u8::MAX as usize {
            return Err(invalid("drivetrain.forward_ratios", "has too many gears"));
        }
        for &ratio in &d.forward_ratios {
            positive("drivetrain.forward_ratios", ratio)?;
        }
        positive("drivetrain.idle_rpm", d.idle_rpm)?;
        if !(d.max_rpm.is_finite() && d.max_rpm > d.idle_rpm) {
            return Err(invalid("drivetrain.max_rpm", "must exceed idle_rpm"));
        }
        positive("drivetrain.final_drive", d.final_drive)?;
        positive("drivetrain.wheel_radius", d.wheel_radius)?;
        non_negative("drivetrain.max_engine_force", d.max_engine_force)?;

        positive("step.fixed_dt", self.step.fixed_dt)?;
        if self.step.max_substeps == 0 {
            return Err(invalid("step.max_substeps", "must be at least 1"));
        }
        positive("tires.nominal_pressure", self.tires.nominal_pressure)?;
        non_negative("aero.air_density", self.aero.air_density)?;
        positive("collision.impulse_per_damage", self.collision.impulse_per_damage)?;
        non_negative("collision.min_impulse", self.collision.min_impulse)?;
        non_negative("collision.structure_impulse_scale", self.collision.structure_impulse_scale)?;
        self.damage.validate().map_err(ConfigError::Damage)?;
        non_negative("control.brake_force", self.control.brake_force)?;
        for part in &self.mounts.parts {
            if !self.layout.regions.iter().any(|r| r.part == *part) {
                return Err(ConfigError::Invalid {
                    field: "mounts.parts",
                    reason: format!("{part} has no region in the layout"),
                });
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be positive, got {value}"),
        })
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("must be non-negative, got {value}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        VehicleConfig::default().validate().unwrap();
    }

    #[test]
    fn wheel_desc_uses_hardpoint() {
        let c = ChassisConfig::default();
        let d = c.wheel_desc(WheelPosition::RearRight);
        assert_eq!(d.connection_local, Vec3::new(0.8, -0.5, 1.3));
        assert_eq!(d.radius, 0.4);
    }

    #[test]
    fn partial_yaml_falls_back_to_defaults() {
        let config = VehicleConfig::from_yaml_str(
            "chassis:\n  mass: 1200.0\ncompound: soft\ndrivetrain:\n  max_rpm: 8000.0\n",
        )
        .unwrap();
        assert_eq!(config.chassis.mass, 1200.0);
        assert_eq!(config.compound, TireCompound::Soft);
        assert_eq!(config.drivetrain.max_rpm, 8000.0);
        assert_eq!(config.drivetrain.idle_rpm, 800.0);
        assert_eq!(config.layout, BodyLayout::sedan());
    }

    #[test]
    fn rejects_non_physical_values() {
        let mut config = VehicleConfig::default();
        config.drivetrain.idle_rpm = 9000.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "drivetrain.max_rpm",
                ..
            })
        ));

        let mut config = VehicleConfig::default();
        config.chassis.mass = 0.0;
        assert!(config.validate().is_err());

        let mut config = VehicleConfig::default();
        config.drivetrain.forward_ratios.clear();
        assert!(config.validate().is_err());

        let mut config = VehicleConfig::default();
        config.step.fixed_dt = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_damage_values() {
        for (yaml, field) in [
            ("damage:\n  stress_normalizer: 0.0\n", "stress_normalizer"),
            ("damage:\n  weaken_step: -0.01\n", "weaken_step"),
            ("damage:\n  fatigue_rate: -1.0\n", "fatigue_rate"),
            ("damage:\n  redistribution_penalty: -0.1\n", "redistribution_penalty"),
            ("damage:\n  loosen_factor: 0.9\n", "loosen_factor"),
            ("damage:\n  impact_radius: 0.0\n", "impact_radius"),
        ] {
            let err = VehicleConfig::from_yaml_str(yaml).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Damage(BuildError::InvalidDamage { name, .. }) if *name == field),
                "{yaml:?}: {err}"
            );
        }
        VehicleConfig::from_yaml_str("damage:\n  weaken_step: 0.0\n").unwrap();
    }

    #[test]
    fn mounts_must_name_layout_parts() {
        let mut config = VehicleConfig::default();
        config.layout.regions.retain(|r| r.part != PartTag::Floor);
        config.layout.connections.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid {
                field: "mounts.parts",
                ..
            })
        ));
        config.mounts.parts.clear();
        config.validate().unwrap();
    }

    #[test]
    fn loads_yaml_and_json_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = VehicleConfig {
            compound: TireCompound::Hard,
            ..Default::default()
        };

        let yaml_path = dir.path().join("car.yaml");
        std::fs::write(&yaml_path, config.to_yaml_string().unwrap()).unwrap();
        assert_eq!(VehicleConfig::from_path(&yaml_path).unwrap(), config);

        let json_path = dir.path().join("car.json");
        std::fs::write(&json_path, config.to_json_string().unwrap()).unwrap();
        assert_eq!(VehicleConfig::from_path(&json_path).unwrap(), config);
    }

    #[test]
    fn rejects_unknown_extension_and_bad_files() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "mass = 3").unwrap();
        assert!(matches!(
            VehicleConfig::from_path(file.path()),
            Err(ConfigError::UnsupportedFormat(_))
        ));

        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(file, "{{ not json").unwrap();
        assert!(matches!(
            VehicleConfig::from_path(file.path()),
            Err(ConfigError::Json(_))
        ));

        assert!(matches!(
            VehicleConfig::from_path("/definitely/not/here.yaml"),
            Err(ConfigError::Io(_))
        ));
    }
}
