//! Drivable vehicle built from a deformable structure, raycast wheels and the
//! tire, drivetrain, aero and suspension models.
//!
//! A [`VehicleController`] owns no engine; every operation borrows one. Each
//! [`VehicleController::tick`] runs a fixed order: tires, aero, anti-roll,
//! drivetrain, wheel commands, structure, telemetry.

pub mod config;
pub mod controller;
pub mod telemetry;

pub use config::{
    ChassisConfig, CollisionConfig, ConfigError, ControlConfig, MountConfig, StepConfig,
    VehicleConfig,
};
pub use controller::{VehicleController, VehicleError};
pub use telemetry::{AeroTelemetry, Telemetry};

/// Returns crate version info.
pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_info_names_the_crate() {
        assert!(crate_info().contains("vehicle"));
    }
}
