//! Vehicle dynamics models. Each model is a plain state machine fed with
//! values sampled from the rigid-body engine; none of them touch the engine.
//!
//! # Invariants
//! - Tire temperature stays in [20, 150] and wear in [0, 1].
//! - Engine rpm stays in [idle, max].
//! - Every friction factor is floored above zero.

pub mod aero;
pub mod drivetrain;
pub mod suspension;
pub mod tire;

pub use aero::{AeroConfig, AeroForces, AerodynamicsModel};
pub use drivetrain::{DrivetrainConfig, DrivetrainInput, DrivetrainModel, DrivetrainState, Gear, GearChange};
pub use suspension::{AntiRoll, Axle, SuspensionConfig, SuspensionModel};
pub use tire::{CompoundProfile, TireCompound, TireConfig, TireModel, TireSample, TireState};

/// Returns crate version info.
pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
