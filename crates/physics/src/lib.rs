//! Rigid-body engine seam: bodies, distance constraints, raycast wheels, world stepping.
//!
//! The vehicle core never owns body or constraint storage. It talks to whatever
//! engine the host embeds through [`RigidBodyEngine`]. [`PointMassWorld`] is the
//! reference backend used by tests and the CLI.
//!
//! # Invariants
//! - Handles stay valid until the matching remove/destroy call.
//! - A removed constraint keeps its storage and can be re-added.
//! - Stepping is deterministic for identical call sequences.

mod engine;
pub mod world;

pub use engine::{
    BodyDesc, BodyShape, BodyState, ConstraintState, DistanceConstraint, RigidBodyEngine,
    WheelDesc, WheelInfo,
};
pub use world::{EngineEvent, PointMassWorld, WorldConfig};

/// Returns crate version info.
pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
