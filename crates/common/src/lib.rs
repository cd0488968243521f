//! Shared value types passed between the structure, dynamics and vehicle crates.
//!
//! # Invariants
//! - Handles are plain indices; they never own engine storage.
//! - Control inputs are clamped to their documented ranges on construction.

mod types;

pub use types::{
    BodyHandle, CollisionEvent, ConstraintHandle, ControlInput, Transform, WHEEL_COUNT,
    WheelPosition,
};

/// Returns crate version info.
pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
