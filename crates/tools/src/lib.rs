//! Developer tooling: read-only inspectors over structures and vehicles.
//!
//! # Invariants
//! - Inspectors never mutate what they look at.

pub mod inspector;

pub use inspector::{
    BeamInfo, DamageReport, StructureInspector, TopologySummary, VehicleInspector, VehicleSummary,
};

/// Returns crate version info.
pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}
