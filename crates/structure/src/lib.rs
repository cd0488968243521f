//! Deformable vehicle structure: a grid of point-mass nodes joined by beams.
//!
//! [`TopologyBuilder`] turns a [`BodyLayout`] into an immutable [`Topology`].
//! [`DeformableStructure`] instantiates it against a rigid-body engine and
//! evolves beam stress, fatigue and failure every tick.
//!
//! # Invariants
//! - Nodes and beams are arena-indexed; handles into the engine are never owned.
//! - Beam stress is never negative.
//! - A broken beam stays broken until [`DeformableStructure::reset`].
//! - Building the same layout twice yields identical topologies.

pub mod material;
pub mod structure;
pub mod topology;

pub use material::{MaterialKind, MaterialProfile, PartTag};
pub use structure::{
    Beam, BeamSnapshot, DamageConfig, DeformableStructure, Node, NodeSnapshot, StructureEvent,
    StructureSnapshot,
};
pub use topology::{
    BeamKind, BeamSpec, BodyLayout, BuildError, ConnectionSpec, NodeSpec, PillarSegment,
    RegionSpec, Topology, TopologyBuilder, TopologyParams, TopologyWarning,
};

/// Returns crate version info.
pub fn crate_info() -> &'static str {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_info_names_the_crate() {
        assert!(crate_info().contains("structure"));
    }
}
