use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of structural materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Frame,
    Body,
    Bumper,
    Roof,
    Door,
}

/// Mechanical constants of a material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialProfile {
    pub stiffness: f32,
    pub damping: f32,
    pub break_threshold: f32,
    /// Nominal node mass before the node mass scale is applied.
    pub mass: f32,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 5] = [
        MaterialKind::Frame,
        MaterialKind::Body,
        MaterialKind::Bumper,
        MaterialKind::Roof,
        MaterialKind::Door,
    ];

    pub fn profile(self) -> MaterialProfile {
        let (stiffness, damping, break_threshold, mass) = match self {
            MaterialKind::Frame => (100_000.0, 200.0, 50_000.0, 15.0),
            MaterialKind::Body => (80_000.0, 150.0, 40_000.0, 10.0),
            MaterialKind::Bumper => (30_000.0, 100.0, 15_000.0, 5.0),
            MaterialKind::Roof => (60_000.0, 120.0, 25_000.0, 8.0),
            MaterialKind::Door => (40_000.0, 110.0, 20_000.0, 6.0),
        };
        MaterialProfile {
            stiffness,
            damping,
            break_threshold,
            mass,
        }
    }

    /// Grid spacing used when sampling a region of this material.
    pub fn grid_spacing(self) -> f32 {
        match self {
            MaterialKind::Bumper => 0.3,
            MaterialKind::Frame => 0.4,
            _ => 0.5,
        }
    }
}

/// Named body regions of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartTag {
    FrontBumper,
    FrontFrame,
    CabinFrame,
    Roof,
    DoorsLeft,
    DoorsRight,
    RearFrame,
    RearBumper,
    EngineBay,
    Floor,
}

impl PartTag {
    pub const ALL: [PartTag; 10] = [
        PartTag::FrontBumper,
        PartTag::FrontFrame,
        PartTag::CabinFrame,
        PartTag::Roof,
        PartTag::DoorsLeft,
        PartTag::DoorsRight,
        PartTag::RearFrame,
        PartTag::RearBumper,
        PartTag::EngineBay,
        PartTag::Floor,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PartTag::FrontBumper => "front_bumper",
            PartTag::FrontFrame => "front_frame",
            PartTag::CabinFrame => "cabin_frame",
            PartTag::Roof => "roof",
            PartTag::DoorsLeft => "doors_left",
            PartTag::DoorsRight => "doors_right",
            PartTag::RearFrame => "rear_frame",
            PartTag::RearBumper => "rear_bumper",
            PartTag::EngineBay => "engine_bay",
            PartTag::Floor => "floor",
        }
    }
}

impl fmt::Display for PartTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}
