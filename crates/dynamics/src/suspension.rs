use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axle {
    Front,
    Rear,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspensionConfig {
    /// N per metre of left/right travel difference.
    pub anti_roll_stiffness: f32,
    pub front_multiplier: f32,
    pub rear_multiplier: f32,
    /// Differentials at or below this are ignored, in metres.
    pub dead_band: f32,
    /// Half the distance between left and right wheels, the roll lever arm.
    pub half_track: f32,
}

impl Default for SuspensionConfig {
    fn default() -> Self {
        Self {
            anti_roll_stiffness: 15_000.0,
            front_multiplier: 1.0,
            rear_multiplier: 0.7,
            dead_band: 0.01,
            half_track: 0.8,
        }
    }
}

/// Correction for one axle.
///
/// `force` pushes the left side down and the right side up when positive; the
/// pair produces `roll_torque` about the chassis longitudinal axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AntiRoll {
    pub differential: f32,
    pub force: f32,
    pub roll_torque: f32,
}

impl AntiRoll {
    pub fn is_active(&self) -> bool {
        self.force != 0.0
    }
}

/// Anti-roll bars coupling left/right suspension travel per axle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SuspensionModel {
    config: SuspensionConfig,
    front: AntiRoll,
    rear: AntiRoll,
}

impl SuspensionModel {
    pub fn new(config: SuspensionConfig) -> Self {
        Self {
            config,
            front: AntiRoll::default(),
            rear: AntiRoll::default(),
        }
    }

    pub fn config(&self) -> &SuspensionConfig {
        &self.config
    }

    pub fn axle(&self, axle: Axle) -> AntiRoll {
        match axle {
            Axle::Front => self.front,
            Axle::Rear => self.rear,
        }
    }

    /// Feed current suspension lengths; returns the front and rear corrections.
    pub fn update(&mut self, front: (f32, f32), rear: (f32, f32)) -> (AntiRoll, AntiRoll) {
        self.front = self.compute(Axle::Front, front.0, front.1);
        self.rear = self.compute(Axle::Rear, rear.0, rear.1);
        (self.front, self.rear)
    }

    pub fn compute(&self, axle: Axle, left_length: f32, right_length: f32) -> AntiRoll {
        let c = &self.config;
        let differential = left_length - right_length;
        if !differential.is_finite() || differential.abs() <= c.dead_band {
            return AntiRoll {
                differential: if differential.is_finite() { differential } else { 0.0 },
                ..Default::default()
            };
        }
        let multiplier = match axle {
            Axle::Front => c.front_multiplier,
            Axle::Rear => c.rear_multiplier,
        };
        let force = differential * c.anti_roll_stiffness * multiplier;
        AntiRoll {
            differential,
            force,
            roll_torque: force * c.half_track * 2.0,
        }
    }

    pub fn reset(&mut self) {
        self.front = AntiRoll::default();
        self.rear = AntiRoll::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dead_band_suppresses_small_differences() {
        let model = SuspensionModel::new(SuspensionConfig::default());
        let r = model.compute(Axle::Front, 0.605, 0.6);
        assert!(!r.is_active());
        assert!((r.differential - 0.005).abs() < 1e-6);
    }

    #[test]
    fn correction_is_proportional_and_signed() {
        let model = SuspensionModel::new(SuspensionConfig::default());
        let r = model.compute(Axle::Front, 0.7, 0.5);
        assert!((r.force - 0.2 * 15_000.0).abs() < 1e-1);
        assert!((r.roll_torque - r.force * 1.6).abs() < 1e-1);
        let mirrored = model.compute(Axle::Front, 0.5, 0.7);
        assert!((mirrored.force + r.force).abs() < 1e-3);
    }

    #[test]
    fn rear_axle_uses_its_own_multiplier() {
        let model = SuspensionModel::new(SuspensionConfig::default());
        let front = model.compute(Axle::Front, 0.7, 0.5);
        let rear = model.compute(Axle::Rear, 0.7, 0.5);
        assert!((rear.force / front.force - 0.7).abs() < 1e-5);
    }

    #[test]
    fn update_stores_both_axles() {
        let mut model = SuspensionModel::new(SuspensionConfig::default());
        let (f, r) = model.update((0.6, 0.4), (0.6, 0.6));
        assert!(f.is_active());
        assert!(!r.is_active());
        assert_eq!(model.axle(Axle::Front), f);
        model.reset();
        assert!(!model.axle(Axle::Front).is_active());
        let nan = model.compute(Axle::Rear, f32::NAN, 0.6);
        assert_eq!(nan, AntiRoll::default());
    }
}
