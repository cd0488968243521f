use beamdrive_common::{WHEEL_COUNT, WheelPosition};
use serde::{Deserialize, Serialize};

pub const MIN_TEMPERATURE: f32 = 20.0;
pub const MAX_TEMPERATURE: f32 = 150.0;

/// Tire rubber compound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TireCompound {
    Soft,
    #[default]
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompoundProfile {
    pub grip: f32,
    pub wear_rate: f32,
    pub optimal_temperature: f32,
}

impl TireCompound {
    pub const ALL: [TireCompound; 3] = [TireCompound::Soft, TireCompound::Medium, TireCompound::Hard];

    pub fn profile(self) -> CompoundProfile {
        let (grip, wear_rate, optimal_temperature) = match self {
            TireCompound::Soft => (1.15, 1.6, 85.0),
            TireCompound::Medium => (1.0, 1.0, 75.0),
            TireCompound::Hard => (0.9, 0.6, 65.0),
        };
        CompoundProfile {
            grip,
            wear_rate,
            optimal_temperature,
        }
    }
}

/// Thermal, wear and grip constants shared by all four tires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TireConfig {
    pub ambient_temperature: f32,
    /// Heat gained per unit slip per second.
    pub slip_heating: f32,
    /// Heat gained per m/s of wheel speed per second.
    pub speed_heating: f32,
    /// Fraction of the excess over ambient shed per second.
    pub cooling: f32,
    pub wear_scale: f32,
    pub nominal_pressure: f32,
    pub base_multiplier: f32,
    /// Grip lost per degree away from the compound's optimum.
    pub temperature_sensitivity: f32,
    /// Grip lost per bar away from nominal pressure.
    pub pressure_sensitivity: f32,
    pub min_temperature_factor: f32,
    pub min_wear_factor: f32,
    pub min_pressure_factor: f32,
}

impl Default for TireConfig {
    fn default() -> Self {
        Self {
            ambient_temperature: MIN_TEMPERATURE,
            slip_heating: 50.0,
            speed_heating: 0.2,
            cooling: 0.1,
            wear_scale: 0.01,
            nominal_pressure: 2.2,
            base_multiplier: 2.0,
            temperature_sensitivity: 0.01,
            pressure_sensitivity: 0.2,
            min_temperature_factor: 0.6,
            min_wear_factor: 0.5,
            min_pressure_factor: 0.7,
        }
    }
}

/// What the engine reports about one wheel this tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TireSample {
    /// Slip ratio; only its magnitude matters.
    pub slip: f32,
    /// Rim speed in m/s.
    pub speed: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TireState {
    pub temperature: f32,
    pub wear: f32,
    /// Inflation pressure in bar.
    pub pressure: f32,
    pub compound: TireCompound,
}

impl TireState {
    pub fn new(compound: TireCompound, config: &TireConfig) -> Self {
        Self {
            temperature: config.ambient_temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE),
            wear: 0.0,
            pressure: config.nominal_pressure,
            compound,
        }
    }

    /// Integrate heating, cooling and wear over `dt`.
    pub fn advance(&mut self, sample: TireSample, dt: f32, config: &TireConfig) {
        let slip = finite_or_zero(sample.slip).abs().min(1.0);
        let speed = finite_or_zero(sample.speed).abs();
        let dt = finite_or_zero(dt).max(0.0);

        let heat_gain = slip * config.slip_heating + speed * config.speed_heating;
        let cooling = (self.temperature - config.ambient_temperature) * config.cooling;
        self.temperature = (self.temperature + (heat_gain - cooling) * dt)
            .clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);

        let wear_rate = self.compound.profile().wear_rate;
        let wear_gain =
            slip * wear_rate * (1.0 + self.temperature / 100.0) * dt * config.wear_scale;
        self.wear = (self.wear + wear_gain.max(0.0)).clamp(0.0, 1.0);
    }

    /// Friction coefficient handed to the engine's wheel.
    pub fn friction(&self, config: &TireConfig) -> f32 {
        let profile = self.compound.profile();
        let temperature_factor = (1.0
            - (self.temperature - profile.optimal_temperature).abs() * config.temperature_sensitivity)
            .max(config.min_temperature_factor);
        let wear_factor = (1.0 - self.wear).max(config.min_wear_factor);
        let pressure_factor = (1.0
            - (self.pressure - config.nominal_pressure).abs() * config.pressure_sensitivity)
            .max(config.min_pressure_factor);
        profile.grip * temperature_factor * wear_factor * pressure_factor * config.base_multiplier
    }
}

/// Four tires with shared constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TireModel {
    config: TireConfig,
    tires: [TireState; WHEEL_COUNT],
}

impl TireModel {
    pub fn new(config: TireConfig, compound: TireCompound) -> Self {
        Self {
            tires: [TireState::new(compound, &config); WHEEL_COUNT],
            config,
        }
    }

    pub fn config(&self) -> &TireConfig {
        &self.config
    }

    /// Advance one tire and return its new friction coefficient.
    pub fn update(&mut self, wheel: WheelPosition, sample: TireSample, dt: f32) -> f32 {
        let tire = &mut self.tires[wheel.index()];
        tire.advance(sample, dt, &self.config);
        tire.friction(&self.config)
    }

    pub fn update_all(&mut self, samples: &[TireSample; WHEEL_COUNT], dt: f32) -> [f32; WHEEL_COUNT] {
        WheelPosition::ALL.map(|w| self.update(w, samples[w.index()], dt))
    }

    pub fn tire(&self, wheel: WheelPosition) -> &TireState {
        &self.tires[wheel.index()]
    }

    pub fn friction(&self, wheel: WheelPosition) -> f32 {
        self.tires[wheel.index()].friction(&self.config)
    }

    pub fn temperatures(&self) -> [f32; WHEEL_COUNT] {
        self.tires.map(|t| t.temperature)
    }

    pub fn wear(&self) -> [f32; WHEEL_COUNT] {
        self.tires.map(|t| t.wear)
    }

    /// Fit a new set of tires: every wear counter goes back to zero.
    pub fn set_compound(&mut self, compound: TireCompound) {
        for tire in &mut self.tires {
            tire.compound = compound;
            tire.wear = 0.0;
        }
        tracing::debug!(?compound, "tire compound changed");
    }

    /// Pressure in bar. Non-finite or negative values are ignored.
    pub fn set_pressure(&mut self, wheel: WheelPosition, pressure: f32) {
        if pressure.is_finite() && pressure >= 0.0 {
            self.tires[wheel.index()].pressure = pressure;
        }
    }

    /// Back to fresh, ambient-temperature tires of the current compound.
    pub fn reset(&mut self) {
        let config = self.config;
        for tire in &mut self.tires {
            *tire = TireState::new(tire.compound, &config);
        }
    }
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() { v } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medium_at_optimum_gives_full_grip() {
        let config = TireConfig::default();
        let tire = TireState {
            temperature: 75.0,
            wear: 0.0,
            pressure: 2.2,
            compound: TireCompound::Medium,
        };
        let expected = TireCompound::Medium.profile().grip * config.base_multiplier;
        assert!((tire.friction(&config) - expected).abs() < 1e-5);
    }

    #[test]
    fn friction_factors_have_floors() {
        let config = TireConfig::default();
        let tire = TireState {
            temperature: 150.0,
            wear: 1.0,
            pressure: 10.0,
            compound: TireCompound::Hard,
        };
        let floor = 0.9 * 0.6 * 0.5 * 0.7 * config.base_multiplier;
        assert!((tire.friction(&config) - floor).abs() < 1e-5);
    }

    #[test]
    fn temperature_and_wear_stay_bounded() {
        let config = TireConfig::default();
        let mut tire = TireState::new(TireCompound::Soft, &config);
        let inputs = [0.0, 1.0, 5.0, -3.0, f32::NAN, f32::INFINITY, 0.5];
        for step in 0..20_000 {
            let slip = inputs[step % inputs.len()];
            let speed = inputs[(step + 3) % inputs.len()] * 100.0;
            tire.advance(TireSample { slip, speed }, 0.05, &config);
            assert!((MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&tire.temperature));
            assert!((0.0..=1.0).contains(&tire.wear));
        }
        assert!(tire.temperature > MIN_TEMPERATURE);
        assert!(tire.wear > 0.0);
    }

    #[test]
    fn wear_never_decreases() {
        let config = TireConfig::default();
        let mut tire = TireState::new(TireCompound::Medium, &config);
        let mut last = 0.0;
        for i in 0..500 {
            let slip = if i % 2 == 0 { 0.8 } else { 0.0 };
            tire.advance(TireSample { slip, speed: 20.0 }, 1.0 / 60.0, &config);
            assert!(tire.wear >= last);
            last = tire.wear;
        }
    }

    #[test]
    fn idle_tire_cools_to_ambient() {
        let config = TireConfig::default();
        let mut tire = TireState::new(TireCompound::Medium, &config);
        tire.temperature = 120.0;
        for _ in 0..6000 {
            tire.advance(TireSample::default(), 1.0 / 60.0, &config);
        }
        assert!(tire.temperature < 21.0);
    }

    #[test]
    fn compound_change_resets_wear_only() {
        let mut model = TireModel::new(TireConfig::default(), TireCompound::Medium);
        let samples = [TireSample { slip: 1.0, speed: 30.0 }; WHEEL_COUNT];
        for _ in 0..120 {
            model.update_all(&samples, 1.0 / 60.0);
        }
        let hot = model.temperatures();
        assert!(model.wear().iter().all(|w| *w > 0.0));
        model.set_compound(TireCompound::Soft);
        assert_eq!(model.wear(), [0.0; WHEEL_COUNT]);
        assert_eq!(model.temperatures(), hot);
        assert_eq!(model.tire(WheelPosition::RearLeft).compound, TireCompound::Soft);
    }

    #[test]
    fn underinflated_tire_loses_grip() {
        let mut model = TireModel::new(TireConfig::default(), TireCompound::Medium);
        let nominal = model.friction(WheelPosition::FrontLeft);
        model.set_pressure(WheelPosition::FrontLeft, 1.4);
        model.set_pressure(WheelPosition::FrontRight, f32::NAN);
        assert!(model.friction(WheelPosition::FrontLeft) < nominal);
        assert_eq!(model.tire(WheelPosition::FrontRight).pressure, 2.2);
    }

    #[test]
    fn reset_restores_fresh_tires() {
        let mut model = TireModel::new(TireConfig::default(), TireCompound::Hard);
        model.update(WheelPosition::RearRight, TireSample { slip: 1.0, speed: 50.0 }, 0.5);
        model.reset();
        assert_eq!(model, TireModel::new(TireConfig::default(), TireCompound::Hard));
    }

    #[test]
    fn compound_serializes_snake_case() {
        let json = serde_json::to_string(&TireCompound::Soft).unwrap();
        assert_eq!(json, "\"soft\"");
    }
}
