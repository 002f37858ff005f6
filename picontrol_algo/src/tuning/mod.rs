// Calculates PI filter coefficients from a delay-integrator plant description.

// Key Features:
// - Plant given by delay, slope and update rate in micro units
// - SIMC tuning by default, Ziegler-Nichols and inverse response as alternatives
// - Real gains converted to multiply-shift pairs for the integer filter
// - Unrepresentable gains are reported before any control loop starts
// - Phase margin of the tuned loop from its open loop frequency response

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

pub mod plant_model;
pub mod stability;

use crate::config::SHIFT_MAX_LIMIT;
use crate::error::ConfigError;
use crate::math_integer::controllers::FilterCoefficients;
use crate::math_integer::multiply_shift::{multiply_shift_estimate, to_micro, MICRO_SCALE};

/// SIMC integral time factor (Ti = alpha * delay)
const SIMC_ALPHA: f64 = 16.0;
/// SIMC proportional factor (Kp = beta / (2 * slope * delay))
const SIMC_BETA: f64 = 0.4;

const ZIEGLER_NICHOLS_ALPHA: f64 = 0.714;
const ZIEGLER_NICHOLS_BETA: f64 = 3.33;

/// Inverse response tuning constant
const INVERSE_RESPONSE_C: f64 = 2.75;

/// Delay-integrator plant description.
///
/// The process value changes by `slope * actuator` per second once the delay has passed.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlantParameters {
    /// Dead time [us]
    pub delay_us: i64,
    /// Process units per second per actuator unit, scaled by 1e6
    pub slope_micro: i64,
    /// Control loop update rate [Hz]
    pub update_rate_hz: i64,
}

impl PlantParameters {
    pub const fn new(delay_us: i64, slope_micro: i64, update_rate_hz: i64) -> Self {
        Self {
            delay_us,
            slope_micro,
            update_rate_hz,
        }
    }

    /// Build from engineering units.
    ///
    /// # Arguments
    /// * `delay_s` - Dead time [s]
    /// * `slope` - Process units per second per actuator unit
    /// * `update_rate_hz` - Control loop update rate [Hz]
    pub fn from_engineering(delay_s: f64, slope: f64, update_rate_hz: i64) -> Self {
        Self::new(to_micro(delay_s), to_micro(slope), update_rate_hz)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.delay_us <= 0 || self.slope_micro == 0 || self.update_rate_hz <= 0 {
            return Err(ConfigError::InvalidPlant);
        }
        Ok(())
    }

    #[inline]
    pub fn delay_seconds(&self) -> f64 {
        self.delay_us as f64 / MICRO_SCALE
    }

    #[inline]
    pub fn slope(&self) -> f64 {
        self.slope_micro as f64 / MICRO_SCALE
    }

    /// Seconds per control step
    #[inline]
    pub fn time_step(&self) -> f64 {
        1.0 / self.update_rate_hz as f64
    }
}

/// Real valued PI gains, `ki` already divided by the update rate.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TuningParameters {
    pub ki: f64,
    pub kp: f64,
    /// Integral time [s]
    pub ti: f64,
}

/// Tuning heuristic for a first-order delay-integrator plant.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TuningRule {
    /// Skogestad IMC rule, conservative and the default
    #[default]
    Simc,
    /// Ziegler-Nichols, faster with less margin
    ZieglerNichols,
    /// Inverse response rule
    InverseResponse,
}

impl TuningRule {
    pub const ALL: [TuningRule; 3] = [
        TuningRule::Simc,
        TuningRule::ZieglerNichols,
        TuningRule::InverseResponse,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TuningRule::Simc => "SIMC",
            TuningRule::ZieglerNichols => "Ziegler-Nichols",
            TuningRule::InverseResponse => "Inverse response",
        }
    }

    /// Compute `(Ki, Kp)` for the plant. The plant must be valid.
    pub fn gains(&self, plant: &PlantParameters) -> TuningParameters {
        let delay = plant.delay_seconds();
        let slope = plant.slope();

        let (kp, ti) = match self {
            TuningRule::Simc => (SIMC_BETA / (2.0 * slope * delay), SIMC_ALPHA * delay),
            TuningRule::ZieglerNichols => (
                ZIEGLER_NICHOLS_ALPHA / (slope * delay),
                ZIEGLER_NICHOLS_BETA * delay,
            ),
            TuningRule::InverseResponse => {
                let c = INVERSE_RESPONSE_C;
                let c_sq = (c + 1.0) * (c + 1.0);
                ((2.0 * c + 1.0) / (slope * delay * c_sq), (2.0 * c + 1.0) * delay)
            }
        };
        let ki = (kp / ti) / plant.update_rate_hz as f64;
        TuningParameters { ki, kp, ti }
    }
}

/// SIMC gains for the plant.
pub fn simc_tuning(plant: &PlantParameters) -> TuningParameters {
    TuningRule::Simc.gains(plant)
}

/// SIMC tuned filter coefficients.
///
/// # Arguments
/// * `plant` - Plant description
/// * `shift_max` - Shift resolution, multipliers are bounded by `2^shift_max`
pub fn calculate_multiply_shift_coefficients(
    plant: &PlantParameters,
    shift_max: u32,
) -> Result<FilterCoefficients, ConfigError> {
    calculate_coefficients_with_rule(plant, TuningRule::Simc, shift_max)
}

/// Filter coefficients for the plant with the given tuning rule.
pub fn calculate_coefficients_with_rule(
    plant: &PlantParameters,
    rule: TuningRule,
    shift_max: u32,
) -> Result<FilterCoefficients, ConfigError> {
    plant.validate()?;
    if shift_max == 0 || shift_max > SHIFT_MAX_LIMIT {
        return Err(ConfigError::ShiftOutOfRange(shift_max as i32));
    }

    let tuning = rule.gains(plant);
    let multiplier_max = 1i32 << shift_max;
    let ki = multiply_shift_estimate(tuning.ki, multiplier_max, shift_max);
    let kp = multiply_shift_estimate(tuning.kp, multiplier_max, shift_max);

    if !kp.is_representable() || !ki.is_representable() {
        #[cfg(feature = "defmt")]
        defmt::error!(
            "TUNING: {} gains not representable at shift {} (kp {}, ki {})",
            rule,
            shift_max,
            kp,
            ki
        );
        return Err(ConfigError::UnrepresentableGain);
    }

    #[cfg(feature = "defmt")]
    defmt::debug!("TUNING: {} kp {} -> {}, ki {} -> {}", rule, tuning.kp, kp, tuning.ki, ki);

    Ok(FilterCoefficients::new(
        kp.shift,
        ki.shift,
        kp.multiplier,
        ki.multiplier,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SHIFT_MAX;
    use approx::assert_relative_eq;

    // 1.1 s dead time, 0.6 units/s per actuator unit, 100 Hz loop
    const PLANT: PlantParameters = PlantParameters::new(1_100_000, 600_000, 100);

    #[test]
    fn engineering_units_convert_to_micro() {
        assert_eq!(PlantParameters::from_engineering(1.1, 0.6, 100), PLANT);
        assert_relative_eq!(PLANT.delay_seconds(), 1.1);
        assert_relative_eq!(PLANT.slope(), 0.6);
        assert_relative_eq!(PLANT.time_step(), 0.01);
    }

    #[test]
    fn simc_gains() {
        let tuning = simc_tuning(&PLANT);
        assert_relative_eq!(tuning.kp, 0.4 / (2.0 * 0.6 * 1.1), max_relative = 1e-12);
        assert_relative_eq!(tuning.ti, 16.0 * 1.1, max_relative = 1e-12);
        assert_relative_eq!(tuning.ki, tuning.kp / tuning.ti / 100.0, max_relative = 1e-12);
    }

    #[test]
    fn simc_coefficients_are_representable() {
        let coeffs = calculate_multiply_shift_coefficients(&PLANT, DEFAULT_SHIFT_MAX).unwrap();
        assert_eq!(coeffs, FilterCoefficients::new(12, 13, 1241, 1));
        assert!(coeffs.validate().is_ok());
        assert_relative_eq!(coeffs.proportional_gain(), 0.303, max_relative = 1e-3);
    }

    #[test]
    fn alternative_rules() {
        let zn = calculate_coefficients_with_rule(&PLANT, TuningRule::ZieglerNichols, DEFAULT_SHIFT_MAX).unwrap();
        assert_eq!(zn, FilterCoefficients::new(12, 10, 4431, 3));

        let inverse =
            calculate_coefficients_with_rule(&PLANT, TuningRule::InverseResponse, DEFAULT_SHIFT_MAX).unwrap();
        assert_eq!(inverse, FilterCoefficients::new(13, 10, 5737, 1));

        // Ziegler-Nichols is the most aggressive of the three
        let simc = simc_tuning(&PLANT);
        let zn = TuningRule::ZieglerNichols.gains(&PLANT);
        assert!(zn.kp > simc.kp && zn.ki > simc.ki);
    }

    #[test]
    fn negative_slope_gives_negative_multipliers() {
        let plant = PlantParameters::new(1_100_000, -600_000, 100);
        let coeffs = calculate_multiply_shift_coefficients(&plant, DEFAULT_SHIFT_MAX).unwrap();
        assert_eq!(coeffs, FilterCoefficients::new(12, 13, -1241, -1));
    }

    #[test]
    fn invalid_plant_is_rejected() {
        for plant in [
            PlantParameters::new(0, 600_000, 100),
            PlantParameters::new(1_100_000, 0, 100),
            PlantParameters::new(1_100_000, 600_000, 0),
            PlantParameters::new(-1, 600_000, 100),
        ] {
            assert_eq!(
                calculate_multiply_shift_coefficients(&plant, DEFAULT_SHIFT_MAX),
                Err(ConfigError::InvalidPlant)
            );
        }
    }

    #[test]
    fn shift_resolution_is_bounded() {
        assert_eq!(
            calculate_multiply_shift_coefficients(&PLANT, 0),
            Err(ConfigError::ShiftOutOfRange(0))
        );
        assert_eq!(
            calculate_multiply_shift_coefficients(&PLANT, 31),
            Err(ConfigError::ShiftOutOfRange(31))
        );
    }

    #[test]
    fn tiny_integral_gain_is_unrepresentable() {
        // Ki ~ 1.25e-11 per step, far below 2^-13
        let plant = PlantParameters::new(1_000_000_000, 1_000_000, 1000);
        assert_eq!(
            calculate_multiply_shift_coefficients(&plant, DEFAULT_SHIFT_MAX),
            Err(ConfigError::UnrepresentableGain)
        );
    }

    #[test]
    fn coarse_resolution_can_lose_the_integral_gain() {
        // Ki ~ 1.7e-4 needs at least 2^13 to round to a nonzero multiplier
        assert_eq!(
            calculate_multiply_shift_coefficients(&PLANT, 8),
            Err(ConfigError::UnrepresentableGain)
        );
    }
}
