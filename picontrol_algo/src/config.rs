//! Startup configuration of the controller and tuning defaults.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::error::ConfigError;
use crate::math_integer::controllers::{FilterCoefficients, FilterLimits};
use crate::tuning::{calculate_coefficients_with_rule, PlantParameters, TuningRule};

/// Default shift resolution for tuned coefficients (multipliers up to 2^14)
pub const DEFAULT_SHIFT_MAX: u32 = 14;

/// Largest shift resolution the calculator accepts, keeps `2^shift_max` in i32
pub const SHIFT_MAX_LIMIT: u32 = 30;

/// Default symmetric output limit in actuator units
pub const DEFAULT_OUTPUT_LIMIT: i32 = 3_000_000;

/// Default output limits (±DEFAULT_OUTPUT_LIMIT)
pub const DEFAULT_LIMITS: FilterLimits = FilterLimits::new(-DEFAULT_OUTPUT_LIMIT, DEFAULT_OUTPUT_LIMIT);

/// Everything a `BoundedController` needs at startup.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    pub setpoint: i32,
    pub coefficients: FilterCoefficients,
    pub limits: FilterLimits,
}

impl ControllerConfig {
    pub const fn new(setpoint: i32, coefficients: FilterCoefficients, limits: FilterLimits) -> Self {
        Self {
            setpoint,
            coefficients,
            limits,
        }
    }

    /// Tune coefficients for a plant and bundle them with setpoint and limits.
    pub fn from_plant(
        plant: &PlantParameters,
        rule: TuningRule,
        setpoint: i32,
        limits: FilterLimits,
        shift_max: u32,
    ) -> Result<Self, ConfigError> {
        let coefficients = calculate_coefficients_with_rule(plant, rule, shift_max)?;
        Ok(Self::new(setpoint, coefficients, limits))
    }

    /// Limits are ordered by construction, only the coefficients need checking.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.coefficients.validate()
    }
}
