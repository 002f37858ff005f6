// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::{calculate_coefficients_with_rule, PlantParameters, TuningRule};
use crate::error::ConfigError;
use crate::math_integer::controllers::FilterCoefficients;
use crate::math_integer::multiply_shift::MICRO_SCALE;

/// Discrete simulation of a delay-integrator plant.
///
/// Nothing moves until the dead time has elapsed. After that the process value
/// integrates the control value of the previous step, which models the one
/// sample latency of a real actuator.
pub struct DelayIntegratorPlant {
    plant: PlantParameters,
    step_count: u32,
    control: f64, // Control latched on the previous step
    value: f64,
}

impl DelayIntegratorPlant {
    /// # Arguments
    /// * `plant` - Plant description, the same one used for tuning
    /// * `start` - Initial process value
    pub fn new(plant: PlantParameters, start: f64) -> Self {
        Self {
            plant,
            step_count: 0,
            control: 0.0,
            value: start,
        }
    }

    /// Advance the plant by one control period.
    pub fn calculate_step(&mut self, control: f64) {
        self.step_count += 1;
        let time = self.elapsed_seconds();
        if time * MICRO_SCALE < self.plant.delay_us as f64 {
            return;
        }

        self.value += self.plant.slope() * self.control * self.plant.time_step();
        self.control = control;
    }

    /// Current process value
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.plant.time_step() * self.step_count as f64
    }

    pub fn plant(&self) -> &PlantParameters {
        &self.plant
    }

    /// Coefficients tuned for this plant.
    pub fn filter_coefficients(
        &self,
        rule: TuningRule,
        shift_max: u32,
    ) -> Result<FilterCoefficients, ConfigError> {
        calculate_coefficients_with_rule(&self.plant, rule, shift_max)
    }
}
