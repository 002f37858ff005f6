// Implements the bounded PI controller: output clamping plus an anti-windup
// state machine around `PiFilter`.

// Detailed Operation:
// Every `run_filter` call first applies the external current-limit flag, then
// runs the filter with the integral active (Bootup, Normal) or frozen
// (CurrentLimit, SoftwareLimit). The result is clamped to the configured limits
// and the clamp outcome decides the state for the next call. A current limit
// therefore only lasts as long as the caller keeps asserting it.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use super::pi_filter::{FilterCoefficients, FilterStatus, PiFilter};
use crate::config::ControllerConfig;
use crate::error::ConfigError;

/// Controller operating state
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ControllerState {
    /// Fresh or reset controller, integrates like Normal so the filter primes itself
    #[default]
    Bootup,
    /// Closed loop with integral active
    Normal,
    /// Actuator current limit reported by the caller, integral frozen
    CurrentLimit,
    /// Output clamped to the limits, integral frozen
    SoftwareLimit,
}

/// Output bounds of a controller, `low <= high`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FilterLimits {
    low: i32,
    high: i32,
}

impl FilterLimits {
    /// Panics when `low > high`, in a const context this fails the build.
    pub const fn new(low: i32, high: i32) -> Self {
        assert!(low <= high, "FilterLimits: low > high");
        Self { low, high }
    }

    pub const fn try_new(low: i32, high: i32) -> Result<Self, ConfigError> {
        if low > high {
            return Err(ConfigError::InvertedLimits { low, high });
        }
        Ok(Self { low, high })
    }

    #[inline(always)]
    pub const fn low(&self) -> i32 {
        self.low
    }

    #[inline(always)]
    pub const fn high(&self) -> i32 {
        self.high
    }

    /// Clamp a value into the limits.
    ///
    /// # Returns
    /// `(clamped value, true if the value was outside the limits)`
    #[inline]
    pub const fn clamp(&self, value: i32) -> (i32, bool) {
        if value > self.high {
            (self.high, true)
        } else if value < self.low {
            (self.low, true)
        } else {
            (value, false)
        }
    }
}

/// PI filter with clamped output and anti-windup.
pub struct BoundedController {
    state: ControllerState,
    filter: PiFilter,
    limits: FilterLimits,
}

impl BoundedController {
    /// Create a controller, panics on invalid coefficients.
    pub fn new(setpoint: i32, coeffs: FilterCoefficients, limits: FilterLimits) -> Self {
        Self {
            state: ControllerState::Bootup,
            filter: PiFilter::new(setpoint, coeffs),
            limits,
        }
    }

    pub fn try_new(
        setpoint: i32,
        coeffs: FilterCoefficients,
        limits: FilterLimits,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            state: ControllerState::Bootup,
            filter: PiFilter::try_new(setpoint, coeffs)?,
            limits,
        })
    }

    /// Create a controller from a startup configuration.
    pub fn from_config(config: &ControllerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::try_new(config.setpoint, config.coefficients, config.limits)
    }

    /// Run one control cycle.
    ///
    /// # Arguments
    /// * `process_variable` - Measured process value
    /// * `current_limit` - Actuator reports current limiting for this cycle
    ///
    /// # Returns
    /// Control value clamped to the controller limits.
    pub fn run_filter(&mut self, process_variable: i32, current_limit: bool) -> i32 {
        if current_limit {
            self.set_state(ControllerState::CurrentLimit);
        }

        let control = match self.state {
            ControllerState::Bootup | ControllerState::Normal => self.filter.run(process_variable),
            // Don't alter the integral, prevents windup
            ControllerState::CurrentLimit | ControllerState::SoftwareLimit => {
                self.filter.run_proportional(process_variable)
            }
        };

        let (control, clamped) = self.limits.clamp(control);
        if clamped {
            self.set_state(ControllerState::SoftwareLimit);
        } else {
            self.set_state(ControllerState::Normal);
        }
        control
    }

    /// Clear the filter and return to Bootup.
    pub fn reset(&mut self) {
        self.filter.clear();
        self.set_state(ControllerState::Bootup);
    }

    pub fn set_setpoint(&mut self, setpoint: i32) {
        self.filter.set_setpoint(setpoint);
    }

    pub fn setpoint(&self) -> i32 {
        self.filter.setpoint()
    }

    pub fn set_filter_coefficients(&mut self, coeffs: FilterCoefficients) -> Result<(), ConfigError> {
        self.filter.set_filter_coefficients(coeffs)
    }

    pub fn filter_status(&self) -> FilterStatus {
        self.filter.filter_status()
    }

    #[inline(always)]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    #[inline(always)]
    pub fn limits(&self) -> FilterLimits {
        self.limits
    }

    fn set_state(&mut self, state: ControllerState) {
        if self.state != state {
            #[cfg(feature = "defmt")]
            defmt::debug!("CONTROLLER: {} -> {}", self.state, state);
        }
        self.state = state;
    }
}
