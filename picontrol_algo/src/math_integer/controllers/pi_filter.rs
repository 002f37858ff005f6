// Implements the fixed-point PI filter used by the bounded controller.

// Key Features:
// - Gains stored as multiply-shift pairs, no floating point on the hot path
// - Trapezoidal integration with the accumulator holding twice the integral
// - 64-bit intermediate math, fail-fast narrowing of the control value
// - Accumulator overflow resets the integral instead of wrapping

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use crate::error::ConfigError;

/// Largest shift accepted for either gain.
pub const SHIFT_LIMIT: i32 = 31;

/// Gain coefficients as multiply-shift pairs.
///
/// **Note**
/// - `Kp = mult_p >> shift_p`, `Ki = mult_i >> shift_i`
/// - Shifts are arithmetic, negative products round towards minus infinity
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FilterCoefficients {
    pub shift_p: i32,
    pub shift_i: i32,
    pub mult_p: i32,
    pub mult_i: i32,
}

impl FilterCoefficients {
    pub const fn new(shift_p: i32, shift_i: i32, mult_p: i32, mult_i: i32) -> Self {
        Self {
            shift_p,
            shift_i,
            mult_p,
            mult_i,
        }
    }

    /// Check the invariants the filter relies on.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.mult_p == 0 {
            return Err(ConfigError::ZeroProportionalMultiplier);
        }
        if self.mult_i == 0 {
            return Err(ConfigError::ZeroIntegralMultiplier);
        }
        if self.shift_p < 0 || self.shift_p > SHIFT_LIMIT {
            return Err(ConfigError::ShiftOutOfRange(self.shift_p));
        }
        if self.shift_i < 0 || self.shift_i > SHIFT_LIMIT {
            return Err(ConfigError::ShiftOutOfRange(self.shift_i));
        }
        Ok(())
    }

    /// Real proportional gain the pair represents.
    pub fn proportional_gain(&self) -> f64 {
        self.mult_p as f64 * libm::exp2(-(self.shift_p as f64))
    }

    /// Real integral gain (per sample) the pair represents.
    pub fn integral_gain(&self) -> f64 {
        self.mult_i as f64 * libm::exp2(-(self.shift_i as f64))
    }
}

/// Diagnostic snapshot of a [`PiFilter`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FilterStatus {
    pub coefficients: FilterCoefficients,
    pub setpoint: i32,
    /// Raw accumulator, twice the trapezoidal integral
    pub integral: i32,
    pub proportional_error: i32,
    pub control: i32,
}

/// Fixed-point PI filter with trapezoidal integration.
///
/// **Note**
/// - Works with constant dt only, the sample period is folded into `Ki`
/// - Negative feedback: a process value above the setpoint gives a negative control
/// - Calls must be strictly sequential, the integral depends on the previous sample
pub struct PiFilter {
    coeffs: FilterCoefficients,

    /// Twice the integral, halved only where it is used
    integral: i32,
    /// Current error (process variable - setpoint)
    error_now: i32,
    /// Previous error, second sample of the trapezoid
    error_prev: i32,
    control: i32,
    setpoint: i32,
}

impl PiFilter {
    /// Create a filter, panics on invalid coefficients.
    ///
    /// Intended for startup code where a bad tuning must stop the firmware
    /// before any control loop runs. Use [`PiFilter::try_new`] to handle the error.
    pub fn new(setpoint: i32, coeffs: FilterCoefficients) -> Self {
        match Self::try_new(setpoint, coeffs) {
            Ok(filter) => filter,
            Err(_) => panic!("PI FILTER: invalid coefficients"),
        }
    }

    /// Create a filter after validating the coefficients.
    pub fn try_new(setpoint: i32, coeffs: FilterCoefficients) -> Result<Self, ConfigError> {
        if let Err(err) = coeffs.validate() {
            #[cfg(feature = "defmt")]
            defmt::error!("PI FILTER: rejected coefficients {}: {}", coeffs, err);
            return Err(err);
        }
        Ok(Self {
            coeffs,
            integral: 0,
            error_now: 0,
            error_prev: 0,
            control: 0,
            setpoint,
        })
    }

    /// Full PI step: update the error window and the integral, then compute control.
    ///
    /// # Panics
    /// When the control value does not fit in `i32`, which means the gains
    /// leave no headroom for the input range.
    pub fn run(&mut self, process_variable: i32) -> i32 {
        self.make_proportional(process_variable);
        self.make_integral();
        self.control = self.make_control();
        self.control
    }

    /// Proportional step, the integral keeps its current value.
    ///
    /// Used while the output is saturated so the integral does not wind up.
    pub fn run_proportional(&mut self, process_variable: i32) -> i32 {
        self.make_proportional(process_variable);
        self.control = self.make_control();
        self.control
    }

    /// Change the setpoint, accumulated history no longer applies and is cleared.
    pub fn set_setpoint(&mut self, setpoint: i32) {
        self.setpoint = setpoint;
        self.clear();
    }

    #[inline(always)]
    pub fn setpoint(&self) -> i32 {
        self.setpoint
    }

    /// Clears error samples, integral and control.
    pub fn clear(&mut self) {
        self.integral = 0;
        self.control = 0;
        self.error_now = 0;
        self.error_prev = 0;
    }

    /// Replace the coefficients, state is kept.
    pub fn set_filter_coefficients(&mut self, coeffs: FilterCoefficients) -> Result<(), ConfigError> {
        coeffs.validate()?;
        self.coeffs = coeffs;
        Ok(())
    }

    #[inline(always)]
    pub fn filter_coefficients(&self) -> FilterCoefficients {
        self.coeffs
    }

    pub fn filter_status(&self) -> FilterStatus {
        FilterStatus {
            coefficients: self.coeffs,
            setpoint: self.setpoint,
            integral: self.integral,
            proportional_error: self.error_now,
            control: self.control,
        }
    }

    /// Last computed control value.
    #[inline(always)]
    pub fn control(&self) -> i32 {
        self.control
    }

    /// Trapezoidal integral (accumulator halved, truncating).
    #[inline(always)]
    pub fn integral_value(&self) -> i32 {
        self.integral / 2
    }

    #[inline(always)]
    pub fn proportional_error(&self) -> i32 {
        self.error_now
    }

    fn make_proportional(&mut self, process_variable: i32) {
        self.error_prev = self.error_now;
        self.error_now = process_variable.saturating_sub(self.setpoint);
    }

    fn make_integral(&mut self) {
        // Trapezoid rule, this is 2x the integral. No divide by 2 until used.
        let integral = self.integral as i64 + self.error_now as i64 + self.error_prev as i64;
        self.integral = match i32::try_from(integral) {
            Ok(integral) => integral,
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("PI FILTER: integral overflow, accumulator reset");
                0
            }
        };
    }

    fn make_control(&self) -> i32 {
        // Ki = mult_i >> shift_i, Kp = mult_p >> shift_p
        // control = -(Ki * integral + Kp * error), 64 bit costs only a few cycles
        let integral_term = (self.integral_value() as i64 * self.coeffs.mult_i as i64) >> self.coeffs.shift_i;
        let proportional_term = (self.error_now as i64 * self.coeffs.mult_p as i64) >> self.coeffs.shift_p;

        let control = -(integral_term + proportional_term);
        match i32::try_from(control) {
            Ok(control) => control,
            Err(_) => panic!("PI FILTER: control value out of i32 range"),
        }
    }
}
