// Fixed-point PI control building blocks for periodic control loops.

// Key Features:
// - Multiply-shift approximation of real gains for integer-only control math
// - Plant based coefficient calculation (SIMC, Ziegler-Nichols, inverse response)
// - PI filter with trapezoidal integration and overflow-safe accumulator
// - Bounded controller with output clamping and anti-windup state machine
// - Delay-integrator plant model for closed-loop checks of tuned coefficients
// - Phase margin and Bode response of a tuning

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "defmt-rtt")]
use defmt_rtt as _; // Use the defmt_rtt crate for logging via RTT (Real-Time Transfer)

pub mod config;
pub mod error;
pub mod math_integer;
pub mod tuning;

pub use config::ControllerConfig;
pub use error::ConfigError;
pub use math_integer::controllers::{
    BoundedController, ControllerState, FilterCoefficients, FilterLimits, FilterStatus, PiFilter,
};
pub use math_integer::multiply_shift::{multiply_shift_estimate, MultiplyShiftEstimate};
pub use tuning::{
    calculate_coefficients_with_rule, calculate_multiply_shift_coefficients, PlantParameters,
    TuningParameters, TuningRule,
};
pub use tuning::stability::{stability_margins, OpenLoop, StabilityMargins};
