// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

/// Scale used for micro-unit values and approximation errors.
pub const MICRO_SCALE: f64 = 1_000_000.0;

/// Integer approximation of a real value as `multiplier >> shift`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MultiplyShiftEstimate {
    /// Signed multiplier, zero when the value is not representable
    pub multiplier: i32,
    /// Right shift applied after multiplication
    pub shift: i32,
    /// Absolute approximation error scaled by 1e6
    pub error_micro: i64,
}

impl MultiplyShiftEstimate {
    /// Apply the approximated gain to an integer value: `(value * multiplier) >> shift`.
    #[inline(always)]
    pub fn apply(&self, value: i64) -> i64 {
        (value * self.multiplier as i64) >> self.shift
    }

    /// Real value this pair stands for.
    pub fn approximation(&self) -> f64 {
        self.multiplier as f64 * libm::exp2(-(self.shift as f64))
    }

    /// True when the search found a usable multiplier.
    pub fn is_representable(&self) -> bool {
        self.multiplier != 0
    }
}

/// Convert a value to micro units, rounding half away from zero.
pub fn to_micro(value: f64) -> i64 {
    libm::round(value * MICRO_SCALE) as i64
}

/// Find `(multiplier, shift)` so that `multiplier >> shift` approximates `value`.
///
/// # Arguments
/// * `value` - Real value to approximate, sign is carried by the multiplier
/// * `multiplier_max` - Largest allowed magnitude of the multiplier
/// * `shift_max` - Shifts `0..shift_max` are searched
///
/// # Returns
/// The candidate with the smallest micro-scaled error. Ties keep the smaller
/// shift. A multiplier of 0 means no candidate beat the error of having no gain.
pub fn multiply_shift_estimate(
    value: f64,
    multiplier_max: i32,
    shift_max: u32,
) -> MultiplyShiftEstimate {
    let abs_value = libm::fabs(value);
    let multiplier_max = multiplier_max as f64;

    let mut multiplier: i32 = 0;
    let mut shift: i32 = 0;
    // Error of multiplier 0, every candidate has to improve on it
    let mut best_diff = MICRO_SCALE * abs_value;

    for i in 0..shift_max {
        let value_shift = libm::round(abs_value * libm::exp2(i as f64));
        // Magnitude only grows with the shift, no later candidate fits either
        if value_shift > multiplier_max {
            break;
        }
        let approx_value = value_shift * libm::exp2(-(i as f64));
        let diff = MICRO_SCALE * libm::fabs(abs_value - approx_value);
        if diff < best_diff {
            multiplier = value_shift as i32;
            shift = i as i32;
            best_diff = diff;
        }
    }

    if value < 0.0 {
        multiplier = -multiplier;
    }

    MultiplyShiftEstimate {
        multiplier,
        shift,
        error_micro: libm::round(best_diff) as i64,
    }
}
