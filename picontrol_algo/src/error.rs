// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

#[cfg(feature = "std")]
use thiserror::Error;

/// Startup configuration errors.
///
/// None of these are runtime conditions: a control loop must not be started
/// with a configuration that produced one of them.
#[cfg_attr(feature = "std", derive(Error))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Proportional multiplier is zero, the gain would vanish.
    #[cfg_attr(feature = "std", error("proportional multiplier is zero"))]
    ZeroProportionalMultiplier,

    /// Integral multiplier is zero, the gain would vanish.
    #[cfg_attr(feature = "std", error("integral multiplier is zero"))]
    ZeroIntegralMultiplier,

    /// A shift is outside the range the fixed-point math supports.
    #[cfg_attr(feature = "std", error("shift {0} is out of range"))]
    ShiftOutOfRange(i32),

    /// Output limits have `low > high`.
    #[cfg_attr(feature = "std", error("output limits are inverted ({low} > {high})"))]
    InvertedLimits { low: i32, high: i32 },

    /// Delay or update rate is not positive, or the slope is zero.
    #[cfg_attr(feature = "std", error("plant parameters are not usable for tuning"))]
    InvalidPlant,

    /// A tuned gain rounds to a zero multiplier at the requested shift resolution.
    #[cfg_attr(
        feature = "std",
        error("gain cannot be represented as multiply-shift at the requested resolution")
    )]
    UnrepresentableGain,
}
