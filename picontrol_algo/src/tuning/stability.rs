// Frequency response of the tuned loop and its phase margin.

// Detailed Operation:
// The loop is the continuous PI controller in series with the delay-integrator
// plant, L(jw) = k * e^(-jw*delay) * (Ti*jw + 1) / (Ti * (jw)^2) with
// k = slope * Kp. Every tuning rule puts 1/slope into Kp, so k > 0 and the
// phase is -180 + atan(w*Ti) - w*delay degrees. |L| falls monotonically with w,
// which gives a single gain crossover with a closed form solution.

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

use core::f64::consts::PI;

use super::{PlantParameters, TuningParameters, TuningRule};
use crate::error::ConfigError;

/// One point of the open loop Bode response.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrequencyPoint {
    /// Angular frequency [rad/s]
    pub omega: f64,
    pub magnitude_db: f64,
    pub phase_deg: f64,
}

impl FrequencyPoint {
    #[inline]
    pub fn frequency_hz(&self) -> f64 {
        self.omega / (2.0 * PI)
    }
}

/// Stability summary of a tuned loop.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StabilityMargins {
    /// Gain crossover frequency [Hz]
    pub crossover_hz: f64,
    /// 180 + phase at the gain crossover [deg]
    pub phase_margin_deg: f64,
    /// Largest 180 + phase over all frequencies [deg]
    pub max_phase_margin_deg: f64,
}

/// Continuous open loop of a PI controller around a delay-integrator plant.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OpenLoop {
    loop_gain: f64, // slope * Kp
    ti: f64,
    delay: f64,
}

impl OpenLoop {
    pub fn new(plant: &PlantParameters, tuning: &TuningParameters) -> Self {
        Self {
            loop_gain: plant.slope() * tuning.kp,
            ti: tuning.ti,
            delay: plant.delay_seconds(),
        }
    }

    /// Open loop response at `omega` [rad/s], `omega > 0`.
    pub fn response(&self, omega: f64) -> FrequencyPoint {
        let lead = omega * self.ti;
        let magnitude = libm::fabs(self.loop_gain) * libm::sqrt(1.0 + lead * lead) / (self.ti * omega * omega);
        FrequencyPoint {
            omega,
            magnitude_db: 20.0 * libm::log10(magnitude),
            phase_deg: -180.0 + self.phase_lead_deg(omega),
        }
    }

    /// Frequency where |L| = 1 [rad/s].
    pub fn crossover_omega(&self) -> f64 {
        // w^4 Ti^2 = k^2 (1 + w^2 Ti^2), quadratic in w^2
        let k_sq = self.loop_gain * self.loop_gain;
        let root = libm::sqrt(k_sq * k_sq + 4.0 * k_sq / (self.ti * self.ti));
        libm::sqrt((k_sq + root) / 2.0)
    }

    pub fn margins(&self) -> StabilityMargins {
        let crossover = self.crossover_omega();

        // d/dw (atan(w Ti) - w delay) = 0, no interior maximum when Ti <= delay
        let max_phase_margin_deg = if self.ti > self.delay {
            let omega = libm::sqrt((self.ti / self.delay - 1.0) / (self.ti * self.ti));
            self.phase_lead_deg(omega)
        } else {
            0.0
        };

        StabilityMargins {
            crossover_hz: crossover / (2.0 * PI),
            phase_margin_deg: self.phase_lead_deg(crossover),
            max_phase_margin_deg,
        }
    }

    /// Log spaced Bode response, `points >= 2`.
    pub fn bode(&self, omega_min: f64, omega_max: f64, points: usize) -> impl Iterator<Item = FrequencyPoint> + '_ {
        let span = libm::log10(omega_max / omega_min);
        let last = points.saturating_sub(1).max(1) as f64;
        (0..points).map(move |i| self.response(omega_min * libm::pow(10.0, span * i as f64 / last)))
    }

    // Controller zero lead minus delay lag
    fn phase_lead_deg(&self, omega: f64) -> f64 {
        (libm::atan(omega * self.ti) - omega * self.delay).to_degrees()
    }
}

/// Phase margin of the loop tuned for `plant` with `rule`.
pub fn stability_margins(plant: &PlantParameters, rule: TuningRule) -> Result<StabilityMargins, ConfigError> {
    plant.validate()?;
    let tuning = rule.gains(plant);
    let margins = OpenLoop::new(plant, &tuning).margins();

    #[cfg(feature = "defmt")]
    defmt::debug!(
        "TUNING: {} phase margin {} deg @ {} Hz",
        rule,
        margins.phase_margin_deg,
        margins.crossover_hz
    );

    Ok(margins)
}
