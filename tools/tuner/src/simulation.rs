use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::{anyhow, Result};
use picontrol_algo::config::DEFAULT_SHIFT_MAX;
use picontrol_algo::tuning::plant_model::DelayIntegratorPlant;
use picontrol_algo::tuning::stability::{FrequencyPoint, OpenLoop, StabilityMargins};
use picontrol_algo::{
    BoundedController, ControllerConfig, ControllerState, FilterCoefficients,
    FilterLimits, PlantParameters, TuningParameters, TuningRule,
};

/// Longest trace kept for plotting, longer runs are decimated
const MAX_PLOT_POINTS: usize = 4000;

/// Upper bound on simulated control steps, keeps a rerun interactive
pub const MAX_SIMULATION_STEPS: usize = 2_000_000;

const BODE_POINTS: usize = 400;
/// Bode range around the gain crossover, in decades
const BODE_DECADES_BELOW: f64 = 3.0;
const BODE_DECADES_ABOVE: f64 = 2.0;

/// Everything the user can change in the tuner.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationInput {
    pub delay_s: f64,
    pub slope: f64,
    pub update_rate_hz: i64,
    pub shift_max: u32,
    pub rule: TuningRule,
    pub setpoint: i32,
    pub start: f64,
    pub output_limit: i32,
    pub duration_s: f64,
}

impl Default for SimulationInput {
    fn default() -> Self {
        Self {
            delay_s: 1.1,
            slope: 0.6,
            update_rate_hz: 100,
            shift_max: DEFAULT_SHIFT_MAX,
            rule: TuningRule::Simc,
            setpoint: 26_000_000,
            start: 35e6,
            output_limit: 3_000_000,
            duration_s: 120.0,
        }
    }
}

pub struct SimulationResult {
    pub coefficients: FilterCoefficients,
    pub tuning: TuningParameters,
    /// (time [s], process value)
    pub process: Vec<[f64; 2]>,
    /// (time [s], control value)
    pub control: Vec<[f64; 2]>,
    /// Share of steps spent clamped or current limited
    pub limited_ratio: f64,
    pub final_value: f64,
    pub margins: StabilityMargins,
    /// Open loop response around the crossover
    pub bode: Vec<FrequencyPoint>,
    /// Control steps actually simulated
    pub steps: usize,
}

/// Number of control steps for the requested duration, capped at `MAX_SIMULATION_STEPS`.
pub fn step_count(input: &SimulationInput) -> usize {
    let requested = (input.duration_s * input.update_rate_hz as f64).max(0.0);
    (requested as usize).min(MAX_SIMULATION_STEPS)
}

/// Tune for the plant and run the bounded controller against the plant model.
///
/// Configuration errors come back as `ConfigError`. A run whose control value
/// leaves the i32 range is reported instead of taking the window down.
pub fn simulate(input: &SimulationInput) -> Result<SimulationResult> {
    let plant = PlantParameters::from_engineering(input.delay_s, input.slope, input.update_rate_hz);
    let limits = FilterLimits::try_new(-input.output_limit, input.output_limit)?;
    let config = ControllerConfig::from_plant(&plant, input.rule, input.setpoint, limits, input.shift_max)?;
    let mut controller = BoundedController::from_config(&config)?;
    let mut model = DelayIntegratorPlant::new(plant, input.start);

    let tuning = input.rule.gains(&plant);
    let open_loop = OpenLoop::new(&plant, &tuning);
    let crossover = open_loop.crossover_omega();
    let bode = open_loop
        .bode(
            crossover / 10f64.powf(BODE_DECADES_BELOW),
            crossover * 10f64.powf(BODE_DECADES_ABOVE),
            BODE_POINTS,
        )
        .collect();

    let steps = step_count(input);
    let decimation = (steps / MAX_PLOT_POINTS).max(1);

    let mut process = Vec::with_capacity(steps / decimation + 1);
    let mut control = Vec::with_capacity(steps / decimation + 1);
    let mut limited = 0usize;

    catch_unwind(AssertUnwindSafe(|| {
        for step in 0..steps {
            let value = model.value();
            let output = controller.run_filter(value as i32, false);
            if controller.state() != ControllerState::Normal {
                limited += 1;
            }
            if step % decimation == 0 {
                let time = model.elapsed_seconds();
                process.push([time, value]);
                control.push([time, output as f64]);
            }
            model.calculate_step(output as f64);
        }
    }))
    .map_err(|_| anyhow!("control value overflowed after {:.2} s", model.elapsed_seconds()))?;

    Ok(SimulationResult {
        coefficients: config.coefficients,
        tuning,
        process,
        control,
        limited_ratio: if steps == 0 { 0.0 } else { limited as f64 / steps as f64 },
        final_value: model.value(),
        margins: open_loop.margins(),
        bode,
        steps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use picontrol_algo::ConfigError;

    fn config_error(result: Result<SimulationResult>) -> Option<ConfigError> {
        result.err().and_then(|e| e.downcast_ref::<ConfigError>().copied())
    }

    #[test]
    fn default_input_settles() {
        let result = simulate(&SimulationInput::default()).unwrap();
        assert_eq!(result.coefficients, FilterCoefficients::new(12, 13, 1241, 1));
        assert!((result.final_value - 26e6).abs() < 5000.0);
        assert_eq!(result.process.len(), result.control.len());
        assert!(result.process.len() <= MAX_PLOT_POINTS + 1);
        assert_eq!(result.steps, 12_000);
    }

    #[test]
    fn phase_margin_follows_the_rule() {
        let simc = simulate(&SimulationInput::default()).unwrap();
        let zn = simulate(&SimulationInput {
            rule: TuningRule::ZieglerNichols,
            duration_s: 1.0,
            ..SimulationInput::default()
        })
        .unwrap();

        assert!(simc.margins.phase_margin_deg > 0.0);
        assert!(zn.margins.phase_margin_deg < simc.margins.phase_margin_deg);
        assert!((simc.tuning.ti - 17.6).abs() < 1e-9);

        // The Bode trace brackets the crossover
        let first = simc.bode.first().unwrap();
        let last = simc.bode.last().unwrap();
        assert_eq!(simc.bode.len(), BODE_POINTS);
        assert!(first.magnitude_db > 0.0 && last.magnitude_db < 0.0);
        assert!(first.frequency_hz() < simc.margins.crossover_hz);
        assert!(last.frequency_hz() > simc.margins.crossover_hz);
    }

    #[test]
    fn long_runs_are_capped() {
        let input = SimulationInput {
            update_rate_hz: 20_000,
            duration_s: 600.0,
            ..SimulationInput::default()
        };
        assert_eq!(step_count(&input), MAX_SIMULATION_STEPS);
        assert_eq!(step_count(&SimulationInput::default()), 12_000);
        assert_eq!(
            step_count(&SimulationInput {
                duration_s: -1.0,
                ..SimulationInput::default()
            }),
            0
        );
    }

    #[test]
    fn tight_limits_report_saturation() {
        let input = SimulationInput {
            output_limit: 1000,
            duration_s: 10.0,
            ..SimulationInput::default()
        };
        let result = simulate(&input).unwrap();
        assert!(result.limited_ratio > 0.9);
        assert!(result.control.iter().all(|p| p[1].abs() <= 1000.0));
    }

    #[test]
    fn unusable_plant_is_an_error() {
        let input = SimulationInput {
            slope: 0.0,
            ..SimulationInput::default()
        };
        assert_eq!(config_error(simulate(&input)), Some(ConfigError::InvalidPlant));
    }

    #[test]
    fn negative_limit_is_an_error() {
        let input = SimulationInput {
            output_limit: -1,
            ..SimulationInput::default()
        };
        assert_eq!(
            config_error(simulate(&input)),
            Some(ConfigError::InvertedLimits { low: 1, high: -1 })
        );
    }

    #[test]
    fn control_overflow_is_reported() {
        // Kp = 2000 against a 9e6 error does not fit in i32
        let input = SimulationInput {
            delay_s: 0.01,
            slope: 0.01,
            ..SimulationInput::default()
        };
        let err = simulate(&input).err().unwrap();
        assert!(err.to_string().contains("overflowed"));
        assert!(err.downcast_ref::<ConfigError>().is_none());
    }
}
