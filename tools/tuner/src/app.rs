use eframe::App;
use egui::{Color32, Slider};
use egui_plot::{HLine, Legend, Line, Plot, PlotPoints, VLine};
use picontrol_algo::config::SHIFT_MAX_LIMIT;
use picontrol_algo::TuningRule;
use tracing::{info, warn};

use crate::simulation::{simulate, SimulationInput, SimulationResult, MAX_SIMULATION_STEPS};

/// Rerun once a slider drag ends, or on a click or keyboard edit.
fn committed(response: egui::Response) -> bool {
    response.drag_stopped() || (response.changed() && !response.dragged())
}

pub struct TunerApp {
    input: SimulationInput,
    result: anyhow::Result<SimulationResult>,
}

impl TunerApp {
    pub fn new() -> Self {
        let input = SimulationInput::default();
        let result = simulate(&input);
        Self { input, result }
    }

    fn rerun(&mut self) {
        self.result = simulate(&self.input);
        match &self.result {
            Ok(result) => info!(
                "{} coefficients {:?}, phase margin {:.1} deg, final value {:.0}",
                self.input.rule.name(),
                result.coefficients,
                result.margins.phase_margin_deg,
                result.final_value
            ),
            Err(e) => warn!("simulation rejected: {e}"),
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) -> bool {
        let input = &mut self.input;
        let mut changed = false;

        ui.horizontal(|ui| {
            let delay = Slider::new(&mut input.delay_s, 0.001..=60.0)
                .text("Delay [s]")
                .logarithmic(true);
            changed |= committed(ui.add(delay));

            let slope = Slider::new(&mut input.slope, -10.0..=10.0)
                .text("Slope [1/s]")
                .fixed_decimals(3);
            changed |= committed(ui.add(slope));

            let rate = Slider::new(&mut input.update_rate_hz, 1..=20_000)
                .text("Rate [Hz]")
                .logarithmic(true);
            changed |= committed(ui.add(rate));
        });

        ui.horizontal(|ui| {
            let shift = Slider::new(&mut input.shift_max, 1..=SHIFT_MAX_LIMIT).text("Shift max");
            changed |= committed(ui.add(shift));

            egui::ComboBox::from_label("Rule")
                .selected_text(input.rule.name())
                .show_ui(ui, |ui| {
                    for rule in TuningRule::ALL {
                        changed |= ui.selectable_value(&mut input.rule, rule, rule.name()).changed();
                    }
                });

            let limit = Slider::new(&mut input.output_limit, 0..=100_000_000)
                .text("Output limit ±")
                .logarithmic(true);
            changed |= committed(ui.add(limit));
        });

        ui.horizontal(|ui| {
            let setpoint = Slider::new(&mut input.setpoint, -50_000_000..=50_000_000).text("Setpoint");
            changed |= committed(ui.add(setpoint));

            let start = Slider::new(&mut input.start, -50e6..=50e6).text("Start");
            changed |= committed(ui.add(start));

            let duration = Slider::new(&mut input.duration_s, 1.0..=600.0)
                .text("Duration [s]")
                .logarithmic(true);
            changed |= committed(ui.add(duration));
        });

        changed
    }

    fn summary(&self, ui: &mut egui::Ui) {
        match &self.result {
            Ok(result) => {
                let c = result.coefficients;
                let t = result.tuning;
                ui.label(format!(
                    "Kp {:.6}, Ti {:.4} s, Ki {:.3e} per step    1/Kp {:.3}, 1/Ki {:.1}",
                    t.kp,
                    t.ti,
                    t.ki,
                    1.0 / t.kp,
                    1.0 / t.ki,
                ));
                ui.label(format!(
                    "Kp -> {} >> {} ({:.6})    Ki -> {} >> {} ({:.3e})",
                    c.mult_p,
                    c.shift_p,
                    c.proportional_gain(),
                    c.mult_i,
                    c.shift_i,
                    c.integral_gain(),
                ));

                let m = result.margins;
                let margin_text = format!(
                    "Phase margin @ {:.3} Hz: {:.1} deg    Max phase margin: {:.1} deg",
                    m.crossover_hz, m.phase_margin_deg, m.max_phase_margin_deg
                );
                if m.phase_margin_deg > 0.0 {
                    ui.label(margin_text);
                } else {
                    ui.colored_label(Color32::LIGHT_RED, margin_text);
                }

                ui.label(format!(
                    "Final value {:.0} (error {:.0}), limited {:.1}% of steps",
                    result.final_value,
                    result.final_value - self.input.setpoint as f64,
                    result.limited_ratio * 100.0
                ));
                if result.steps == MAX_SIMULATION_STEPS {
                    ui.colored_label(
                        Color32::YELLOW,
                        format!("Run capped at {MAX_SIMULATION_STEPS} steps"),
                    );
                }
            }
            Err(e) => {
                ui.colored_label(Color32::LIGHT_RED, format!("Not usable: {e}"));
            }
        }
    }
}

fn bode_plots(ui: &mut egui::Ui, result: &SimulationResult) {
    // egui_plot has no log axis, x is log10(f [Hz])
    let crossover = result.margins.crossover_hz.log10();
    let magnitude: PlotPoints = result
        .bode
        .iter()
        .map(|p| [p.frequency_hz().log10(), p.magnitude_db])
        .collect();
    let phase: PlotPoints = result
        .bode
        .iter()
        .map(|p| [p.frequency_hz().log10(), p.phase_deg])
        .collect();

    let half = ui.available_height() / 2.0;
    Plot::new("bode_magnitude")
        .height(half)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(magnitude).name("Magnitude [dB]"));
            plot_ui.hline(HLine::new(0.0).name("Unity gain").color(Color32::GRAY));
            plot_ui.vline(VLine::new(crossover).name("Crossover").color(Color32::LIGHT_GREEN));
        });

    Plot::new("bode_phase")
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(phase).name("Phase [deg]").color(Color32::LIGHT_BLUE));
            plot_ui.hline(HLine::new(-180.0).name("-180 deg").color(Color32::GRAY));
            plot_ui.vline(VLine::new(crossover).name("Crossover").color(Color32::LIGHT_GREEN));
        });
}

impl App for TunerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            if self.controls(ui) {
                self.rerun();
            }
            ui.separator();
            self.summary(ui);
        });

        let Ok(result) = &self.result else {
            egui::CentralPanel::default().show(ctx, |_ui| {});
            return;
        };

        egui::SidePanel::right("bode")
            .resizable(true)
            .default_width(450.0)
            .show(ctx, |ui| {
                ui.heading("Open loop (log10 f [Hz])");
                bode_plots(ui, result);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let half = ui.available_height() / 2.0;

            Plot::new("process")
                .height(half)
                .legend(Legend::default())
                .show(ui, |plot_ui| {
                    plot_ui.line(Line::new(PlotPoints::from(result.process.clone())).name("Process"));
                    plot_ui.hline(
                        HLine::new(self.input.setpoint as f64)
                            .name("Setpoint")
                            .color(Color32::LIGHT_GREEN),
                    );
                });

            Plot::new("control")
                .legend(Legend::default())
                .show(ui, |plot_ui| {
                    plot_ui.line(
                        Line::new(PlotPoints::from(result.control.clone()))
                            .name("Control")
                            .color(Color32::LIGHT_BLUE),
                    );
                });
        });
    }
}
