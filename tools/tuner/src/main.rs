mod app;
mod simulation;

use anyhow::anyhow;
use app::TunerApp;
use eframe::{run_native, NativeOptions};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "tuner=debug,info";

/// Filter from the `var` environment variable, the default when unset or invalid.
fn log_filter_from(var: &str) -> EnvFilter {
    EnvFilter::try_from_env(var).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter_from(EnvFilter::DEFAULT_ENV))
        .init();

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("PI Tuner")
            .with_inner_size([1200.0, 800.0]),
        ..Default::default()
    };

    let app = TunerApp::new();
    run_native("PI Tuner", options, Box::new(|_cc| Ok(Box::new(app))))
        .map_err(|e| anyhow!("failed to start tuner window: {e}"))
}
