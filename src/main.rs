mod app_state;
mod code_panel;
mod config;
mod console;
mod dialect;
mod editor;
mod hints;
mod output;
mod runner;
mod samples;
mod sandbox;
mod scheduler;
mod script;
mod transpile;
mod ui;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Panics anywhere in the process (engine threads included) are logged.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let message = script::panic_message(info.payload());
        let location = info.location().map(|l| l.to_string()).unwrap_or_default();
        tracing::error!(%message, %location, "panic");
        default_hook(info);
    }));
}

fn main() -> Result<()> {
    init_tracing();
    install_panic_hook();

    let config = config::PlaygroundConfig::load();
    tracing::info!(dialect = %config.dialect, auto_run = config.auto_run, "starting playground");

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Code Playground")
            .with_inner_size([1280.0, 800.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Code Playground",
        native_options,
        Box::new(move |_cc| Box::new(ui::create_app(config))),
    )
    .map_err(|e| anyhow::anyhow!("failed to start the UI: {}", e))?;
    Ok(())
}
