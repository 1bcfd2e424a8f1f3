use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use eframe::egui;
use tracing::{debug, error};

use crate::app_state::AppState;
use crate::code_panel;
use crate::config::PlaygroundConfig;
use crate::dialect::Dialect;
use crate::output::LogEntry;
use crate::scheduler::Trigger;
use crate::script::panic_message;

const TOOLBAR_BG: egui::Color32 = egui::Color32::from_rgb(45, 45, 48);
const OUTPUT_BG: egui::Color32 = egui::Color32::from_rgb(24, 24, 24);
/// Poll interval for the run worker while a run is outstanding.
const RUN_POLL: Duration = Duration::from_millis(30);

pub struct PlaygroundApp {
    state: AppState,
}

pub fn create_app(config: PlaygroundConfig) -> PlaygroundApp {
    PlaygroundApp {
        state: AppState::new(config),
    }
}

/// Re-evaluates hints from the scheduler. A panic on this path becomes an
/// error entry instead of taking the UI down.
fn run_hint_trigger(state: &mut AppState) {
    let dialect = state.dialect;
    let result = catch_unwind(AssertUnwindSafe(|| state.overlay.trigger(&state.buffer, dialect, false)));
    match result {
        Ok(open) => debug!(open, "auto hint"),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(%message, "hint evaluation panicked");
            state.overlay.close();
            state
                .output
                .append(LogEntry::error(format!("Unexpected error: {}", message)));
        }
    }
}

fn toolbar(ui: &mut egui::Ui, state: &mut AppState) {
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new("Code Playground").strong().size(15.0));
        ui.separator();

        let run = egui::Button::new("▶ Run").fill(egui::Color32::from_rgb(14, 99, 156));
        if ui.add(run).on_hover_text("Ctrl+Enter").clicked() {
            state.scheduler.cancel(Trigger::AutoRun);
            state.request_run();
        }
        if ui.button("🗑 Clear").on_hover_text("Clear the editor").clicked() {
            state.clear_editor();
        }
        if ui.button("Clear output").clicked() {
            state.output.clear();
        }

        ui.separator();
        let mut dialect = state.dialect;
        egui::ComboBox::from_id_source("dialect_selector")
            .selected_text(dialect.name())
            .show_ui(ui, |ui| {
                for d in Dialect::ALL {
                    ui.selectable_value(&mut dialect, d, d.name());
                }
            });
        state.set_dialect(dialect);

        let mut auto_run = state.auto_run;
        if ui.checkbox(&mut auto_run, "Auto-run").changed() {
            state.set_auto_run(auto_run);
        }

        if state.run_in_flight {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.spinner();
                if state.rerun_pending {
                    ui.label(egui::RichText::new("rerun queued").weak());
                }
            });
        }
    });
}

fn output_panel(ui: &mut egui::Ui, state: &AppState) {
    ui.horizontal(|ui| {
        ui.label(egui::RichText::new("Output").strong());
        ui.label(egui::RichText::new(format!("{} entries", state.output.entries().len())).weak());
    });
    ui.separator();
    state.output.show(ui);
}

impl eframe::App for PlaygroundApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let state = &mut self.state;
        let now = ctx.input(|i| i.time);
        state.tiny_screen = state.config.ui.is_tiny(ctx.screen_rect().width());

        state.poll_runner();

        // Ctrl/Cmd+Enter runs; consumed before the editor would insert a newline.
        if ctx.input_mut(|i| i.consume_key(egui::Modifiers::COMMAND, egui::Key::Enter)) {
            state.scheduler.cancel(Trigger::AutoRun);
            state.request_run();
        }

        egui::TopBottomPanel::top("toolbar_panel")
            .frame(egui::Frame::none().fill(TOOLBAR_BG).inner_margin(egui::vec2(8.0, 6.0)))
            .show(ctx, |ui| toolbar(ui, state));

        let output_frame = egui::Frame::none().fill(OUTPUT_BG).inner_margin(8.0);
        if state.tiny_screen {
            egui::TopBottomPanel::bottom("output_panel")
                .resizable(true)
                .default_height(ctx.screen_rect().height() * 0.35)
                .frame(output_frame)
                .show(ctx, |ui| output_panel(ui, state));
        } else {
            egui::SidePanel::right("output_panel")
                .resizable(true)
                .default_width(ctx.screen_rect().width() * 0.4)
                .frame(output_frame)
                .show(ctx, |ui| output_panel(ui, state));
        }

        let events = egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| code_panel::show(ui, state))
            .inner;

        if events.changed {
            state.on_edit(now);
        }
        if events.committed {
            state.scheduler.cancel(Trigger::AutoHint);
        }

        for (trigger, ()) in state.scheduler.poll(now) {
            match trigger {
                Trigger::AutoRun if state.auto_run => state.request_run(),
                Trigger::AutoRun => {}
                Trigger::AutoHint => run_hint_trigger(state),
            }
        }

        if state.run_in_flight {
            ctx.request_repaint_after(RUN_POLL);
        }
        if let Some(deadline) = state.scheduler.next_deadline() {
            ctx.request_repaint_after(Duration::from_secs_f64((deadline - now).max(0.0)));
        }
    }
}
