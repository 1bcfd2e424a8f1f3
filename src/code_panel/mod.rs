pub mod gutter;
pub mod highlighter;
pub mod hint_popup;

use eframe::egui;

use crate::app_state::AppState;
use crate::editor::EditorSurface;

pub(crate) const FONT_SIZE: f32 = 14.0;

const TOP_BAR_BG: egui::Color32 = egui::Color32::from_rgb(37, 37, 38);
const TOP_BAR_STROKE: egui::Color32 = egui::Color32::from_rgb(51, 51, 51);
const EDITOR_BG: egui::Color32 = egui::Color32::from_rgb(30, 30, 30);

/// What happened in the editor this frame.
#[derive(Default)]
pub struct EditorEvents {
    /// The text changed, by typing or by accepting a hint.
    pub changed: bool,
    /// A hint was accepted; the overlay already updated the buffer.
    pub committed: bool,
}

pub fn text_edit_id(ui: &egui::Ui) -> egui::Id {
    ui.make_persistent_id("code_text_edit")
}

pub fn show(ui: &mut egui::Ui, state: &mut AppState) -> EditorEvents {
    let mut events = EditorEvents::default();
    let file_name = match state.dialect {
        crate::dialect::Dialect::JavaScript => "main.js",
        crate::dialect::Dialect::TypeScript => "main.ts",
    };

    // Header bar (similar to tabs in VSCode)
    egui::Frame::none()
        .fill(TOP_BAR_BG)
        .inner_margin(egui::vec2(16.0, 8.0))
        .show(ui, |ui| {
            ui.horizontal(|ui| {
                ui.label(
                    egui::RichText::new(file_name)
                        .color(egui::Color32::from_rgb(224, 224, 224))
                        .size(13.0),
                );
            });
        });
    let rect = ui.max_rect();
    ui.painter()
        .hline(rect.x_range(), ui.cursor().top(), egui::Stroke::new(1.0, TOP_BAR_STROKE));
    ui.add_space(1.0);

    let dialect = state.dialect;
    let mut layouter = |ui: &egui::Ui, string: &str, _wrap_width: f32| {
        let mut job = egui::text::LayoutJob::default();
        highlighter::highlight_code(&mut job, string, dialect);
        // No wrapping keeps gutter rows aligned with buffer lines.
        job.wrap.max_width = f32::INFINITY;
        ui.fonts(|f| f.layout_job(job))
    };

    let available_rect = ui.available_rect_before_wrap();
    ui.painter().rect_filled(available_rect, 0.0, EDITOR_BG);

    let id = text_edit_id(ui);
    if std::mem::take(&mut state.focus_editor) {
        ui.ctx().memory_mut(|m| m.request_focus(id));
        hint_popup::set_text_edit_cursor(ui.ctx(), id, state.buffer.cursor);
    }

    // 1. Process input BEFORE the TextEdit (consume keys)
    let hints_enabled = state.config.hints.enabled;
    let outcome = hint_popup::process_input(
        ui,
        id,
        &mut state.overlay,
        &mut state.buffer,
        state.dialect,
        hints_enabled,
    );
    events.committed |= outcome.changed_buffer();

    egui::ScrollArea::both()
        .id_source("code_editor_scroll")
        .auto_shrink([false, false])
        .show(ui, |ui| {
            ui.horizontal_top(|ui| {
                ui.spacing_mut().item_spacing.x = 0.0;

                let width = gutter::gutter_width(ui, state.buffer.line_count());
                let gutter_response = ui.allocate_rect(
                    egui::Rect::from_min_size(ui.cursor().min, egui::vec2(width, ui.available_height())),
                    egui::Sense::click(),
                );
                ui.add_space(4.0);

                let output = egui::TextEdit::multiline(&mut state.buffer.text)
                    .id(id)
                    .font(egui::TextStyle::Monospace)
                    .code_editor()
                    .frame(false)
                    .desired_width(f32::INFINITY)
                    .desired_rows(24)
                    .lock_focus(true)
                    .layouter(&mut layouter)
                    .show(ui);

                if let Some(range) = output.cursor_range {
                    state.buffer.cursor = range.primary.ccursor.index;
                }
                events.changed |= output.response.changed();

                gutter::render_gutter(ui, &gutter_response, &output, &state.buffer.text);

                // 2. Render the popup AFTER the TextEdit
                if hints_enabled {
                    let outcome = hint_popup::render(ui, &output, &mut state.overlay, &mut state.buffer, dialect);
                    events.committed |= outcome.changed_buffer();
                } else if state.overlay.is_open() {
                    state.overlay.close();
                }

                // Clicking below the last line focuses the editor.
                if !output.response.has_focus()
                    && ui.rect_contains_pointer(ui.max_rect())
                    && ui.input(|i| i.pointer.primary_clicked())
                {
                    output.response.request_focus();
                }
            });
        });

    if events.committed {
        events.changed = true;
        ui.ctx().request_repaint();
    }
    events
}
