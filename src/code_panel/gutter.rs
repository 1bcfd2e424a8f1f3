use eframe::egui;

use super::FONT_SIZE;
use crate::editor::{index_of, position_of, Position};

const GUTTER_BG: egui::Color32 = egui::Color32::from_rgb(24, 24, 24);
const GUTTER_FG: egui::Color32 = egui::Color32::from_gray(100);
const GUTTER_ACTIVE: egui::Color32 = egui::Color32::from_rgb(220, 220, 220);

/// Width needed for `line_count` line numbers.
pub(crate) fn gutter_width(ui: &egui::Ui, line_count: usize) -> f32 {
    let digits = line_count.to_string().len().max(2);
    let font_id = egui::FontId::monospace(FONT_SIZE);
    digits as f32 * ui.fonts(|f| f.glyph_width(&font_id, '0')) + 24.0
}

/// Draws line numbers next to the editor galley and moves the cursor to the
/// start of a line when its number is clicked.
pub(crate) fn render_gutter(
    ui: &mut egui::Ui,
    gutter_response: &egui::Response,
    output: &egui::text_edit::TextEditOutput,
    code: &str,
) {
    let font_id = egui::FontId::monospace(FONT_SIZE);
    let text_edit_id = output.response.id;

    let active_line = output
        .cursor_range
        .map(|r| position_of(code, r.primary.ccursor.index).line);

    let mut gutter_rect = gutter_response.rect;
    gutter_rect.set_bottom(ui.clip_rect().bottom().max(output.response.rect.bottom()));
    let painter = ui.painter().with_clip_rect(gutter_rect);
    painter.rect_filled(gutter_rect, 0.0, GUTTER_BG);

    let galley = &output.galley;
    let galley_pos = output.galley_pos;

    // Rows only start a new number after a hard line break.
    let mut line_index = 0;
    let mut at_line_start = true;
    for row in &galley.rows {
        if at_line_start {
            let y = galley_pos.y + row.rect.top();
            if y > ui.clip_rect().bottom() {
                break;
            }
            if y + row.rect.height() >= ui.clip_rect().top() {
                let color = if active_line == Some(line_index) { GUTTER_ACTIVE } else { GUTTER_FG };
                painter.text(
                    egui::pos2(gutter_rect.right() - 8.0, y),
                    egui::Align2::RIGHT_TOP,
                    (line_index + 1).to_string(),
                    font_id.clone(),
                    color,
                );
            }
            line_index += 1;
        }
        at_line_start = row.ends_with_newline;
    }

    if gutter_response.clicked() {
        if let Some(pos) = ui.ctx().pointer_interact_pos() {
            let hit = galley.cursor_from_pos(egui::vec2(0.0, pos.y - galley_pos.y));
            let line = position_of(code, hit.ccursor.index).line;
            let line_start = egui::text::CCursor::new(index_of(code, Position::new(line, 0)));
            if let Some(mut state) = egui::TextEdit::load_state(ui.ctx(), text_edit_id) {
                state
                    .cursor
                    .set_char_range(Some(egui::text::CCursorRange::one(line_start)));
                egui::TextEdit::store_state(ui.ctx(), text_edit_id, state);
            }
            ui.ctx().memory_mut(|m| m.request_focus(text_edit_id));
        }
    }
}
