use eframe::egui;

use crate::dialect::Dialect;
use crate::editor::CodeBuffer;
use crate::hints::catalog::HintKind;
use crate::hints::overlay::{HintOverlay, OverlayEvent, OverlayOutcome};

const POPUP_BG: egui::Color32 = egui::Color32::from_rgb(37, 37, 38);
const SELECTED_BG: egui::Color32 = egui::Color32::from_rgb(4, 57, 94);
const DESCRIPTION: egui::Color32 = egui::Color32::from_gray(140);
const POPUP_WIDTH: f32 = 360.0;

fn badge_color(kind: HintKind) -> egui::Color32 {
    match kind {
        HintKind::Console => egui::Color32::from_rgb(230, 190, 90),
        HintKind::Builtin => egui::Color32::from_rgb(78, 201, 176),
        HintKind::Function => egui::Color32::from_rgb(197, 134, 192),
        HintKind::Variable => egui::Color32::from_rgb(156, 220, 254),
        HintKind::Control => egui::Color32::from_rgb(86, 156, 214),
        HintKind::TypeScript => egui::Color32::from_rgb(49, 120, 198),
        HintKind::Class => egui::Color32::from_rgb(238, 156, 80),
        HintKind::Module => egui::Color32::from_rgb(181, 206, 168),
        HintKind::Error => egui::Color32::from_rgb(240, 110, 110),
        HintKind::General => egui::Color32::from_gray(170),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PressTarget {
    Popup,
    Editor,
    Outside,
}

/// The popup floats over the editor, so it wins where the two overlap.
fn press_target(pos: egui::Pos2, popup: egui::Rect, editor: egui::Rect) -> PressTarget {
    if popup.contains(pos) {
        PressTarget::Popup
    } else if editor.contains(pos) {
        PressTarget::Editor
    } else {
        PressTarget::Outside
    }
}

/// Moves the `TextEdit` cursor to a char index.
pub(crate) fn set_text_edit_cursor(ctx: &egui::Context, text_edit_id: egui::Id, index: usize) {
    if let Some(mut state) = egui::TextEdit::load_state(ctx, text_edit_id) {
        let ccursor = egui::text::CCursor::new(index);
        state.cursor.set_char_range(Some(egui::text::CCursorRange::one(ccursor)));
        egui::TextEdit::store_state(ctx, text_edit_id, state);
    }
}

/// Consumes navigation keys BEFORE the `TextEdit` sees them, so arrows,
/// Enter and Tab drive the popup instead of moving the cursor or editing.
/// Ctrl+Space or Cmd+Space (and Tab while closed) asks for hints explicitly.
pub(crate) fn process_input(
    ui: &mut egui::Ui,
    text_edit_id: egui::Id,
    overlay: &mut HintOverlay,
    buffer: &mut CodeBuffer,
    dialect: Dialect,
    enabled: bool,
) -> OverlayOutcome {
    let focused = ui.ctx().memory(|m| m.has_focus(text_edit_id));
    if !focused || !enabled {
        return OverlayOutcome::Ignored;
    }

    if !overlay.is_open() {
        let ctrl_space = ui.input_mut(|i| {
            i.consume_key(egui::Modifiers::COMMAND, egui::Key::Space)
                || i.consume_key(egui::Modifiers::CTRL, egui::Key::Space)
        });
        let tab = ui.input(|i| i.key_pressed(egui::Key::Tab) && i.modifiers.is_none());
        if (ctrl_space || tab) && overlay.trigger(buffer, dialect, true) && tab {
            ui.input_mut(|i| i.consume_key(egui::Modifiers::NONE, egui::Key::Tab));
        }
        return OverlayOutcome::Ignored;
    }

    let pressed = |key| ui.input(|i| i.key_pressed(key));
    let event = if pressed(egui::Key::ArrowDown) {
        OverlayEvent::Next
    } else if pressed(egui::Key::ArrowUp) {
        OverlayEvent::Previous
    } else if pressed(egui::Key::Enter) || pressed(egui::Key::Tab) {
        OverlayEvent::Accept
    } else if pressed(egui::Key::Escape) {
        OverlayEvent::Dismiss
    } else {
        return OverlayOutcome::Ignored;
    };

    ui.input_mut(|i| {
        for key in [
            egui::Key::ArrowDown,
            egui::Key::ArrowUp,
            egui::Key::Tab,
            egui::Key::Enter,
            egui::Key::Escape,
        ] {
            i.consume_key(egui::Modifiers::NONE, key);
        }
    });

    let outcome = overlay.handle(event, buffer);
    if let OverlayOutcome::Committed { cursor, .. } = outcome {
        set_text_edit_cursor(ui.ctx(), text_edit_id, cursor);
    }
    outcome
}

/// Draws the open session under the cursor. Pointer input on the popup
/// becomes overlay events. A click in the editor re-evaluates the session
/// at the new cursor; a click anywhere else closes it.
pub(crate) fn render(
    ui: &mut egui::Ui,
    output: &egui::text_edit::TextEditOutput,
    overlay: &mut HintOverlay,
    buffer: &mut CodeBuffer,
    dialect: Dialect,
) -> OverlayOutcome {
    let Some(session) = overlay.session() else {
        return OverlayOutcome::Ignored;
    };
    let text_edit_id = output.response.id;

    let cursor = output.galley.from_ccursor(egui::text::CCursor::new(buffer.cursor));
    let cursor_rect = output.galley.pos_from_cursor(&cursor).translate(output.galley_pos.to_vec2());
    let popup_pos = cursor_rect.left_bottom() + egui::vec2(0.0, 2.0);

    let mut event = None;
    let area = egui::Area::new(egui::Id::new("hint_popup"))
        .fixed_pos(popup_pos)
        .order(egui::Order::Foreground)
        .show(ui.ctx(), |ui| {
            egui::Frame::popup(ui.style())
                .fill(POPUP_BG)
                .shadow(egui::epaint::Shadow::small_dark())
                .show(ui, |ui| {
                    ui.set_width(POPUP_WIDTH);
                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new(session.guess.label()).strong());
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            ui.label(egui::RichText::new(session.total.to_string()).weak());
                        });
                    });
                    ui.separator();

                    for (i, entry) in session.entries.iter().enumerate() {
                        let selected = i == session.selected;
                        let kind = HintKind::classify(entry.text);
                        let row = egui::Frame::none()
                            .fill(if selected { SELECTED_BG } else { egui::Color32::TRANSPARENT })
                            .inner_margin(egui::vec2(4.0, 2.0))
                            .show(ui, |ui| {
                                ui.set_width(ui.available_width());
                                ui.horizontal(|ui| {
                                    ui.label(
                                        egui::RichText::new(kind.badge())
                                            .monospace()
                                            .color(badge_color(kind)),
                                    );
                                    ui.label(egui::RichText::new(entry.text).monospace());
                                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                                        ui.label(egui::RichText::new(entry.description).small().color(DESCRIPTION));
                                    });
                                });
                            });
                        let response = row.response.interact(egui::Sense::click());
                        if response.clicked() {
                            event = Some(OverlayEvent::Click(i));
                        } else if response.hovered() && !selected {
                            event = Some(OverlayEvent::Hover(i));
                        }
                    }
                });
        });

    if event.is_none() {
        let pressed_at = ui.input(|i| i.pointer.any_pressed().then(|| i.pointer.interact_pos()).flatten());
        match pressed_at.map(|pos| press_target(pos, area.response.rect, output.response.rect)) {
            Some(PressTarget::Editor) => {
                overlay.trigger(buffer, dialect, false);
                return OverlayOutcome::Ignored;
            }
            Some(PressTarget::Outside) => event = Some(OverlayEvent::OutsideClick),
            Some(PressTarget::Popup) | None => {}
        }
    }

    let Some(event) = event else {
        return OverlayOutcome::Ignored;
    };
    let outcome = overlay.handle(event, buffer);
    if let OverlayOutcome::Committed { cursor, .. } = outcome {
        set_text_edit_cursor(ui.ctx(), text_edit_id, cursor);
        ui.ctx().memory_mut(|m| m.request_focus(text_edit_id));
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presses_in_the_editor_do_not_count_as_outside() {
        let editor = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(600.0, 400.0));
        let popup = egui::Rect::from_min_size(egui::pos2(100.0, 40.0), egui::vec2(360.0, 160.0));
        assert_eq!(press_target(egui::pos2(120.0, 60.0), popup, editor), PressTarget::Popup);
        assert_eq!(press_target(egui::pos2(20.0, 300.0), popup, editor), PressTarget::Editor);
        assert_eq!(press_target(egui::pos2(700.0, 20.0), popup, editor), PressTarget::Outside);
    }
}
