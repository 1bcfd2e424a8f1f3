//! Output panel: an append-only list of rendered log entries.

use eframe::egui;

use crate::console::{ConsoleRecord, Severity};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
}

impl LogEntry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// `[LOG] message`
    pub fn rendered(&self) -> String {
        format!("[{}] {}", self.severity.label(), self.message)
    }
}

impl From<ConsoleRecord> for LogEntry {
    fn from(r: ConsoleRecord) -> Self {
        Self::new(r.severity, r.message)
    }
}

fn severity_color(severity: Severity) -> egui::Color32 {
    match severity {
        Severity::Log => egui::Color32::from_rgb(210, 210, 210),
        Severity::Info => egui::Color32::from_rgb(120, 180, 240),
        Severity::Warn => egui::Color32::from_rgb(230, 190, 90),
        Severity::Error => egui::Color32::from_rgb(240, 110, 110),
    }
}

#[derive(Default)]
pub struct OutputPanel {
    entries: Vec<LogEntry>,
    running: bool,
}

impl OutputPanel {
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = LogEntry>) {
        self.entries.extend(entries);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Shows or hides the loading row at the bottom of the list.
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    pub fn show(&self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .id_source("output_scroll")
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for entry in &self.entries {
                    ui.label(
                        egui::RichText::new(entry.rendered())
                            .monospace()
                            .color(severity_color(entry.severity)),
                    );
                }
                if self.running {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label(egui::RichText::new("[LOADING] Running...").monospace().weak());
                    });
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_render_with_their_tag() {
        assert_eq!(LogEntry::new(Severity::Warn, "careful").rendered(), "[WARN] careful");
        assert_eq!(LogEntry::info("hi").rendered(), "[INFO] hi");
    }

    #[test]
    fn panel_appends_in_order_and_clears() {
        let mut panel = OutputPanel::default();
        panel.append(LogEntry::info("a"));
        panel.extend(vec![LogEntry::error("b"), LogEntry::new(Severity::Log, "c")]);
        let messages: Vec<_> = panel.entries().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["a", "b", "c"]);

        panel.set_running(true);
        panel.clear();
        assert!(panel.entries().is_empty());
        assert!(panel.is_running());
    }
}
