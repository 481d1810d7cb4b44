//! Renders the scrolling log view.
//!
//! Shows the console's bounded log as time-stamped, colour-coded rows. Only
//! the visible rows are laid out (`ScrollArea::show_rows`), and the view
//! sticks to the newest line while "Scroll to bottom" is on.

use crate::console::Console;
use crate::log_buffer::LineKind;
use eframe::egui::{self, Color32, ScrollArea, Ui};

/// Renders the log panel with a fixed height.
pub fn render(ui: &mut Ui, console: &Console, scroll_to_bottom: &mut bool, height: f32) {
    ui.horizontal(|ui| {
        ui.label(format!(
            "Log ({}/{} lines)",
            console.log().len(),
            console.log().capacity()
        ));
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            ui.toggle_value(scroll_to_bottom, "Scroll to bottom");
        });
    });

    let text_style = egui::TextStyle::Monospace;
    let row_height = ui.text_style_height(&text_style);
    let log = console.log();

    egui::Frame::canvas(ui.style()).show(ui, |ui| {
        ScrollArea::vertical()
            .id_salt("serial_log")
            .auto_shrink([false; 2])
            .max_height(height)
            .stick_to_bottom(*scroll_to_bottom)
            .show_rows(ui, row_height, log.len(), |ui, row_range| {
                for i in row_range {
                    if let Some(line) = log.get(i) {
                        ui.horizontal(|ui| {
                            ui.label(
                                egui::RichText::new(line.timestamp.format("%H:%M:%S").to_string())
                                    .monospace()
                                    .color(Color32::from_gray(130)),
                            );
                            ui.label(
                                egui::RichText::new(&line.text)
                                    .monospace()
                                    .color(kind_color(line.kind)),
                            );
                        });
                    }
                }
            });
    });
}

/// Text colour for each kind of line.
fn kind_color(kind: LineKind) -> Color32 {
    match kind {
        LineKind::Received => Color32::from_gray(220),
        LineKind::Sent => Color32::LIGHT_BLUE,
        LineKind::Status => Color32::LIGHT_GREEN,
        LineKind::Error => Color32::from_rgb(255, 100, 100),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_stand_out() {
        assert_ne!(kind_color(LineKind::Error), kind_color(LineKind::Received));
        assert_ne!(kind_color(LineKind::Sent), kind_color(LineKind::Received));
    }
}
