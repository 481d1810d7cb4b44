//! Handles keyboard shortcuts for the GUI.
use eframe::egui;

/// Represents an action triggered by a keyboard shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    RefreshPorts,
    Close,
}

/// Handles keyboard shortcuts and returns an action if a shortcut is triggered.
pub fn handle_shortcuts(ctx: &egui::Context) -> Option<ShortcutAction> {
    if ctx.input(|i| i.key_pressed(egui::Key::R) && i.modifiers.ctrl) {
        return Some(ShortcutAction::RefreshPorts);
    }
    if ctx.input(|i| i.key_pressed(egui::Key::Q) && i.modifiers.ctrl) {
        return Some(ShortcutAction::Close);
    }

    None
}
