//! The eframe/egui front end.
//!
//! `ConsoleApp` is a thin view over [`Console`]: every frame it drains the
//! reader queue, draws the widgets from the console's state and forwards
//! clicks and key presses to console operations. Widget enablement follows
//! the two connection states:
//!
//! - disconnected: port selector, Refresh and Connect enabled
//! - connected: command input and Send enabled
//!
//! The reader thread wakes the UI through `egui::Context::request_repaint`;
//! a periodic repaint acts as the UI timer on top of that.

mod log_panel;
mod shortcuts;

use self::shortcuts::{handle_shortcuts, ShortcutAction};
use crate::config::Settings;
use crate::console::{Console, ConnectionState};
use crate::error::AppResult;
use crate::reader::Notify;
use crate::serial::{SerialBackend, SystemSerial};
use eframe::egui;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Window title and eframe app id.
pub const APP_NAME: &str = "Arduino Serial Console";

/// Space kept below the log view for the port controls.
const CONTROLS_HEIGHT: f32 = 170.0;

/// The main GUI struct.
pub struct ConsoleApp {
    console: Console,
    scroll_to_bottom: bool,
    repaint_interval: Duration,
}

impl ConsoleApp {
    /// Build the app, wiring reader wake-ups to this window's context.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        backend: impl SerialBackend + 'static,
        settings: Settings,
        preselect: Option<String>,
    ) -> AppResult<Self> {
        let ctx = cc.egui_ctx.clone();
        let notify: Notify = Arc::new(move || ctx.request_repaint());
        let repaint_interval = Duration::from_millis(settings.ui.repaint_interval_ms);

        let mut console = Console::with_notify(backend, settings, Some(notify))?;
        if let Some(port) = preselect {
            if !console.select_port(&port) {
                warn!("Requested port {} is not available", port);
            }
        }

        Ok(Self {
            console,
            scroll_to_bottom: true,
            repaint_interval,
        })
    }

    fn close(&mut self, ctx: &egui::Context) {
        info!("Closing console window");
        self.console.shutdown();
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn command_row(&mut self, ui: &mut egui::Ui) {
        let enabled = self.console.send_controls_enabled();
        ui.horizontal(|ui| {
            let width = (ui.available_width() - 140.0).max(120.0);
            let input = ui.add_enabled(
                enabled,
                egui::TextEdit::singleline(&mut self.console.command_input)
                    .hint_text("Command")
                    .desired_width(width),
            );
            let enter_pressed =
                input.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            if ui
                .add_enabled(enabled, egui::Button::new("Send command"))
                .clicked()
                || enter_pressed
            {
                self.console.send_command();
                input.request_focus();
            }
        });
    }

    fn port_controls(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let enabled = self.console.port_controls_enabled();

        ui.vertical_centered(|ui| {
            ui.label("Available serial ports:");

            let mut chosen: Option<String> = None;
            ui.add_enabled_ui(enabled, |ui| {
                let selected = self.console.selected_port().unwrap_or("No ports found");
                egui::ComboBox::from_id_salt("port_select")
                    .selected_text(selected.to_string())
                    .width(220.0)
                    .show_ui(ui, |ui| {
                        for port in self.console.ports() {
                            let is_selected = self.console.selected_port() == Some(port.as_str());
                            if ui.selectable_label(is_selected, port).clicked() {
                                chosen = Some(port.clone());
                            }
                        }
                    });
            });
            if let Some(port) = chosen {
                self.console.select_port(&port);
            }

            if ui
                .add_enabled(enabled, egui::Button::new("Refresh ports"))
                .clicked()
            {
                self.console.refresh_ports();
            }

            if ui
                .add_enabled(enabled, egui::Button::new("Connect"))
                .clicked()
            {
                self.console.connect();
            }

            if ui.button("Close").clicked() {
                self.close(ctx);
            }
        });
    }

    fn status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            match self.console.state() {
                ConnectionState::Connected { port } => {
                    ui.colored_label(egui::Color32::GREEN, "●");
                    ui.label(format!(
                        "Connected to {} at {} baud",
                        port,
                        self.console.settings().serial.baud_rate
                    ));
                }
                ConnectionState::Disconnected => {
                    ui.colored_label(egui::Color32::GRAY, "●");
                    ui.label("Disconnected");
                }
            }
            if !self.console.reader_alive() {
                ui.separator();
                ui.colored_label(egui::Color32::RED, "Reader stopped");
            }
        });
    }
}

impl eframe::App for ConsoleApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.console.process_reader_events();

        if ctx.input(|i| i.viewport().close_requested()) {
            self.console.shutdown();
        }

        match handle_shortcuts(ctx) {
            Some(ShortcutAction::RefreshPorts) => self.console.refresh_ports(),
            Some(ShortcutAction::Close) => self.close(ctx),
            None => {}
        }

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.status_bar(ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.command_row(ui);
            ui.separator();

            let log_height = (ui.available_height() - CONTROLS_HEIGHT).max(80.0);
            log_panel::render(ui, &self.console, &mut self.scroll_to_bottom, log_height);

            ui.separator();
            self.port_controls(ui, ctx);
        });

        ctx.request_repaint_after(self.repaint_interval);
    }
}

/// Open the console window on the system's serial ports and block until it closes.
pub fn run(settings: Settings, preselect: Option<String>) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([settings.ui.window_width, settings.ui.window_height])
            .with_min_inner_size([480.0, 360.0])
            .with_title(APP_NAME),
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        options,
        Box::new(move |cc| {
            Ok(Box::new(ConsoleApp::new(
                cc,
                SystemSerial,
                settings,
                preselect,
            )?))
        }),
    )
}
