//! The application context behind the window.
//!
//! `Console` owns everything the GUI shows and every resource it drives: the
//! port list and selection, the optional open link, the bounded log, the
//! command input, and the UI ends of the reader channels. The GUI only reads
//! its state and calls its operations; nothing here depends on egui.
//!
//! Failures of user-triggered I/O (open, write, read) become one line in the
//! log and otherwise leave the console as it was.

use crate::config::Settings;
use crate::error::{AppResult, ConsoleError};
use crate::log_buffer::{LineKind, LogBuffer};
use crate::reader::{spawn_reader, Notify, ReaderEvent, ReaderHandle};
use crate::serial::{SerialBackend, SerialLink};
use tracing::{debug, info, warn};

/// The two states of the connection controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No link open; port controls enabled.
    Disconnected,
    /// A link is open; command controls enabled.
    Connected {
        /// Port the link was opened on
        port: String,
    },
}

/// Controller for one console window.
pub struct Console {
    backend: Box<dyn SerialBackend>,
    settings: Settings,
    ports: Vec<String>,
    selected_port: Option<String>,
    link: Option<Box<dyn SerialLink>>,
    state: ConnectionState,
    log: LogBuffer,
    reader: ReaderHandle,
    reader_alive: bool,
    /// Current contents of the command text input.
    pub command_input: String,
}

impl Console {
    /// Create a console, start its reader and list the ports.
    pub fn new(backend: impl SerialBackend + 'static, settings: Settings) -> AppResult<Self> {
        Self::with_notify(backend, settings, None)
    }

    /// Like [`Console::new`], running `notify` whenever the reader queues a line.
    pub fn with_notify(
        backend: impl SerialBackend + 'static,
        settings: Settings,
        notify: Option<Notify>,
    ) -> AppResult<Self> {
        // The reader thread is never joined; it ends on a read error or
        // when `reader` is dropped with the console.
        let (reader, _join) = spawn_reader(&settings.reader, notify)?;

        let mut console = Self {
            backend: Box::new(backend),
            log: LogBuffer::new(settings.log.max_lines),
            settings,
            ports: Vec::new(),
            selected_port: None,
            link: None,
            state: ConnectionState::Disconnected,
            reader,
            reader_alive: true,
            command_input: String::new(),
        };
        console.refresh_ports();
        Ok(console)
    }

    /// Re-enumerate ports and select the first one, if any.
    pub fn refresh_ports(&mut self) {
        if !self.port_controls_enabled() {
            return;
        }
        self.ports = self.backend.available_ports();
        self.selected_port = self.ports.first().cloned();
        debug!("Found {} serial port(s)", self.ports.len());
    }

    /// Select `port` if it is listed and the port controls are enabled.
    pub fn select_port(&mut self, port: &str) -> bool {
        if !self.port_controls_enabled() || !self.ports.iter().any(|p| p == port) {
            return false;
        }
        self.selected_port = Some(port.to_string());
        true
    }

    /// Open the selected port.
    ///
    /// On failure exactly one error line is logged and nothing else changes.
    pub fn connect(&mut self) {
        if !self.port_controls_enabled() {
            return;
        }

        let Some(port) = self.selected_port.clone() else {
            warn!("Connect requested with no port selected");
            self.log.append(
                LineKind::Error,
                format!("Failed to connect: {}", ConsoleError::NoPortSelected),
            );
            return;
        };

        match self.open_link(&port) {
            Ok((link, reader_link)) => {
                info!(
                    "Connected to {} at {} baud",
                    port, self.settings.serial.baud_rate
                );
                if !self.reader.attach(reader_link) {
                    warn!("Serial reader is not running; incoming data will not be shown");
                }
                self.link = Some(link);
                self.log
                    .append(LineKind::Status, format!("Connected to {port}"));
                self.state = ConnectionState::Connected { port };
            }
            Err(e) => {
                warn!("Failed to connect to {}: {}", port, e);
                self.log
                    .append(LineKind::Error, format!("Failed to connect to {port}: {e}"));
            }
        }
    }

    fn open_link(&self, port: &str) -> AppResult<(Box<dyn SerialLink>, Box<dyn SerialLink>)> {
        let link = self.backend.open(port, &self.settings.serial)?;
        let reader_link = link.try_clone_link()?;
        Ok((link, reader_link))
    }

    /// Write the command input to the device.
    ///
    /// Does nothing without a link. On success the command is echoed and the
    /// input cleared; on failure the error is logged and the input kept.
    pub fn send_command(&mut self) {
        let Some(link) = self.link.as_mut() else {
            return;
        };

        let command = self.command_input.clone();
        let mut payload = command.clone().into_bytes();
        payload.extend_from_slice(self.settings.serial.line_ending.as_str().as_bytes());

        match link.write_all(&payload) {
            Ok(()) => {
                debug!("Sent: {}", command);
                self.log
                    .append(LineKind::Sent, format!("Command sent: {command}"));
                self.command_input.clear();
            }
            Err(e) => {
                warn!("Failed to send command: {}", e);
                self.log
                    .append(LineKind::Error, format!("Failed to send command: {e}"));
            }
        }
    }

    /// Move everything the reader queued into the log. Returns the number of events.
    pub fn process_reader_events(&mut self) -> usize {
        let events = self.reader.drain_events();
        let count = events.len();
        for event in events {
            match event {
                ReaderEvent::Line(text) => self.log.append(LineKind::Received, text),
                ReaderEvent::Failed(message) => {
                    self.reader_alive = false;
                    self.log.append(
                        LineKind::Error,
                        format!("Failed to read data: {message}"),
                    );
                }
            }
        }
        count
    }

    /// Close the link if open. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(link) = self.link.take() {
            info!("Closing serial port {}", link.name());
            self.reader.detach();
            drop(link);
        }
        self.state = ConnectionState::Disconnected;
    }

    /// Ports found by the last refresh.
    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    /// Port the next connect will open.
    pub fn selected_port(&self) -> Option<&str> {
        self.selected_port.as_deref()
    }

    /// Current connection state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// True while a link is open.
    pub fn is_connected(&self) -> bool {
        matches!(self.state, ConnectionState::Connected { .. })
    }

    /// Port selector, refresh and connect are usable.
    pub fn port_controls_enabled(&self) -> bool {
        !self.is_connected()
    }

    /// Command input and send are usable.
    pub fn send_controls_enabled(&self) -> bool {
        self.is_connected()
    }

    /// False once the reader reported a read failure.
    pub fn reader_alive(&self) -> bool {
        self.reader_alive
    }

    /// The log view contents.
    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    /// Settings the console was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::mock::MockBackend;
    use tracing_test::traced_test;

    #[test]
    fn test_new_selects_first_port() {
        let backend = MockBackend::new(["/dev/ttyACM0", "/dev/ttyUSB0"]);
        let console = Console::new(backend, Settings::default()).unwrap();
        assert_eq!(console.ports().len(), 2);
        assert_eq!(console.selected_port(), Some("/dev/ttyACM0"));
        assert!(console.log().is_empty());
    }

    #[test]
    fn test_log_capacity_follows_settings() {
        let mut settings = Settings::default();
        settings.log.max_lines = 5;
        let console = Console::new(MockBackend::default(), settings).unwrap();
        assert_eq!(console.log().capacity(), 5);
    }

    #[test]
    #[traced_test]
    fn test_connect_is_traced() {
        let backend = MockBackend::new(["COM3"]);
        let mut console = Console::new(backend, Settings::default()).unwrap();
        console.connect();
        assert!(logs_contain("Connected to COM3 at 9600 baud"));
        console.shutdown();
        assert!(logs_contain("Closing serial port COM3"));
    }

    #[test]
    fn test_line_ending_is_appended() {
        let backend = MockBackend::new(["COM3"]);
        let device = backend.device();
        let mut settings = Settings::default();
        settings.serial.line_ending = crate::config::LineEnding::Crlf;
        let mut console = Console::new(backend, settings).unwrap();

        console.connect();
        console.command_input = "LED ON".to_string();
        console.send_command();

        assert_eq!(device.written(), b"LED ON\r\n");
        assert_eq!(console.log().lines().last(), Some(&"Command sent: LED ON"));
    }

    #[test]
    fn test_drop_closes_the_link() {
        let backend = MockBackend::new(["COM3"]);
        let device = backend.device();
        let mut console = Console::new(backend, Settings::default()).unwrap();
        console.connect();
        assert!(device.open_handles() >= 1);

        drop(console);
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while device.open_handles() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(device.open_handles(), 0);
    }
}
