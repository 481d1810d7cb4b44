//! An in-memory serial backend for tests and demos.
//!
//! `MockBackend` reports a scripted port list and hands out `MockLink`s that
//! all share one [`MockDevice`]. The device plays the Arduino side: tests push
//! the bytes it "sends", inspect what was written to it, and inject write or
//! read failures.

use crate::config::SerialSettings;
use crate::error::AppResult;
use crate::serial::{SerialBackend, SerialLink};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct DeviceState {
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    write_error: Option<String>,
    read_error: Option<String>,
    opened: Vec<(String, u32)>,
    handles: usize,
}

/// The far end of every link handed out by one [`MockBackend`].
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue text as if the device had printed it.
    pub fn push_incoming(&self, text: &str) {
        self.lock().incoming.extend(text.as_bytes());
    }

    /// Queue raw bytes as if the device had sent them.
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.lock().incoming.extend(bytes);
    }

    /// Everything written to the device so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Everything written so far, decoded lossily.
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.lock().written).into_owned()
    }

    /// Make every subsequent write fail with `message`.
    pub fn fail_writes(&self, message: &str) {
        self.lock().write_error = Some(message.to_string());
    }

    /// Make every subsequent poll or read fail with `message`.
    pub fn fail_reads(&self, message: &str) {
        self.lock().read_error = Some(message.to_string());
    }

    /// `(port, baud)` of every successful open, in order.
    pub fn opened(&self) -> Vec<(String, u32)> {
        self.lock().opened.clone()
    }

    /// Number of link handles currently alive.
    pub fn open_handles(&self) -> usize {
        self.lock().handles
    }
}

/// Scripted [`SerialBackend`].
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    ports: Arc<Mutex<Vec<String>>>,
    open_failures: Arc<Mutex<HashMap<String, String>>>,
    device: MockDevice,
}

impl MockBackend {
    /// A backend reporting `ports`.
    pub fn new<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::default();
        backend.set_ports(ports);
        backend
    }

    /// Replace the reported port list.
    pub fn set_ports<I, S>(&self, ports: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.ports.lock().unwrap_or_else(|e| e.into_inner());
        *guard = ports.into_iter().map(Into::into).collect();
    }

    /// Make opening `port` fail with `message` (e.g. "Device or resource busy").
    pub fn fail_open(&self, port: &str, message: &str) {
        self.open_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(port.to_string(), message.to_string());
    }

    /// Let `port` open again.
    pub fn clear_open_failure(&self, port: &str) {
        self.open_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(port);
    }

    /// Handle on the shared far end.
    pub fn device(&self) -> MockDevice {
        self.device.clone()
    }
}

impl SerialBackend for MockBackend {
    fn available_ports(&self) -> Vec<String> {
        self.ports.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn open(&self, port: &str, settings: &SerialSettings) -> AppResult<Box<dyn SerialLink>> {
        if let Some(message) = self
            .open_failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(port)
        {
            return Err(serialport::Error::new(
                serialport::ErrorKind::Io(io::ErrorKind::PermissionDenied),
                message.clone(),
            )
            .into());
        }
        if !self.available_ports().iter().any(|p| p == port) {
            return Err(serialport::Error::new(
                serialport::ErrorKind::NoDevice,
                format!("No such device: {port}"),
            )
            .into());
        }

        self.device
            .lock()
            .opened
            .push((port.to_string(), settings.baud_rate));
        Ok(Box::new(MockLink::new(port.to_string(), self.device.clone())))
    }
}

/// One handle to a [`MockDevice`].
#[derive(Debug)]
pub struct MockLink {
    name: String,
    device: MockDevice,
}

impl MockLink {
    fn new(name: String, device: MockDevice) -> Self {
        device.lock().handles += 1;
        Self { name, device }
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        let mut state = self.device.lock();
        state.handles = state.handles.saturating_sub(1);
    }
}

impl SerialLink for MockLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn write_all(&mut self, bytes: &[u8]) -> AppResult<()> {
        let mut state = self.device.lock();
        if let Some(message) = &state.write_error {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, message.clone()).into());
        }
        state.written.extend_from_slice(bytes);
        Ok(())
    }

    fn bytes_to_read(&self) -> AppResult<u32> {
        let state = self.device.lock();
        if let Some(message) = &state.read_error {
            return Err(io::Error::new(io::ErrorKind::Other, message.clone()).into());
        }
        Ok(u32::try_from(state.incoming.len()).unwrap_or(u32::MAX))
    }

    fn read_line(&mut self) -> AppResult<Vec<u8>> {
        let mut state = self.device.lock();
        if let Some(message) = &state.read_error {
            return Err(io::Error::new(io::ErrorKind::Other, message.clone()).into());
        }
        let mut line = Vec::new();
        while let Some(byte) = state.incoming.pop_front() {
            line.push(byte);
            if byte == b'\n' {
                break;
            }
        }
        Ok(line)
    }

    fn try_clone_link(&self) -> AppResult<Box<dyn SerialLink>> {
        Ok(Box::new(MockLink::new(self.name.clone(), self.device.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConsoleError;

    #[test]
    fn test_unknown_port_fails_to_open() {
        let backend = MockBackend::new(["/dev/ttyACM0"]);
        let result = backend.open("/dev/ttyUSB9", &SerialSettings::default());
        assert!(matches!(result, Err(ConsoleError::Serial(_))));
    }

    #[test]
    fn test_scripted_open_failure() {
        let backend = MockBackend::new(["COM3"]);
        backend.fail_open("COM3", "Access is denied.");
        match backend.open("COM3", &SerialSettings::default()) {
            Err(e) => assert_eq!(e.to_string(), "Access is denied."),
            Ok(_) => panic!("open should have failed"),
        }
    }

    #[test]
    fn test_read_line_splits_on_newline() {
        let backend = MockBackend::new(["COM3"]);
        let device = backend.device();
        let mut link = backend.open("COM3", &SerialSettings::default()).unwrap();

        device.push_incoming("temp=21\nhum=40\n");
        assert_eq!(link.bytes_to_read().unwrap(), 15);
        assert_eq!(link.read_line().unwrap(), b"temp=21\n");
        assert_eq!(link.read_line().unwrap(), b"hum=40\n");
        assert_eq!(link.bytes_to_read().unwrap(), 0);
    }

    #[test]
    fn test_clones_share_the_device() {
        let backend = MockBackend::new(["COM3"]);
        let device = backend.device();
        let mut link = backend.open("COM3", &SerialSettings::default()).unwrap();
        let clone = link.try_clone_link().unwrap();
        assert_eq!(device.open_handles(), 2);

        link.write_all(b"LED ON").unwrap();
        assert_eq!(device.written_text(), "LED ON");

        drop(clone);
        drop(link);
        assert_eq!(device.open_handles(), 0);
    }

    #[test]
    fn test_injected_failures() {
        let backend = MockBackend::new(["COM3"]);
        let device = backend.device();
        let mut link = backend.open("COM3", &SerialSettings::default()).unwrap();

        device.fail_writes("write failed");
        assert!(link.write_all(b"x").is_err());

        device.fail_reads("device reports readiness to read but returned no data");
        assert!(link.bytes_to_read().is_err());
        assert!(link.read_line().is_err());
    }
}
