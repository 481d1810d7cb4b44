//! Serial links over the operating system's ports, via the `serialport` crate.
//!
//! `SerialPortLink::read_line` reads one byte at a time until `\n` or the
//! read timeout; whatever arrived before the timeout is returned as-is.

use crate::config::SerialSettings;
use crate::error::{AppResult, ConsoleError};
use crate::serial::{SerialBackend, SerialLink};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Backend over the operating system's serial ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSerial;

impl SerialBackend for SystemSerial {
    fn available_ports(&self) -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                warn!("Failed to enumerate serial ports: {}", e);
                Vec::new()
            }
        }
    }

    fn open(&self, port: &str, settings: &SerialSettings) -> AppResult<Box<dyn SerialLink>> {
        let handle = serialport::new(port, settings.baud_rate)
            .timeout(settings.read_timeout())
            .open()?;

        debug!(
            "Serial port '{}' opened at {} baud",
            port, settings.baud_rate
        );

        Ok(Box::new(SerialPortLink::new(
            port.to_string(),
            handle,
            settings.read_timeout(),
        )))
    }
}

/// Serial link for RS-232/USB-CDC communication
///
/// Wraps a `serialport` handle. Reads are driven byte by byte until the
/// newline delimiter or the overall read timeout.
pub struct SerialPortLink {
    /// Port name (e.g., "/dev/ttyACM0", "COM3")
    port_name: String,

    /// The open port
    port: Box<dyn SerialPort>,

    /// Upper bound for one `read_line` call
    timeout: Duration,
}

impl SerialPortLink {
    /// Wrap an already opened port.
    pub fn new(port_name: String, port: Box<dyn SerialPort>, timeout: Duration) -> Self {
        Self {
            port_name,
            port,
            timeout,
        }
    }
}

impl SerialLink for SerialPortLink {
    fn name(&self) -> &str {
        &self.port_name
    }

    fn write_all(&mut self, bytes: &[u8]) -> AppResult<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn bytes_to_read(&self) -> AppResult<u32> {
        Ok(self.port.bytes_to_read()?)
    }

    fn read_line(&mut self) -> AppResult<Vec<u8>> {
        let mut line = Vec::new();
        let mut buffer = [0u8; 1];
        let start = Instant::now();

        loop {
            if start.elapsed() > self.timeout {
                break;
            }

            match self.port.read(&mut buffer) {
                Ok(1) => {
                    line.push(buffer[0]);
                    if buffer[0] == b'\n' {
                        break;
                    }
                }
                Ok(0) => return Err(ConsoleError::UnexpectedEof),
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(line)
    }

    fn try_clone_link(&self) -> AppResult<Box<dyn SerialLink>> {
        let port = self.port.try_clone()?;
        Ok(Box::new(SerialPortLink::new(
            self.port_name.clone(),
            port,
            self.timeout,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_fails() {
        let settings = SerialSettings::default();
        let result = SystemSerial.open("/dev/this-port-does-not-exist", &settings);
        assert!(result.is_err());
    }

    #[test]
    fn test_enumeration_never_panics() {
        // Hosts without serial hardware legitimately report nothing.
        let _ports = SystemSerial.available_ports();
    }
}
