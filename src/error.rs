//! Custom error types for the application.
//!
//! `ConsoleError` is the single error type used below the GUI. Failures that
//! happen while the window is open (opening a port, writing a command,
//! reading a line) never reach the user as a dialog or a panic: the console
//! renders them with `Display` into one line of the log view and carries on.
//! The `#[from]` conversions keep the serial layer terse with `?`.

use crate::config::ConfigError;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, ConsoleError>;

/// Errors raised by the serial layer and the console.
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// Opening or enumerating ports failed inside the `serialport` crate.
    #[error("{0}")]
    Serial(#[from] serialport::Error),

    /// A read or write on an open port failed.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Connect was requested with an empty port selection.
    #[error("no serial port selected")]
    NoPortSelected,

    /// The port reported end-of-file, which a live serial device never does.
    #[error("Unexpected EOF from serial port")]
    UnexpectedEof,

    /// Settings could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConsoleError::NoPortSelected;
        assert_eq!(err.to_string(), "no serial port selected");
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: ConsoleError = ConfigError::Validation("bad".to_string()).into();
        assert_eq!(err.to_string(), "Configuration validation error: bad");
    }

    #[test]
    fn test_io_error_keeps_message() {
        let err: ConsoleError =
            std::io::Error::new(std::io::ErrorKind::BrokenPipe, "device unplugged").into();
        assert_eq!(err.to_string(), "device unplugged");
    }

    #[test]
    fn test_serial_error_keeps_description() {
        let err: ConsoleError =
            serialport::Error::new(serialport::ErrorKind::NoDevice, "port busy").into();
        assert_eq!(err.to_string(), "port busy");
    }
}
