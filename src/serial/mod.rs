//! Serial port abstraction
//!
//! The console talks to devices through two small traits so the GUI logic can
//! be exercised without hardware:
//!
//! - [`SerialBackend`] enumerates ports and opens links.
//! - [`SerialLink`] is one open, blocking, line-oriented channel.
//!
//! [`SystemSerial`] is the production backend built on the `serialport`
//! crate; [`mock::MockBackend`] is an in-memory stand-in.

pub mod mock;
pub mod port;

pub use port::{SerialPortLink, SystemSerial};

use crate::config::SerialSettings;
use crate::error::AppResult;

/// An open serial channel.
///
/// Implementations are blocking. The link may be cloned so that the
/// background reader and the UI each own a handle to the same device.
pub trait SerialLink: Send {
    /// Port identifier this link was opened on.
    fn name(&self) -> &str;

    /// Write every byte of `bytes` and flush.
    fn write_all(&mut self, bytes: &[u8]) -> AppResult<()>;

    /// Number of bytes waiting in the input buffer.
    fn bytes_to_read(&self) -> AppResult<u32>;

    /// Read up to and including the next `\n`.
    ///
    /// If the read timeout expires first, whatever arrived is returned,
    /// which may be nothing.
    fn read_line(&mut self) -> AppResult<Vec<u8>>;

    /// A second handle to the same underlying device.
    fn try_clone_link(&self) -> AppResult<Box<dyn SerialLink>>;
}

/// Source of ports and links.
pub trait SerialBackend {
    /// Identifiers of the ports currently present. Never fails: an
    /// enumeration error is reported as an empty list.
    fn available_ports(&self) -> Vec<String>;

    /// Open `port` with the given link parameters.
    fn open(&self, port: &str, settings: &SerialSettings) -> AppResult<Box<dyn SerialLink>>;
}
