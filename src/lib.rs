//! Core library for the serial_console application.
//!
//! A desktop console for Arduino-class devices: list serial ports, open one
//! at a fixed baud rate, send text commands and watch incoming lines in a
//! bounded, scrolling log. The GUI in [`gui`] is a thin view over
//! [`console::Console`], which is usable and testable without a window.

pub mod config;
pub mod console;
pub mod error;
pub mod gui;
pub mod log_buffer;
pub mod reader;
pub mod serial;
