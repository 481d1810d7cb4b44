//! Configuration system using Figment
//!
//! Settings are layered, lowest precedence first:
//! 1. Built-in defaults (`Settings::default()`)
//! 2. A TOML file (`<config dir>/serial_console/config.toml`, or `--config`)
//! 3. Environment variables prefixed with `SERIAL_CONSOLE_`
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated with a double underscore:
//!
//! ```text
//! SERIAL_CONSOLE_SERIAL__BAUD_RATE=115200
//! SERIAL_CONSOLE_LOG__MAX_LINES=500
//! SERIAL_CONSOLE_LOG__LEVEL=debug
//! ```
//!
//! # Example file
//!
//! ```toml
//! [serial]
//! baud_rate = 9600
//! read_timeout_ms = 1000
//! line_ending = "lf"
//!
//! [log]
//! max_lines = 100
//! ```

use crate::error::AppResult;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "SERIAL_CONSOLE_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment could not read or deserialize a layer.
    #[error("Configuration load error: {0}")]
    Load(#[from] figment::Error),
    /// An explicitly requested settings file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    Missing(PathBuf),
    /// Values parsed but make no sense.
    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Top-level settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Serial link parameters
    pub serial: SerialSettings,
    /// Log view settings
    pub log: LogSettings,
    /// Window settings
    pub ui: UiSettings,
    /// Background reader settings
    pub reader: ReaderSettings,
}

/// Serial link parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Baud rate (Arduino sketches default to 9600)
    pub baud_rate: u32,
    /// Read timeout in milliseconds
    pub read_timeout_ms: u64,
    /// Terminator appended to every sent command
    pub line_ending: LineEnding,
}

/// Line terminator appended to outgoing commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    /// Send the text exactly as typed
    #[default]
    None,
    /// `\n`
    Lf,
    /// `\r`
    Cr,
    /// `\r\n`
    Crlf,
}

impl LineEnding {
    /// The bytes written after each command.
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::None => "",
            LineEnding::Lf => "\n",
            LineEnding::Cr => "\r",
            LineEnding::Crlf => "\r\n",
        }
    }
}

/// Log view settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Maximum number of lines kept in the log view
    pub max_lines: usize,
    /// Diagnostic logging level (trace, debug, info, warn, error)
    pub level: String,
}

/// Window settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiSettings {
    /// Initial window width in points
    pub window_width: f32,
    /// Initial window height in points
    pub window_height: f32,
    /// Period of the UI timer in milliseconds
    pub repaint_interval_ms: u64,
}

/// Background reader settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// Sleep between polls when no bytes are waiting, in milliseconds
    pub poll_interval_ms: u64,
    /// Capacity of the reader-to-UI line queue
    pub queue_capacity: usize,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            read_timeout_ms: 1000,
            line_ending: LineEnding::None,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            max_lines: 100,
            level: "info".to_string(),
        }
    }
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            window_width: 680.0,
            window_height: 520.0,
            repaint_interval_ms: 100,
        }
    }
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            queue_capacity: 256,
        }
    }
}

impl SerialSettings {
    /// Read timeout as a `Duration`.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl ReaderSettings {
    /// Idle poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Settings {
    /// Default location of the settings file, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("serial_console").join("config.toml"))
    }

    /// Load settings, using `explicit` if given or the default path otherwise.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Missing(path.to_path_buf()));
                }
                Self::load_from(Some(path))
            }
            None => Self::load_from(Self::default_path().as_deref()),
        }
    }

    /// Load settings as [`Settings::load`] does, then apply a baud rate given
    /// on the command line and validate the result again.
    pub fn resolve(explicit: Option<&Path>, baud: Option<u32>) -> AppResult<Self> {
        let mut settings = Self::load(explicit)?;
        if let Some(baud) = baud {
            settings.serial.baud_rate = baud;
            settings.validate()?;
        }
        Ok(settings)
    }

    /// Load defaults, then `file` (skipped if absent), then the environment.
    pub fn load_from(file: Option<&Path>) -> Result<Self, ConfigError> {
        let settings: Settings = Self::figment(file).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// The layered figment behind [`Settings::load_from`].
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::Validation(
                "serial.baud_rate must be greater than zero".to_string(),
            ));
        }
        if self.log.max_lines == 0 {
            return Err(ConfigError::Validation(
                "log.max_lines must be greater than zero".to_string(),
            ));
        }
        if self.reader.queue_capacity == 0 {
            return Err(ConfigError::Validation(
                "reader.queue_capacity must be greater than zero".to_string(),
            ));
        }
        if tracing_subscriber::EnvFilter::try_new(&self.log.level).is_err() {
            return Err(ConfigError::Validation(format!(
                "log.level '{}' is not a valid filter",
                self.log.level
            )));
        }
        Ok(())
    }
}
