//! Arduino serial console - egui desktop application
//!
//! ```bash
//! cargo run -- --port /dev/ttyACM0
//! cargo run -- --list-ports
//! ```

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use serial_console::config::Settings;
use serial_console::gui;
use serial_console::serial::{SerialBackend, SystemSerial};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "serial_console", version, about)]
struct Cli {
    /// Settings file (defaults to <config dir>/serial_console/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Port to preselect, e.g. /dev/ttyACM0 or COM3
    #[arg(long, value_name = "NAME")]
    port: Option<String>,

    /// Override the configured baud rate
    #[arg(long, value_name = "N")]
    baud: Option<u32>,

    /// Print the available serial ports and exit
    #[arg(long)]
    list_ports: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings =
        Settings::resolve(cli.config.as_deref(), cli.baud).context("Failed to load settings")?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if cli.list_ports {
        for port in SystemSerial.available_ports() {
            println!("{port}");
        }
        return Ok(());
    }

    tracing::info!("Starting {}", gui::APP_NAME);
    gui::run(settings, cli.port).map_err(|e| anyhow!("GUI failed: {e}"))
}
