#[macro_use]
mod logging;

pub mod controller;
pub mod io;
pub mod settings;
pub mod tui;

use std::sync::Arc;

use clap::Parser;

use crate::io::serial::{default_port_marker, PortEnumerator, SerialBackend, SystemBackend};
use crate::settings::Settings;

/// Parse the command line and run the terminal (or `--list`).
pub fn run() -> std::io::Result<()> {
    let settings = Settings::parse();

    if let Some(dir) = settings.log_directory() {
        if let Err(e) = logging::init_file_logging(&dir) {
            eprintln!("[setup] {}", e);
        }
    }

    let backend: Arc<dyn SerialBackend> = Arc::new(SystemBackend);
    let result = if settings.list {
        list_ports(&settings, backend)
    } else {
        tui::run(&settings, backend)
    };

    logging::stop_file_logging();
    result
}

fn list_ports(settings: &Settings, backend: Arc<dyn SerialBackend>) -> std::io::Result<()> {
    let marker = settings.port_marker.as_deref().unwrap_or(default_port_marker());
    let ports = PortEnumerator::new(backend, marker).list_ports();

    if settings.json {
        let json = serde_json::to_string_pretty(&ports).map_err(std::io::Error::other)?;
        println!("{}", json);
    } else if ports.is_empty() {
        println!("No serial ports found");
    } else {
        for port in &ports {
            println!("{:<12} {}", port.device_name, port.display_name);
        }
    }
    Ok(())
}
