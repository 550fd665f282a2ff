// src/settings.rs
//
// Command-line settings. Nothing is persisted between runs.

use std::path::PathBuf;

use clap::Parser;

use crate::io::serial::FlowControl;
use crate::io::{PortConfig, DEFAULT_READ_TIMEOUT_MS, DEFAULT_WRITE_TIMEOUT_MS};

/// Baud rates offered by the baud selector.
pub const BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115_200, 230_400, 460_800, 921_600];

/// Index of 115200 in `BAUD_RATES`.
pub const DEFAULT_BAUD_INDEX: usize = 4;

/// comterm: a minimal serial terminal
#[derive(Parser, Debug, Clone)]
#[command(name = "comterm", version, about)]
pub struct Settings {
    /// Port to pre-select, as a display name ("USB-Serial (COM6)") or device name
    #[arg(short, long)]
    pub port: Option<String>,

    /// Initial baud rate
    #[arg(short, long, default_value_t = BAUD_RATES[DEFAULT_BAUD_INDEX],
          value_parser = clap::value_parser!(u32).range(1..))]
    pub baud: u32,

    /// Read timeout for the receive loop, in milliseconds
    #[arg(long, default_value_t = DEFAULT_READ_TIMEOUT_MS,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub read_timeout_ms: u64,

    /// Write timeout, in milliseconds
    #[arg(long, default_value_t = DEFAULT_WRITE_TIMEOUT_MS,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub write_timeout_ms: u64,

    /// Substring a display name must contain to be listed (default: "(COM" on
    /// Windows, "(/dev/" elsewhere)
    #[arg(long)]
    pub port_marker: Option<String>,

    /// Leave DTR deasserted after opening
    #[arg(long)]
    pub no_dtr: bool,

    /// Leave RTS deasserted after opening
    #[arg(long)]
    pub no_rts: bool,

    /// Flow control
    #[arg(long, value_enum, default_value_t = FlowControl::None)]
    pub flow_control: FlowControl,

    /// List ports and exit
    #[arg(long)]
    pub list: bool,

    /// With --list, print JSON
    #[arg(long, requires = "list")]
    pub json: bool,

    /// Write a diagnostic log to the default log directory
    #[arg(long)]
    pub log: bool,

    /// Write a diagnostic log to this directory (implies --log)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Session template for `baud`, with framing fixed at 8N1.
    pub fn port_config(&self, baud: u32) -> PortConfig {
        PortConfig {
            flow_control: self.flow_control,
            dtr_enabled: !self.no_dtr,
            rts_enabled: !self.no_rts,
            read_timeout_ms: self.read_timeout_ms,
            write_timeout_ms: self.write_timeout_ms,
            ..PortConfig::new(baud)
        }
    }

    /// Where to write the diagnostic log, if anywhere.
    pub fn log_directory(&self) -> Option<PathBuf> {
        match &self.log_dir {
            Some(dir) => Some(dir.clone()),
            None if self.log => Some(default_log_dir()),
            None => None,
        }
    }

    /// Baud selector entries and the initially selected index. A `--baud`
    /// outside the standard list is added to it.
    pub fn baud_menu(&self) -> (Vec<u32>, usize) {
        let mut rates = BAUD_RATES.to_vec();
        if !rates.contains(&self.baud) {
            rates.push(self.baud);
            rates.sort_unstable();
        }
        let index = rates
            .iter()
            .position(|&b| b == self.baud)
            .unwrap_or(DEFAULT_BAUD_INDEX);
        (rates, index)
    }
}

/// `<local data dir>/comterm/logs`, or `./logs` when the platform has none.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("comterm"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("logs")
}

// ============================================================================
// Tests
// ============================================================================
