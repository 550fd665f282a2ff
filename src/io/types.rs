// src/io/types.rs
//
// Shared types for the serial transport: port configuration, session
// lifecycle states, and the tagged lines handed to the display.

use std::sync::mpsc;
use std::time::Duration;

use super::serial::utils::{FlowControl, Parity};

// ============================================================================
// Port Configuration
// ============================================================================

pub const DEFAULT_READ_TIMEOUT_MS: u64 = 50;
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 100;

/// Line settings for one session. Built at connect time and never changed
/// while the session is open.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PortConfig {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub flow_control: FlowControl,
    pub dtr_enabled: bool,
    pub rts_enabled: bool,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl PortConfig {
    /// 8N1, no flow control, DTR/RTS asserted, default timeouts.
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            flow_control: FlowControl::None,
            dtr_enabled: true,
            rts_enabled: true,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Overwrite the framing fields of `current` with this config.
    pub fn apply_to(&self, current: &mut LineSettings) {
        current.baud_rate = self.baud_rate;
        current.data_bits = self.data_bits;
        current.parity = self.parity;
        current.stop_bits = self.stop_bits;
        current.flow_control = self.flow_control;
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self::new(115_200)
    }
}

/// Line-control state as reported by the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
    pub flow_control: FlowControl,
}

// ============================================================================
// Session State
// ============================================================================

/// Lifecycle of a port session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Open,
    Closing,
}

// ============================================================================
// Display Lines
// ============================================================================

/// Marker prefixed to each line appended to the terminal log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineTag {
    Rx,
    RxHex,
    Tx,
    TxError,
    Ok,
    Error,
    Info,
}

impl LineTag {
    pub fn prefix(self) -> &'static str {
        match self {
            LineTag::Rx => "[RX] ",
            LineTag::RxHex => "[RX HEX] ",
            LineTag::Tx => "[TX] ",
            LineTag::TxError => "[TX ERROR] ",
            LineTag::Ok => "[OK] ",
            LineTag::Error => "[ERROR] ",
            LineTag::Info => "[INFO] ",
        }
    }
}

/// One entry appended to the append-only terminal log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub tag: LineTag,
    pub text: String,
}

impl LogLine {
    pub fn new(tag: LineTag, text: impl Into<String>) -> Self {
        Self {
            tag,
            text: text.into(),
        }
    }

    /// Prefix plus text, exactly as shown in the log.
    pub fn render(&self) -> String {
        format!("{}{}", self.tag.prefix(), self.text)
    }
}

/// Display collaborator. Receives lines from both the control thread and
/// the receive loop, so implementations must be thread-safe.
pub trait LineSink: Send + Sync {
    fn append(&self, line: LogLine);
}

impl LineSink for mpsc::Sender<LogLine> {
    fn append(&self, line: LogLine) {
        // Receiver gone means the UI has shut down; nothing left to show.
        let _ = self.send(line);
    }
}
