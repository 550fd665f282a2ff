// src/io/error.rs
//
// Error types for the serial transport. Open/config/write failures surface to
// the user as a single status line; read errors stay inside the receive loop.

use std::fmt;
use std::io;

use thiserror::Error;

/// Configuration step that a driver rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigStep {
    BufferSizes,
    Purge,
    ReadLineSettings,
    ApplyLineSettings,
    Timeouts,
    AssertDtr,
    AssertRts,
}

impl fmt::Display for ConfigStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigStep::BufferSizes => "size driver queues",
            ConfigStep::Purge => "purge buffers",
            ConfigStep::ReadLineSettings => "read line settings",
            ConfigStep::ApplyLineSettings => "apply line settings",
            ConfigStep::Timeouts => "install timeouts",
            ConfigStep::AssertDtr => "assert DTR",
            ConfigStep::AssertRts => "assert RTS",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by the session and controller.
#[derive(Debug, Error)]
pub enum SerialError {
    /// Device busy, missing or access denied.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },

    /// Driver rejected the requested line settings.
    #[error("failed to configure {port} ({step}): {source}")]
    Config {
        port: String,
        step: ConfigStep,
        #[source]
        source: io::Error,
    },

    /// Write failed or timed out.
    #[error("write to {port} failed: {source}")]
    Write {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("receiver thread could not be started: {0}")]
    Spawn(#[source] io::Error),

    #[error("already connected to {0}")]
    AlreadyConnected(String),

    #[error("not connected to a serial port")]
    NotConnected,

    #[error("nothing sent: the selected message is empty")]
    EmptyMessage,
}

impl SerialError {
    pub fn open(port: impl Into<String>, source: io::Error) -> Self {
        SerialError::Open {
            port: port.into(),
            source,
        }
    }

    pub fn config(port: impl Into<String>, step: ConfigStep, source: io::Error) -> Self {
        SerialError::Config {
            port: port.into(),
            step,
            source,
        }
    }

    pub fn write(port: impl Into<String>, source: io::Error) -> Self {
        SerialError::Write {
            port: port.into(),
            source,
        }
    }
}

/// Outcome of a failed `read_block`. An idle timeout is not an error and is
/// reported as an empty read instead.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The session is closing; the receive loop must stop.
    #[error("read aborted")]
    Aborted,

    /// Unexpected driver error; retried after a short pause.
    #[error("transient read error: {0}")]
    Transient(#[source] io::Error),
}
