// src/io/mod.rs
//
// Serial I/O for the terminal: wire codec, error types, shared types and
// the serial transport itself.

pub mod codec;
mod error;
pub mod serial;
mod types;

pub use codec::{decode, encode, Decoded};
pub use error::{ConfigStep, ReadError, SerialError};
pub use types::{
    LineSettings, LineSink, LineTag, LogLine, PortConfig, SessionState,
    DEFAULT_READ_TIMEOUT_MS, DEFAULT_WRITE_TIMEOUT_MS,
};
