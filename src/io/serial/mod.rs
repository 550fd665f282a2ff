// src/io/serial/mod.rs
//
// Serial port transport.
//
// Features:
// - Port discovery with display names and device-name extraction
// - Session lifecycle (open/configure/close) over the serialport crate
// - Background receive loop, stopped by cancelling its pending read

pub mod link;
#[cfg(test)]
pub(crate) mod mock;
pub mod ports;
pub mod receiver;
pub mod session;
pub(crate) mod utils;

pub use link::{PortKind, SerialBackend, SerialLink, SerialPortInfo, SystemBackend};
pub use ports::{
    default_port_marker, device_path, extract_device_name, extract_device_name_with,
    PortDescriptor, PortEnumerator, PortSelection,
};
pub use receiver::{ReceiveLoop, ReceiveStats, READ_BUFFER_SIZE};
pub use session::{PortSession, SessionReader};
pub use utils::{FlowControl, Parity};
