// src/io/serial/link.rs
//
// Transport seam between the session logic and the OS serial driver.
//
// `SerialLink` is the narrow set of driver operations a session needs;
// `SerialBackend` enumerates and opens devices. `SystemBackend` implements
// both on top of the serialport crate's native port types. Tests substitute
// an in-memory mock.
//
// Timeouts are installed once per device with separate read and write
// limits. On Windows COMMTIMEOUTS belong to the device, so every handle sees
// the same pair; elsewhere each handle carries the pair and applies the one
// matching the operation.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serialport::SerialPort;

use super::utils;
use crate::io::types::{LineSettings, PortConfig};

// ============================================================================
// Traits
// ============================================================================

/// An open serial device handle.
pub trait SerialLink: Send {
    /// Size the driver's input and output queues.
    fn set_buffer_sizes(&mut self, input: usize, output: usize) -> io::Result<()>;

    /// Abort in-flight transfers and discard pending input and output.
    fn purge(&mut self) -> io::Result<()>;

    /// Current line-control state as reported by the driver.
    fn line_settings(&self) -> io::Result<LineSettings>;

    /// Commit line-control state to the driver.
    fn set_line_settings(&mut self, settings: &LineSettings) -> io::Result<()>;

    /// Reads return as soon as data is available, otherwise after `read`.
    /// Writes wait at most `write`. Applies to every handle on the device.
    fn set_timeouts(&mut self, read: Duration, write: Duration) -> io::Result<()>;

    fn set_dtr(&mut self, level: bool) -> io::Result<()>;

    fn set_rts(&mut self, level: bool) -> io::Result<()>;

    /// One read request. `Ok(0)` or `TimedOut` both mean no data arrived.
    /// After `cancel_reads`, fails with `Interrupted`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// One write request; may return fewer bytes than requested.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// End any read pending on this device, from any handle, and make later
    /// reads fail immediately.
    fn cancel_reads(&self) -> io::Result<()>;

    /// Second handle to the same device, used by the receive loop.
    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PortKind {
    Usb,
    Bluetooth,
    Pci,
    #[default]
    Unknown,
}

/// A serial device present on the host.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SerialPortInfo {
    pub port_name: String,
    pub kind: PortKind,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
}

impl From<serialport::SerialPortInfo> for SerialPortInfo {
    fn from(info: serialport::SerialPortInfo) -> Self {
        let (kind, manufacturer, product) = match info.port_type {
            serialport::SerialPortType::UsbPort(usb) => {
                (PortKind::Usb, usb.manufacturer, usb.product)
            }
            serialport::SerialPortType::BluetoothPort => (PortKind::Bluetooth, None, None),
            serialport::SerialPortType::PciPort => (PortKind::Pci, None, None),
            serialport::SerialPortType::Unknown => (PortKind::Unknown, None, None),
        };
        Self {
            port_name: info.port_name,
            kind,
            manufacturer,
            product,
        }
    }
}

/// Host access to serial devices.
pub trait SerialBackend: Send + Sync {
    /// Devices currently present, in host enumeration order.
    fn available_ports(&self) -> io::Result<Vec<SerialPortInfo>>;

    /// Open `path` for exclusive access.
    fn open(&self, path: &str, config: &PortConfig) -> io::Result<Box<dyn SerialLink>>;
}

// ============================================================================
// serialport implementation
// ============================================================================

#[cfg(unix)]
type NativePort = serialport::TTYPort;
#[cfg(windows)]
type NativePort = serialport::COMPort;

/// Longest single wait inside a read where the OS offers no way to interrupt
/// it from another thread. Bounds how long `cancel_reads` takes to land.
#[cfg(unix)]
const READ_SLICE: Duration = Duration::from_millis(20);

/// Backend over the serialport crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBackend;

impl SerialBackend for SystemBackend {
    fn available_ports(&self) -> io::Result<Vec<SerialPortInfo>> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            // macOS tty.* call-in devices block on open waiting for carrier
            // detect; the cu.* twins are the ones to offer
            .filter(|p| !(cfg!(target_os = "macos") && p.port_name.starts_with("/dev/tty.")))
            .map(SerialPortInfo::from)
            .collect())
    }

    fn open(&self, path: &str, config: &PortConfig) -> io::Result<Box<dyn SerialLink>> {
        // serialport opens devices exclusively (TIOCEXCL / no share mode)
        let port = serialport::new(path, config.baud_rate)
            .data_bits(utils::to_serialport_data_bits(config.data_bits))
            .stop_bits(utils::to_serialport_stop_bits(config.stop_bits))
            .parity(utils::to_serialport_parity(config.parity))
            .flow_control(utils::to_serialport_flow_control(config.flow_control))
            .timeout(config.read_timeout())
            .open_native()?;
        Ok(Box::new(SystemLink::new(
            port,
            config.read_timeout(),
            config.write_timeout(),
        )))
    }
}

/// A device handle opened through the serialport crate.
pub struct SystemLink {
    port: NativePort,
    read_timeout: Duration,
    write_timeout: Duration,
    /// Shared by every clone of this handle.
    cancelled: Arc<AtomicBool>,
}

impl SystemLink {
    pub fn new(port: NativePort, read_timeout: Duration, write_timeout: Duration) -> Self {
        Self {
            port,
            read_timeout,
            write_timeout,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn check_cancelled(&self) -> io::Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "read cancelled"));
        }
        Ok(())
    }

    #[cfg(windows)]
    fn handle(&self) -> windows_sys::Win32::Foundation::HANDLE {
        use std::os::windows::io::AsRawHandle;
        self.port.as_raw_handle() as windows_sys::Win32::Foundation::HANDLE
    }
}

/// COMMTIMEOUTS constants must lie in 1..MAXDWORD when the read interval
/// and multiplier are both MAXDWORD.
#[cfg(windows)]
fn timeout_constant(timeout: Duration) -> u32 {
    timeout.as_millis().clamp(1, u128::from(u32::MAX - 1)) as u32
}

impl SerialLink for SystemLink {
    #[cfg(windows)]
    fn set_buffer_sizes(&mut self, input: usize, output: usize) -> io::Result<()> {
        use windows_sys::Win32::Devices::Communication::SetupComm;
        let input = u32::try_from(input).unwrap_or(u32::MAX);
        let output = u32::try_from(output).unwrap_or(u32::MAX);
        if unsafe { SetupComm(self.handle(), input, output) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(unix)]
    fn set_buffer_sizes(&mut self, _input: usize, _output: usize) -> io::Result<()> {
        // termios has no queue sizing; the kernel buffers are fixed
        Ok(())
    }

    #[cfg(windows)]
    fn purge(&mut self) -> io::Result<()> {
        use windows_sys::Win32::Devices::Communication::{
            PurgeComm, PURGE_RXABORT, PURGE_RXCLEAR, PURGE_TXABORT, PURGE_TXCLEAR,
        };
        let flags = PURGE_RXABORT | PURGE_TXABORT | PURGE_RXCLEAR | PURGE_TXCLEAR;
        if unsafe { PurgeComm(self.handle(), flags) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(unix)]
    fn purge(&mut self) -> io::Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    fn line_settings(&self) -> io::Result<LineSettings> {
        Ok(LineSettings {
            baud_rate: self.port.baud_rate()?,
            data_bits: utils::from_serialport_data_bits(self.port.data_bits()?),
            parity: utils::from_serialport_parity(self.port.parity()?),
            stop_bits: utils::from_serialport_stop_bits(self.port.stop_bits()?),
            flow_control: utils::from_serialport_flow_control(self.port.flow_control()?),
        })
    }

    fn set_line_settings(&mut self, settings: &LineSettings) -> io::Result<()> {
        self.port.set_baud_rate(settings.baud_rate)?;
        self.port
            .set_data_bits(utils::to_serialport_data_bits(settings.data_bits))?;
        self.port.set_parity(utils::to_serialport_parity(settings.parity))?;
        self.port
            .set_stop_bits(utils::to_serialport_stop_bits(settings.stop_bits))?;
        self.port
            .set_flow_control(utils::to_serialport_flow_control(settings.flow_control))?;
        Ok(())
    }

    #[cfg(windows)]
    fn set_timeouts(&mut self, read: Duration, write: Duration) -> io::Result<()> {
        use windows_sys::Win32::Devices::Communication::{SetCommTimeouts, COMMTIMEOUTS};
        // MAXDWORD interval and multiplier: return at once when bytes are
        // buffered, otherwise wait up to the constant for the first byte
        let timeouts = COMMTIMEOUTS {
            ReadIntervalTimeout: u32::MAX,
            ReadTotalTimeoutMultiplier: u32::MAX,
            ReadTotalTimeoutConstant: timeout_constant(read),
            WriteTotalTimeoutMultiplier: 0,
            WriteTotalTimeoutConstant: timeout_constant(write),
        };
        if unsafe { SetCommTimeouts(self.handle(), &timeouts) } == 0 {
            return Err(io::Error::last_os_error());
        }
        self.read_timeout = read;
        self.write_timeout = write;
        Ok(())
    }

    #[cfg(unix)]
    fn set_timeouts(&mut self, read: Duration, write: Duration) -> io::Result<()> {
        self.read_timeout = read;
        self.write_timeout = write;
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> io::Result<()> {
        self.port.write_data_terminal_ready(level)?;
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> io::Result<()> {
        self.port.write_request_to_send(level)?;
        Ok(())
    }

    #[cfg(windows)]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.check_cancelled()?;
        self.port.read(buf)
    }

    /// Waits in slices so a cancel from another handle is seen within one
    /// `READ_SLICE`.
    #[cfg(unix)]
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let deadline = std::time::Instant::now() + self.read_timeout;
        loop {
            self.check_cancelled()?;
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            self.port.set_timeout(remaining.min(READ_SLICE))?;
            match self.port.read(buf) {
                Err(e) if e.kind() == io::ErrorKind::TimedOut && remaining > READ_SLICE => {}
                result => return result,
            }
        }
    }

    /// No flush: draining the output queue is not bounded by the write
    /// timeout, and the count returned is what the driver accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        #[cfg(unix)]
        self.port.set_timeout(self.write_timeout)?;
        self.port.write(buf)
    }

    #[cfg(windows)]
    fn cancel_reads(&self) -> io::Result<()> {
        use windows_sys::Win32::Foundation::ERROR_NOT_FOUND;
        use windows_sys::Win32::System::IO::CancelIoEx;

        self.cancelled.store(true, Ordering::SeqCst);
        // Clones share the file object, so this reaches the reader's ReadFile
        if unsafe { CancelIoEx(self.handle(), std::ptr::null()) } == 0 {
            let e = io::Error::last_os_error();
            // Nothing was pending
            if e.raw_os_error() == Some(ERROR_NOT_FOUND as i32) {
                return Ok(());
            }
            return Err(e);
        }
        Ok(())
    }

    #[cfg(unix)]
    fn cancel_reads(&self) -> io::Result<()> {
        self.cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>> {
        let port = self.port.try_clone_native()?;
        Ok(Box::new(SystemLink {
            port,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            cancelled: self.cancelled.clone(),
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================
