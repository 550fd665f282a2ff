// src/io/serial/mock.rs
//
// In-memory serial device for tests. Reads are scripted, writes and
// configuration calls are recorded, and individual steps can be made to fail.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::link::{SerialBackend, SerialLink, SerialPortInfo};
use super::utils::{FlowControl, Parity};
use crate::io::types::{LineSettings, PortConfig};

/// One scripted outcome of a read request.
pub(crate) enum MockRead {
    Data(Vec<u8>),
    Error(io::ErrorKind),
}

/// Shared state behind every handle opened on one mock device.
pub(crate) struct MockDevice {
    inbound: Mutex<VecDeque<MockRead>>,
    written: Mutex<Vec<u8>>,
    calls: Mutex<Vec<&'static str>>,
    settings: Mutex<LineSettings>,
    timeout: Mutex<Duration>,
    write_timeout: Mutex<Duration>,
    buffer_sizes: Mutex<Option<(usize, usize)>>,
    cancelled: AtomicBool,
    cancels: AtomicUsize,
    abort_on_read: Mutex<Option<Arc<AtomicBool>>>,
    fail_call: Mutex<Option<&'static str>>,
    write_limit: Mutex<Option<usize>>,
    write_fails: AtomicBool,
    pub dtr: AtomicBool,
    pub rts: AtomicBool,
    open_handles: AtomicUsize,
    reads: AtomicUsize,
}

impl MockDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inbound: Mutex::new(VecDeque::new()),
            written: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            settings: Mutex::new(LineSettings {
                baud_rate: 9600,
                data_bits: 7,
                parity: Parity::Even,
                stop_bits: 2,
                flow_control: FlowControl::Hardware,
            }),
            timeout: Mutex::new(Duration::from_millis(50)),
            write_timeout: Mutex::new(Duration::from_millis(50)),
            buffer_sizes: Mutex::new(None),
            cancelled: AtomicBool::new(false),
            cancels: AtomicUsize::new(0),
            abort_on_read: Mutex::new(None),
            fail_call: Mutex::new(None),
            write_limit: Mutex::new(None),
            write_fails: AtomicBool::new(false),
            dtr: AtomicBool::new(false),
            rts: AtomicBool::new(false),
            open_handles: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        })
    }

    pub fn push_data(&self, bytes: &[u8]) {
        self.inbound
            .lock()
            .unwrap()
            .push_back(MockRead::Data(bytes.to_vec()));
    }

    pub fn push_error(&self, kind: io::ErrorKind) {
        self.inbound.lock().unwrap().push_back(MockRead::Error(kind));
    }

    /// Make the named `SerialLink` call fail with `InvalidInput`.
    pub fn fail_on(&self, call: &'static str) {
        *self.fail_call.lock().unwrap() = Some(call);
    }

    pub fn limit_writes_to(&self, n: usize) {
        *self.write_limit.lock().unwrap() = Some(n);
    }

    pub fn fail_writes(&self) {
        self.write_fails.store(true, Ordering::SeqCst);
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn settings(&self) -> LineSettings {
        *self.settings.lock().unwrap()
    }

    /// Read timeout installed on the device.
    pub fn timeout(&self) -> Duration {
        *self.timeout.lock().unwrap()
    }

    pub fn write_timeout(&self) -> Duration {
        *self.write_timeout.lock().unwrap()
    }

    pub fn buffer_sizes(&self) -> Option<(usize, usize)> {
        *self.buffer_sizes.lock().unwrap()
    }

    /// Number of `cancel_reads` calls across all handles.
    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Set `flag` while the next read is in flight, as if the session
    /// started closing during that read.
    pub fn abort_on_next_read(&self, flag: Arc<AtomicBool>) {
        *self.abort_on_read.lock().unwrap() = Some(flag);
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn record(&self, call: &'static str) -> io::Result<()> {
        self.calls.lock().unwrap().push(call);
        if *self.fail_call.lock().unwrap() == Some(call) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("mock rejected {}", call),
            ));
        }
        Ok(())
    }
}

/// Handle on a `MockDevice`. Counts itself in `open_handles` until dropped.
pub(crate) struct MockLink {
    device: Arc<MockDevice>,
    timeout: Duration,
}

impl MockLink {
    pub fn open(device: Arc<MockDevice>) -> Self {
        device.open_handles.fetch_add(1, Ordering::SeqCst);
        let timeout = device.timeout();
        Self { device, timeout }
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.device.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SerialLink for MockLink {
    fn set_buffer_sizes(&mut self, input: usize, output: usize) -> io::Result<()> {
        self.device.record("set_buffer_sizes")?;
        *self.device.buffer_sizes.lock().unwrap() = Some((input, output));
        Ok(())
    }

    fn purge(&mut self) -> io::Result<()> {
        self.device.record("purge")
    }

    fn line_settings(&self) -> io::Result<LineSettings> {
        self.device.record("line_settings")?;
        Ok(self.device.settings())
    }

    fn set_line_settings(&mut self, settings: &LineSettings) -> io::Result<()> {
        self.device.record("set_line_settings")?;
        *self.device.settings.lock().unwrap() = *settings;
        Ok(())
    }

    fn set_timeouts(&mut self, read: Duration, write: Duration) -> io::Result<()> {
        self.device.record("set_timeouts")?;
        self.timeout = read;
        *self.device.timeout.lock().unwrap() = read;
        *self.device.write_timeout.lock().unwrap() = write;
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> io::Result<()> {
        self.device.record("set_dtr")?;
        self.device.dtr.store(level, Ordering::SeqCst);
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> io::Result<()> {
        self.device.record("set_rts")?;
        self.device.rts.store(level, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.device.reads.fetch_add(1, Ordering::SeqCst);
        if self.device.cancelled.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "read cancelled"));
        }
        if let Some(flag) = self.device.abort_on_read.lock().unwrap().take() {
            flag.store(true, Ordering::SeqCst);
        }
        let next = self.device.inbound.lock().unwrap().pop_front();
        match next {
            Some(MockRead::Data(bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            Some(MockRead::Error(kind)) => Err(kind.into()),
            None => {
                let deadline = Instant::now() + self.timeout;
                while Instant::now() < deadline {
                    if self.device.cancelled.load(Ordering::SeqCst) {
                        return Err(io::Error::new(io::ErrorKind::Interrupted, "read cancelled"));
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(io::ErrorKind::TimedOut.into())
            }
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.device.write_fails.load(Ordering::SeqCst) {
            return Err(io::ErrorKind::TimedOut.into());
        }
        let n = self
            .device
            .write_limit
            .lock()
            .unwrap()
            .map_or(buf.len(), |limit| limit.min(buf.len()));
        self.device.written.lock().unwrap().extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn cancel_reads(&self) -> io::Result<()> {
        self.device.cancels.fetch_add(1, Ordering::SeqCst);
        self.device.cancelled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>> {
        self.device.record("try_clone")?;
        let mut link = MockLink::open(self.device.clone());
        link.timeout = self.timeout;
        Ok(Box::new(link))
    }
}

/// Backend serving mock devices by port name.
#[derive(Default)]
pub(crate) struct MockBackend {
    ports: Vec<SerialPortInfo>,
    devices: HashMap<String, Arc<MockDevice>>,
    enumeration_fails: bool,
    opened: Mutex<Vec<String>>,
}

impl MockBackend {
    pub fn with_ports(ports: Vec<SerialPortInfo>) -> Self {
        Self {
            ports,
            ..Default::default()
        }
    }

    pub fn failing_enumeration() -> Self {
        Self {
            enumeration_fails: true,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, port_name: &str, device: Arc<MockDevice>) -> Self {
        self.devices.insert(port_name.to_string(), device);
        self
    }

    /// Paths passed to `open`, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl SerialBackend for MockBackend {
    fn available_ports(&self) -> io::Result<Vec<SerialPortInfo>> {
        if self.enumeration_fails {
            return Err(io::Error::new(io::ErrorKind::Other, "enumeration failed"));
        }
        Ok(self.ports.clone())
    }

    fn open(&self, path: &str, _config: &PortConfig) -> io::Result<Box<dyn SerialLink>> {
        self.opened.lock().unwrap().push(path.to_string());
        let name = path.trim_start_matches(r"\\.\");
        let device = self
            .devices
            .get(name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such device"))?;
        if device.open_handles() > 0 {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "device busy"));
        }
        // A fresh open starts with no pending cancellation
        device.cancelled.store(false, Ordering::SeqCst);
        Ok(Box::new(MockLink::open(device.clone())))
    }
}
