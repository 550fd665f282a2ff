// src/io/serial/session.rs
//
// One open serial connection.
//
// Lifecycle: Closed -> Opening -> Open -> Closing -> Closed. `open` acquires
// and configures the device; the caller then starts the receive loop. The
// control thread owns the write handle, the receive loop owns a cloned read
// handle, and the two share only the `receiving` and `abort` flags. Closing
// also cancels the reader's pending read through the control handle.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::link::{SerialBackend, SerialLink};
use super::ports::device_path;
use super::receiver::{ReceiveLoop, ReceiveStats};
use super::utils::framing_summary;
use crate::io::codec::hex_preview;
use crate::io::error::{ConfigStep, ReadError, SerialError};
use crate::io::types::{LineSink, PortConfig, SessionState};

/// Bytes shown in diagnostic previews of outbound data.
const PREVIEW_BYTES: usize = 16;

/// Driver input and output queue size requested at open.
pub const DRIVER_QUEUE_BYTES: usize = 4096;

/// Pause between cancel attempts while the receive thread winds down.
const CANCEL_RETRY: Duration = Duration::from_millis(5);

// ============================================================================
// Port Session
// ============================================================================

pub struct PortSession {
    port: String,
    config: PortConfig,
    state: SessionState,
    link: Option<Box<dyn SerialLink>>,
    receiving: Arc<AtomicBool>,
    abort: Arc<AtomicBool>,
    receiver: Option<ReceiveLoop>,
}

impl PortSession {
    /// Open `device_name` exclusively and apply `config`. The receive loop is
    /// not started; see [`PortSession::start_receiver`].
    pub fn open(
        backend: &dyn SerialBackend,
        device_name: &str,
        config: PortConfig,
    ) -> Result<Self, SerialError> {
        let mut session = Self {
            port: device_name.to_string(),
            config,
            state: SessionState::Opening,
            link: None,
            receiving: Arc::new(AtomicBool::new(false)),
            abort: Arc::new(AtomicBool::new(false)),
            receiver: None,
        };

        let path = device_path(device_name);
        let mut link = match backend.open(&path, &session.config) {
            Ok(link) => link,
            Err(e) => {
                session.state = SessionState::Closed;
                let e = SerialError::open(device_name, e);
                tlog!("[session:{}] {}", device_name, e);
                return Err(e);
            }
        };

        if let Err(e) = configure(link.as_mut(), device_name, &session.config) {
            // Close the handle before reporting failure
            drop(link);
            session.state = SessionState::Closed;
            tlog!("[session:{}] {}", device_name, e);
            return Err(e);
        }

        session.link = Some(link);
        session.state = SessionState::Open;
        tlog!(
            "[session:{}] Opened {} at {} baud ({}, flow control {:?})",
            session.port,
            path,
            session.config.baud_rate,
            framing_summary(
                session.config.data_bits,
                session.config.parity,
                session.config.stop_bits
            ),
            session.config.flow_control
        );
        Ok(session)
    }

    /// Start the receive loop. At most one loop exists per session; calling
    /// this twice is a programming error.
    pub fn start_receiver(&mut self, sink: Arc<dyn LineSink>) -> Result<(), SerialError> {
        assert!(
            self.receiver.is_none(),
            "receive loop already running for {}",
            self.port
        );
        let link = match (self.state, self.link.as_ref()) {
            (SessionState::Open, Some(link)) => link,
            _ => return Err(SerialError::NotConnected),
        };

        let read_link = link.try_clone().map_err(SerialError::Spawn)?;
        let reader = SessionReader::new(&self.port, read_link, self.abort.clone());
        self.receiving.store(true, Ordering::SeqCst);
        match ReceiveLoop::spawn(reader, self.receiving.clone(), sink) {
            Ok(receiver) => {
                self.receiver = Some(receiver);
                Ok(())
            }
            Err(e) => {
                self.receiving.store(false, Ordering::SeqCst);
                Err(SerialError::Spawn(e))
            }
        }
    }

    /// Write `bytes` as one request. A short write is returned as-is.
    pub fn send(&mut self, bytes: &[u8]) -> Result<usize, SerialError> {
        let link = match (self.state, self.link.as_mut()) {
            (SessionState::Open, Some(link)) => link,
            _ => return Err(SerialError::NotConnected),
        };

        match link.write(bytes) {
            Ok(n) => {
                if n < bytes.len() {
                    tlog!(
                        "[session:{}] Short write: {} of {} bytes [{}]",
                        self.port,
                        n,
                        bytes.len(),
                        hex_preview(bytes, PREVIEW_BYTES)
                    );
                }
                Ok(n)
            }
            Err(e) => {
                tlog!(
                    "[session:{}] Write failed: {} [{}]",
                    self.port,
                    e,
                    hex_preview(bytes, PREVIEW_BYTES)
                );
                Err(SerialError::write(&self.port, e))
            }
        }
    }

    /// Stop the receive loop, wait for it to exit, then release the device.
    /// Closing a closed session does nothing.
    pub fn close(&mut self) -> Option<ReceiveStats> {
        if self.state == SessionState::Closed {
            return None;
        }
        self.state = SessionState::Closing;

        self.receiving.store(false, Ordering::SeqCst);
        self.abort.store(true, Ordering::SeqCst);
        let stats = self.receiver.take().map(|receiver| {
            receiver.request_stop();
            self.cancel_pending_read(&receiver);
            receiver.await_exit()
        });

        // The read handle went with the receive thread; now the write handle
        self.link = None;
        self.state = SessionState::Closed;
        tlog!("[session:{}] Closed", self.port);
        stats
    }

    /// Cancel the receiver's in-flight read until the thread exits. A cancel
    /// can land between two reads, so it is repeated, for at most one read
    /// timeout.
    fn cancel_pending_read(&self, receiver: &ReceiveLoop) {
        let Some(link) = self.link.as_ref() else {
            return;
        };
        let deadline = Instant::now() + self.config.read_timeout();
        while receiver.is_alive() && Instant::now() < deadline {
            if let Err(e) = link.cancel_reads() {
                tlog!("[session:{}] Cancel of pending read failed: {}", self.port, e);
                return;
            }
            thread::sleep(CANCEL_RETRY);
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_receiving(&self) -> bool {
        self.receiving.load(Ordering::SeqCst)
    }

    pub fn receiver_alive(&self) -> bool {
        self.receiver.as_ref().is_some_and(ReceiveLoop::is_alive)
    }
}

impl Drop for PortSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Bring a freshly opened handle to a known state: driver queues, purge, line
/// settings, timeouts, then DTR/RTS. Stops at the first step the driver
/// rejects.
pub fn configure(
    link: &mut dyn SerialLink,
    port: &str,
    config: &PortConfig,
) -> Result<(), SerialError> {
    let fail = |step: ConfigStep| move |e: io::Error| SerialError::config(port, step, e);

    link.set_buffer_sizes(DRIVER_QUEUE_BYTES, DRIVER_QUEUE_BYTES)
        .map_err(fail(ConfigStep::BufferSizes))?;
    link.purge().map_err(fail(ConfigStep::Purge))?;

    let mut settings = link
        .line_settings()
        .map_err(fail(ConfigStep::ReadLineSettings))?;
    config.apply_to(&mut settings);
    link.set_line_settings(&settings)
        .map_err(fail(ConfigStep::ApplyLineSettings))?;

    link.set_timeouts(config.read_timeout(), config.write_timeout())
        .map_err(fail(ConfigStep::Timeouts))?;

    // USB-serial adapters often refuse to transmit until both lines are
    // driven explicitly, whatever the line settings say.
    link.set_dtr(config.dtr_enabled)
        .map_err(fail(ConfigStep::AssertDtr))?;
    link.set_rts(config.rts_enabled)
        .map_err(fail(ConfigStep::AssertRts))?;

    Ok(())
}

// ============================================================================
// Session Reader
// ============================================================================

/// Read side of a session, owned by the receive loop.
pub struct SessionReader {
    port: String,
    link: Box<dyn SerialLink>,
    abort: Arc<AtomicBool>,
}

impl SessionReader {
    pub fn new(port: &str, link: Box<dyn SerialLink>, abort: Arc<AtomicBool>) -> Self {
        Self {
            port: port.to_string(),
            link,
            abort,
        }
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub(crate) fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    /// One read request. `Ok(0)` is an idle timeout. Once the session has
    /// requested an abort, any read that yields no data reports `Aborted`.
    pub fn read_block(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        if self.abort.load(Ordering::SeqCst) {
            return Err(ReadError::Aborted);
        }

        let result = self.link.read(buf);
        let aborted = self.abort.load(Ordering::SeqCst);
        match result {
            Ok(n) if n > 0 => Ok(n),
            Ok(_) if aborted => Err(ReadError::Aborted),
            Ok(_) => Ok(0),
            Err(_) if aborted => Err(ReadError::Aborted),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(0)
            }
            Err(e) => Err(ReadError::Transient(e)),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
