// src/controller.rs
//
// Connection controller: maps the user's connect / disconnect / send actions
// onto the port session and its receive loop, and reports each outcome as a
// status line on the display.
//
// At most one session exists at a time; it lives in `session` and nowhere else.

use std::sync::Arc;

use crate::io::codec::{encode, LINE_BREAK};
use crate::io::serial::{
    default_port_marker, extract_device_name_with, PortSession, ReceiveStats, SerialBackend,
};
use crate::io::{LineSink, LineTag, LogLine, PortConfig, SerialError, SessionState};

pub struct ConnectionController {
    backend: Arc<dyn SerialBackend>,
    sink: Arc<dyn LineSink>,
    /// Settings applied to every new session; only the baud rate varies.
    template: PortConfig,
    /// Picks the device name out of a display name.
    port_marker: String,
    session: Option<PortSession>,
}

impl ConnectionController {
    pub fn new(
        backend: Arc<dyn SerialBackend>,
        sink: Arc<dyn LineSink>,
        template: PortConfig,
    ) -> Self {
        Self {
            backend,
            sink,
            template,
            port_marker: default_port_marker().to_string(),
            session: None,
        }
    }

    pub fn with_port_marker(mut self, marker: impl Into<String>) -> Self {
        self.port_marker = marker.into();
        self
    }

    /// Open the port named by `descriptor` (a display name such as
    /// `"USB-Serial (COM6)"`, or a bare device name) and start receiving.
    pub fn connect(&mut self, descriptor: &str, baud: u32) -> Result<(), SerialError> {
        if let Some(session) = &self.session {
            return Err(SerialError::AlreadyConnected(session.port().to_string()));
        }

        let device = extract_device_name_with(descriptor, &self.port_marker);
        let config = PortConfig {
            baud_rate: baud,
            ..self.template.clone()
        };

        let opened = PortSession::open(self.backend.as_ref(), &device, config)
            .and_then(|mut session| {
                session.start_receiver(self.sink.clone())?;
                Ok(session)
            });

        match opened {
            Ok(session) => {
                self.session = Some(session);
                self.status(LineTag::Ok, format!("Connected to {} @ {}", device, baud));
                Ok(())
            }
            Err(e) => {
                tlog!("[controller] Connect to {} failed: {}", device, e);
                self.status(LineTag::Error, "Failed to connect");
                Err(e)
            }
        }
    }

    /// Stop receiving, wait for the receive loop to exit and close the port.
    /// Returns `None` when there was nothing to disconnect.
    pub fn disconnect(&mut self) -> Option<ReceiveStats> {
        let mut session = self.session.take()?;
        let stats = session.close();
        self.status(LineTag::Info, "Port disconnected");
        stats
    }

    /// Send `text` exactly as typed. Not being connected is reported to the
    /// caller only; write outcomes are also logged on the display.
    pub fn send_selected(&mut self, text: &str) -> Result<usize, SerialError> {
        let session = self.session.as_mut().ok_or(SerialError::NotConnected)?;
        // A zero-byte write would only log a bare "[TX] "; tell the user instead
        if text.is_empty() {
            return Err(SerialError::EmptyMessage);
        }

        let bytes = encode(text);
        let result = session.send(&bytes);
        let line = match &result {
            Ok(n) if *n == bytes.len() => {
                LogLine::new(LineTag::Tx, format!("{}{}", text, LINE_BREAK))
            }
            Ok(n) => LogLine::new(
                LineTag::Tx,
                format!("{} ({}/{} bytes){}", text, n, bytes.len(), LINE_BREAK),
            ),
            Err(e) => LogLine::new(LineTag::TxError, format!("{}{}", e, LINE_BREAK)),
        };
        self.sink.append(line);
        result
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Closed, PortSession::state)
    }

    pub fn is_receiving(&self) -> bool {
        self.session.as_ref().is_some_and(PortSession::is_receiving)
    }

    pub fn receiver_alive(&self) -> bool {
        self.session.as_ref().is_some_and(PortSession::receiver_alive)
    }

    /// Device name and baud rate of the open session.
    pub fn connection(&self) -> Option<(&str, u32)> {
        self.session
            .as_ref()
            .map(|s| (s.port(), s.config().baud_rate))
    }

    fn status(&self, tag: LineTag, text: impl Into<String>) {
        let mut text = text.into();
        text.push_str(LINE_BREAK);
        self.sink.append(LogLine::new(tag, text));
    }
}

// ============================================================================
// Tests
// ============================================================================
