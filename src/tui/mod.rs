// src/tui/mod.rs
//
// Interactive terminal front end (ratatui + crossterm).

mod app;
mod ui;

pub use app::{Action, App, Focus, Transcript};

use std::sync::{mpsc, Arc};
use std::time::Duration;

use crossterm::event::{self, Event, KeyEventKind};

use crate::controller::ConnectionController;
use crate::io::serial::{default_port_marker, PortEnumerator, SerialBackend};
use crate::io::SerialError;
use crate::logging::set_console_echo;
use crate::settings::Settings;

/// How long the event loop waits for a key before redrawing.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run the terminal until the user quits. Any open port is closed first.
pub fn run(settings: &Settings, backend: Arc<dyn SerialBackend>) -> std::io::Result<()> {
    let marker = settings
        .port_marker
        .clone()
        .unwrap_or_else(|| default_port_marker().to_string());
    let enumerator = PortEnumerator::new(backend.clone(), marker.clone());

    let (tx, rx) = mpsc::channel();
    let mut controller =
        ConnectionController::new(backend, Arc::new(tx), settings.port_config(settings.baud))
            .with_port_marker(marker);

    let (rates, baud_index) = settings.baud_menu();
    let mut app = App::new(
        enumerator.refresh(settings.port.as_deref()),
        rates,
        baud_index,
    );

    tlog!("[tui] Starting, {} port(s) listed", app.ports.ports.len());
    set_console_echo(false);
    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &mut app, &mut controller, &enumerator, &rx);
    ratatui::restore();
    set_console_echo(true);

    controller.disconnect();
    tlog!("[tui] Exited");
    result
}

fn event_loop(
    terminal: &mut ratatui::DefaultTerminal,
    app: &mut App,
    controller: &mut ConnectionController,
    enumerator: &PortEnumerator,
    lines: &mpsc::Receiver<crate::io::LogLine>,
) -> std::io::Result<()> {
    while !app.should_quit {
        app.drain(lines);
        terminal.draw(|frame| ui::draw(frame, app))?;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(action) = app.handle_key(key) {
                        dispatch(action, app, controller, enumerator);
                    }
                }
            }
        }
    }
    Ok(())
}

/// Carry out `action` against the port and reflect the outcome in `app`.
pub fn dispatch(
    action: Action,
    app: &mut App,
    controller: &mut ConnectionController,
    enumerator: &PortEnumerator,
) {
    match action {
        Action::RefreshPorts => {
            let previous = app.selected_descriptor().map(str::to_owned);
            app.set_ports(enumerator.refresh(previous.as_deref()));
        }
        Action::ToggleConnection => {
            if controller.is_connected() {
                controller.disconnect();
                app.set_status("Disconnected");
            } else {
                match app.selected_descriptor().map(str::to_owned) {
                    Some(descriptor) => match controller.connect(&descriptor, app.baud()) {
                        Ok(()) => app.set_status("Connected"),
                        Err(e) => app.set_status(e.to_string()),
                    },
                    None => app.set_status("No port selected"),
                }
            }
        }
        Action::Send => match controller.send_selected(app.selected_text()) {
            Ok(_) => {}
            Err(e @ (SerialError::NotConnected | SerialError::EmptyMessage)) => {
                app.set_status(e.to_string())
            }
            Err(e) => app.set_status(format!("Send failed: {}", e)),
        },
        Action::Quit => {
            controller.disconnect();
            app.should_quit = true;
        }
    }
    app.set_connection(
        controller
            .connection()
            .map(|(port, baud)| (port.to_string(), baud)),
    );
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::serial::mock::{MockBackend, MockDevice};
    use crate::io::serial::{PortKind, SerialPortInfo};
    use crate::io::{LineTag, LogLine, PortConfig};
    use crate::settings::{BAUD_RATES, DEFAULT_BAUD_INDEX};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    struct Harness {
        app: App,
        controller: ConnectionController,
        enumerator: PortEnumerator,
        device: Arc<MockDevice>,
        lines: mpsc::Receiver<LogLine>,
    }

    fn port(name: &str, product: &str) -> SerialPortInfo {
        SerialPortInfo {
            port_name: name.to_string(),
            kind: PortKind::Usb,
            product: Some(product.to_string()),
            ..Default::default()
        }
    }

    fn harness() -> Harness {
        let device = MockDevice::new();
        let backend: Arc<dyn SerialBackend> = Arc::new(
            MockBackend::with_ports(vec![port("COM6", "USB-Serial")])
                .with_device("COM6", device.clone()),
        );
        let enumerator = PortEnumerator::new(backend.clone(), "(COM");
        let (tx, lines) = mpsc::channel();
        let controller = ConnectionController::new(backend, Arc::new(tx), PortConfig::default());
        let app = App::new(enumerator.refresh(None), BAUD_RATES.to_vec(), DEFAULT_BAUD_INDEX);
        Harness {
            app,
            controller,
            enumerator,
            device,
            lines,
        }
    }

    impl Harness {
        fn run(&mut self, action: Action) {
            dispatch(action, &mut self.app, &mut self.controller, &self.enumerator);
            self.app.drain(&self.lines);
        }

        fn type_text(&mut self, text: &str) {
            for c in text.chars() {
                self.app
                    .handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
            }
        }
    }

    #[test]
    fn test_connect_send_disconnect() {
        let mut h = harness();
        assert_eq!(h.app.selected_descriptor(), Some("USB-Serial (COM6)"));

        h.run(Action::ToggleConnection);
        assert!(h.app.is_connected());
        assert!(h.app.status_line().starts_with("Connected: COM6 @ 115200"));

        h.type_text("AT");
        h.run(Action::Send);
        assert_eq!(h.device.written(), b"AT".to_vec());

        h.run(Action::ToggleConnection);
        assert!(!h.app.is_connected());
        assert_eq!(
            h.app.transcript.lines(),
            [
                "[OK] Connected to COM6 @ 115200",
                "[TX] AT",
                "[INFO] Port disconnected"
            ]
        );
    }

    #[test]
    fn test_send_while_disconnected_goes_to_status_line() {
        let mut h = harness();
        h.type_text("AT");
        h.run(Action::Send);
        assert!(h.app.status_line().contains("not connected"));
        assert!(h.app.transcript.lines().is_empty());
        assert!(h.device.written().is_empty());
    }

    #[test]
    fn test_empty_send_explains_on_status_line() {
        let mut h = harness();
        h.run(Action::ToggleConnection);
        h.run(Action::Send);
        assert!(h
            .app
            .status_line()
            .contains("nothing sent: the selected message is empty"));
        assert!(h.device.written().is_empty());
    }

    #[test]
    fn test_quit_disconnects_first() {
        let mut h = harness();
        h.run(Action::ToggleConnection);
        h.run(Action::Quit);
        assert!(h.app.should_quit);
        assert!(!h.controller.is_connected());
        assert_eq!(h.device.open_handles(), 0);
    }

    #[test]
    fn test_connect_without_ports() {
        let backend: Arc<dyn SerialBackend> = Arc::new(MockBackend::default());
        let enumerator = PortEnumerator::new(backend.clone(), "(COM");
        let (tx, _lines) = mpsc::channel();
        let mut controller =
            ConnectionController::new(backend, Arc::new(tx), PortConfig::default());
        let mut app = App::new(enumerator.refresh(None), BAUD_RATES.to_vec(), DEFAULT_BAUD_INDEX);

        dispatch(Action::ToggleConnection, &mut app, &mut controller, &enumerator);
        assert!(app.status_line().ends_with("No port selected"));
        assert!(!controller.is_connected());
    }

    #[test]
    fn test_received_hex_reaches_scrollback() {
        let mut h = harness();
        h.run(Action::ToggleConnection);
        h.device.push_data(&[0xFF, 0x00]);

        let line = h.lines.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(line.tag, LineTag::RxHex);
        h.app.transcript.append(&line.render());
        assert_eq!(h.app.transcript.lines().last().map(String::as_str), Some("[RX HEX] FF 00 "));
    }
}
