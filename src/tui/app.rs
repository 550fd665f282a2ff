// src/tui/app.rs
//
// Terminal UI state: port and baud selectors, the two outbound inputs, the
// scrollback and the status line. Key handling lives here; anything that
// touches the port is returned as an `Action` for the event loop to run.

use std::sync::mpsc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::io::serial::PortSelection;
use crate::io::LogLine;

/// Lines moved by PgUp/PgDn.
pub const PAGE_LINES: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Focus {
    Port,
    Baud,
    Input(usize),
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Port => Focus::Baud,
            Focus::Baud => Focus::Input(0),
            Focus::Input(0) => Focus::Input(1),
            Focus::Input(_) => Focus::Port,
        }
    }

    fn prev(self) -> Self {
        match self {
            Focus::Port => Focus::Input(1),
            Focus::Baud => Focus::Port,
            Focus::Input(0) => Focus::Baud,
            Focus::Input(_) => Focus::Input(0),
        }
    }
}

/// Work for the event loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    RefreshPorts,
    ToggleConnection,
    Send,
    Quit,
}

// ============================================================================
// Scrollback
// ============================================================================

/// Append-only log view. Text is split into display lines as it arrives; a
/// chunk without a trailing line break leaves the last line open for the
/// next chunk.
#[derive(Debug, Default)]
pub struct Transcript {
    lines: Vec<String>,
    open: bool,
    /// Lines scrolled up from the bottom; 0 follows new output.
    offset: usize,
}

impl Transcript {
    pub fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let before = self.lines.len();
        let mut pieces = text.split('\n').peekable();
        let mut first = true;
        while let Some(piece) = pieces.next() {
            let last = pieces.peek().is_none();
            let clean = printable(piece);
            match self.lines.last_mut() {
                Some(line) if first && self.open => line.push_str(&clean),
                _ if last && piece.is_empty() => {}
                _ => self.lines.push(clean),
            }
            if last {
                self.open = !piece.is_empty();
            }
            first = false;
        }
        if self.offset > 0 {
            self.offset += self.lines.len() - before;
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// The `height` lines currently in view.
    pub fn visible(&self, height: usize) -> &[String] {
        let len = self.lines.len();
        let offset = self.offset.min(len.saturating_sub(height));
        let end = len - offset;
        &self.lines[end.saturating_sub(height)..end]
    }

    pub fn scroll_up(&mut self, n: usize) {
        self.offset = (self.offset + n).min(self.lines.len().saturating_sub(1));
    }

    pub fn scroll_down(&mut self, n: usize) {
        self.offset = self.offset.saturating_sub(n);
    }

    pub fn follow(&mut self) {
        self.offset = 0;
    }

    pub fn is_following(&self) -> bool {
        self.offset == 0
    }
}

fn printable(piece: &str) -> String {
    piece
        .chars()
        .filter_map(|c| match c {
            '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

// ============================================================================
// App
// ============================================================================

pub struct App {
    pub ports: PortSelection,
    baud_rates: Vec<u32>,
    baud_index: usize,
    inputs: [String; 2],
    /// Which input `Enter` sends.
    choice: usize,
    pub focus: Focus,
    pub transcript: Transcript,
    status: Option<String>,
    connection: Option<(String, u32)>,
    pub should_quit: bool,
}

impl App {
    pub fn new(ports: PortSelection, baud_rates: Vec<u32>, baud_index: usize) -> Self {
        Self {
            ports,
            baud_rates,
            baud_index,
            inputs: [String::new(), String::new()],
            choice: 0,
            focus: Focus::Input(0),
            transcript: Transcript::default(),
            status: None,
            connection: None,
            should_quit: false,
        }
    }

    pub fn selected_descriptor(&self) -> Option<&str> {
        self.ports
            .selected_port()
            .map(|p| p.display_name.as_str())
    }

    pub fn baud(&self) -> u32 {
        self.baud_rates[self.baud_index]
    }

    pub fn baud_rates(&self) -> &[u32] {
        &self.baud_rates
    }

    pub fn input(&self, index: usize) -> &str {
        &self.inputs[index]
    }

    pub fn choice(&self) -> usize {
        self.choice
    }

    /// Text of the input chosen by the radio control.
    pub fn selected_text(&self) -> &str {
        &self.inputs[self.choice]
    }

    pub fn set_ports(&mut self, ports: PortSelection) {
        self.ports = ports;
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some(message.into());
    }

    pub fn set_connection(&mut self, connection: Option<(String, u32)>) {
        self.connection = connection;
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn status_line(&self) -> String {
        let state = match &self.connection {
            Some((port, baud)) => format!("Connected: {} @ {}", port, baud),
            None => "Disconnected".to_string(),
        };
        match &self.status {
            Some(message) => format!("{} | {}", state, message),
            None => state,
        }
    }

    /// Move everything the receive loop and controller produced into the
    /// scrollback.
    pub fn drain(&mut self, lines: &mpsc::Receiver<LogLine>) -> usize {
        let mut count = 0;
        for line in lines.try_iter() {
            self.transcript.append(&line.render());
            count += 1;
        }
        count
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(Action::Quit);
        }

        match key.code {
            KeyCode::Esc => return Some(Action::Quit),
            KeyCode::F(2) => return Some(Action::ToggleConnection),
            KeyCode::F(3) => {
                self.choice = 1 - self.choice;
                return None;
            }
            KeyCode::F(5) => return Some(Action::RefreshPorts),
            KeyCode::Enter => return Some(Action::Send),
            KeyCode::PageUp => {
                self.transcript.scroll_up(PAGE_LINES);
                return None;
            }
            KeyCode::PageDown => {
                self.transcript.scroll_down(PAGE_LINES);
                return None;
            }
            KeyCode::End => {
                self.transcript.follow();
                return None;
            }
            KeyCode::Tab => return self.move_focus(self.focus.next()),
            KeyCode::BackTab => return self.move_focus(self.focus.prev()),
            _ => {}
        }

        match self.focus {
            Focus::Port => self.select_port(key.code),
            Focus::Baud => self.select_baud(key.code),
            Focus::Input(i) => self.edit_input(i, key.code),
        }
        None
    }

    fn move_focus(&mut self, focus: Focus) -> Option<Action> {
        self.focus = focus;
        // The port list is re-read whenever the selector is entered
        (focus == Focus::Port).then_some(Action::RefreshPorts)
    }

    fn select_port(&mut self, code: KeyCode) {
        let count = self.ports.ports.len();
        if count == 0 {
            return;
        }
        let current = self.ports.selected.unwrap_or(0);
        self.ports.selected = Some(match code {
            KeyCode::Up | KeyCode::Left => current.saturating_sub(1),
            KeyCode::Down | KeyCode::Right => (current + 1).min(count - 1),
            _ => current,
        });
    }

    fn select_baud(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up | KeyCode::Left => self.baud_index = self.baud_index.saturating_sub(1),
            KeyCode::Down | KeyCode::Right => {
                self.baud_index = (self.baud_index + 1).min(self.baud_rates.len() - 1)
            }
            _ => {}
        }
    }

    fn edit_input(&mut self, index: usize, code: KeyCode) {
        let input = &mut self.inputs[index];
        match code {
            KeyCode::Char(c) => input.push(c),
            KeyCode::Backspace => {
                input.pop();
            }
            _ => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
