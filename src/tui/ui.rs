// src/tui/ui.rs
//
// Rendering. Reads `App`, never mutates it.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use super::app::{App, Focus};

const HELP: &str =
    "F2 connect  Enter send  F3 input  F5 ports  Tab focus  PgUp/PgDn/End scroll  Esc quit";

pub fn draw(frame: &mut Frame, app: &App) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(rows[0]);

    draw_selectors(frame, app, top[0], top[1]);
    draw_scrollback(frame, app, rows[1]);
    draw_input(frame, app, 0, rows[2]);
    draw_input(frame, app, 1, rows[3]);

    let status_style = if app.is_connected() {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Yellow)
    };
    frame.render_widget(Paragraph::new(app.status_line()).style(status_style), rows[4]);
    frame.render_widget(
        Paragraph::new(HELP).style(Style::default().fg(Color::DarkGray)),
        rows[5],
    );
}

fn block(title: impl Into<String>, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title.into())
}

fn draw_selectors(frame: &mut Frame, app: &App, port_area: Rect, baud_area: Rect) {
    let port_title = match (app.ports.selected, app.ports.ports.len()) {
        (_, 0) => "Port".to_string(),
        (Some(i), n) => format!("Port {}/{}", i + 1, n),
        (None, n) => format!("Port -/{}", n),
    };
    let port = app.selected_descriptor().unwrap_or("<no ports found>");
    frame.render_widget(
        Paragraph::new(format!("< {} >", port)).block(block(port_title, app.focus == Focus::Port)),
        port_area,
    );

    frame.render_widget(
        Paragraph::new(format!("< {} >", app.baud()))
            .block(block("Baud", app.focus == Focus::Baud)),
        baud_area,
    );
}

fn draw_scrollback(frame: &mut Frame, app: &App, area: Rect) {
    let title = if app.transcript.is_following() {
        "Log".to_string()
    } else {
        "Log (scrolled, End to follow)".to_string()
    };
    let block = block(title, false);
    let height = block.inner(area).height as usize;
    let lines: Vec<Line> = app
        .transcript
        .visible(height)
        .iter()
        .map(|l| styled_line(l))
        .collect();
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn styled_line(line: &str) -> Line<'_> {
    let color = if line.starts_with("[RX HEX]") {
        Color::Magenta
    } else if line.starts_with("[RX]") {
        Color::White
    } else if line.starts_with("[TX ERROR]") || line.starts_with("[ERROR]") {
        Color::Red
    } else if line.starts_with("[TX]") {
        Color::Cyan
    } else if line.starts_with("[OK]") {
        Color::Green
    } else {
        Color::Gray
    };
    Line::from(Span::styled(line, Style::default().fg(color)))
}

fn draw_input(frame: &mut Frame, app: &App, index: usize, area: Rect) {
    let focused = app.focus == Focus::Input(index);
    let radio = if app.choice() == index { "(*)" } else { "( )" };
    let mut style = Style::default();
    if app.choice() == index {
        style = style.add_modifier(Modifier::BOLD);
    }
    let input = Paragraph::new(app.input(index))
        .style(style)
        .block(block(format!("{} Message {}", radio, index + 1), focused));
    frame.render_widget(input, area);

    if focused {
        let x = area.x + 1 + app.input(index).chars().count() as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}
