//! UI layout and rendering logic for the R console.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthChar;

use super::app::{App, EntryKind, InputMode};
use crate::execution::SessionState;

/// Render the main UI
pub fn render_ui(frame: &mut Frame, app: &App) {
    let input_height = match app.input_mode {
        InputMode::Normal => 3,
        InputMode::MultiLine => (app.multiline_buffer.len() as u16 + 3).min(12),
    };
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),               // Transcript
            Constraint::Length(input_height), // Input area
            Constraint::Length(1),            // Status bar
        ])
        .split(frame.area());

    render_transcript(frame, app, main_layout[0]);
    render_input_area(frame, app, main_layout[1]);
    render_status_bar(frame, app, main_layout[2]);

    if app.show_help {
        render_help_overlay(frame);
    }
}

fn entry_style(kind: EntryKind) -> Style {
    match kind {
        EntryKind::Input => Style::default().fg(Color::Green),
        EntryKind::Output => Style::default(),
        EntryKind::Error => Style::default().fg(Color::Red),
        EntryKind::Plot => Style::default().fg(Color::Magenta),
        EntryKind::Info => Style::default().fg(Color::Yellow),
    }
}

/// Render the console transcript
fn render_transcript(frame: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = app
        .entries
        .iter()
        .map(|entry| Line::from(Span::styled(entry.text.clone(), entry_style(entry.kind))))
        .collect();

    let available_height = area.height.saturating_sub(2) as usize; // Account for borders
    let total_lines = lines.len();

    let mut paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title("R Console"))
        .wrap(Wrap { trim: false });

    if total_lines > available_height {
        let max_scroll = total_lines - available_height;
        let offset = app.scroll_offset.min(max_scroll);
        paragraph = paragraph.scroll(((max_scroll - offset) as u16, 0));
    }

    frame.render_widget(paragraph, area);
}

/// Render the input area
fn render_input_area(frame: &mut Frame, app: &App, area: Rect) {
    let input_text = match app.input_mode {
        InputMode::Normal => app.input.clone(),
        InputMode::MultiLine if app.multiline_buffer.is_empty() => app.input.clone(),
        InputMode::MultiLine => format!("{}\n{}", app.multiline_buffer.join("\n"), app.input),
    };

    let title = match app.input_mode {
        InputMode::Normal => "Code (type \"\"\" for multi-line)",
        InputMode::MultiLine => "Multi-line code (\"\"\" to run)",
    };
    let border_style = if app.can_submit() {
        Style::default()
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let input_paragraph = Paragraph::new(input_text)
        .block(Block::default().borders(Borders::ALL).title(title).border_style(border_style))
        .wrap(Wrap { trim: false });

    frame.render_widget(input_paragraph, area);
}

/// Render the status bar
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (label, color) = match &app.session {
        SessionState::Uninitialized | SessionState::Initializing => ("LOADING", Color::Yellow),
        SessionState::Ready if app.running => ("BUSY", Color::Blue),
        SessionState::Ready => ("READY", Color::Green),
        SessionState::Failed(_) => ("FAILED", Color::Red),
    };

    let mut text = app.status_message.clone();
    if let Some(plot) = &app.last_plot {
        text.push_str(&format!(" | Plot: {}", plot.path.display()));
    }
    let room = (area.width as usize).saturating_sub(label.len() + 3);

    let status = Line::from(vec![
        Span::styled(format!(" {label} "), Style::default().bg(color).fg(Color::Black).add_modifier(Modifier::BOLD)),
        Span::raw(" "),
        Span::raw(truncate_to_width(&text, room)),
    ]);
    let status_paragraph =
        Paragraph::new(status).style(Style::default().bg(Color::DarkGray).fg(Color::White));

    frame.render_widget(status_paragraph, area);
}

/// Cut `text` to at most `width` terminal columns, marking the cut with an ellipsis.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            if width > 0 {
                while used + 1 > width {
                    match out.pop() {
                        Some(last) => used -= last.width().unwrap_or(0),
                        None => break,
                    }
                }
                out.push('…');
            }
            return out;
        }
        used += w;
        out.push(c);
    }
    out
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame) {
    let popup_area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, popup_area);

    let help_lines = vec![
        Line::from("R Console Help"),
        Line::from(""),
        Line::from("Input:"),
        Line::from("  Enter        - Run code"),
        Line::from("  \"\"\"          - Start/end multi-line code"),
        Line::from("  ↑/↓          - Previous/next submission"),
        Line::from(""),
        Line::from("Navigation:"),
        Line::from("  PgUp/PgDn    - Scroll transcript"),
        Line::from("  Ctrl+L       - Clear transcript"),
        Line::from("  F1           - Toggle this help"),
        Line::from(""),
        Line::from("Quit:"),
        Line::from("  Ctrl+C twice, Ctrl+D, or q()"),
        Line::from(""),
        Line::from("Plots are saved as PNG files; the path appears in the transcript."),
    ];

    let help_paragraph = Paragraph::new(Text::from(help_lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help")
                .title_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        )
        .wrap(Wrap { trim: true });

    frame.render_widget(help_paragraph, popup_area);
}

/// Helper function to create a centered rectangle
pub(crate) fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
