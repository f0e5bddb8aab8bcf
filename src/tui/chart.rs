//! Interactive normal distribution chart.

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use super::{enter_terminal, leave_terminal};
use crate::stats::{Normal, DOMAIN, MEAN_RANGE, SD_RANGE};

/// Density axis is fixed so a narrower curve visibly grows taller.
const Y_BOUNDS: [f64; 2] = [0.0, 1.0];

/// Run the chart until the user quits.
pub fn run_normal_chart(normal: Normal) -> Result<()> {
    let mut terminal = enter_terminal()?;
    let result = chart_loop(&mut terminal, normal);
    leave_terminal(&mut terminal)?;
    result
}

fn chart_loop(terminal: &mut super::Term, mut normal: Normal) -> Result<()> {
    loop {
        terminal.draw(|frame| render_chart(frame, &normal))?;

        if !event::poll(Duration::from_millis(250))? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind == KeyEventKind::Release {
            continue;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
            KeyCode::Left => normal = normal.shift_mean(-1),
            KeyCode::Right => normal = normal.shift_mean(1),
            KeyCode::Down => normal = normal.shift_sd(-1),
            KeyCode::Up => normal = normal.shift_sd(1),
            _ => {}
        }
    }
}

fn render_chart(frame: &mut Frame, normal: &Normal) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(8), Constraint::Length(3)])
        .split(frame.area());

    let points = normal.curve();
    let datasets = vec![Dataset::default()
        .name(format!("N({:.1}, {:.1})", normal.mean(), normal.sd()))
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Cyan))
        .data(&points)];

    let (lo, hi) = DOMAIN;
    let x_axis = Axis::default()
        .title("x")
        .style(Style::default().fg(Color::Gray))
        .bounds([lo, hi])
        .labels(vec![
            Span::raw(format!("{lo:.0}")),
            Span::raw("0"),
            Span::raw(format!("{hi:.0}")),
        ]);
    let y_axis = Axis::default()
        .title("density")
        .style(Style::default().fg(Color::Gray))
        .bounds(Y_BOUNDS)
        .labels(vec![Span::raw("0"), Span::raw("0.5"), Span::raw("1")]);

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Normal distribution")
                .title_style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .x_axis(x_axis)
        .y_axis(y_axis);
    frame.render_widget(chart, layout[0]);

    let controls = Line::from(vec![
        Span::styled(format!(" mean = {:.1} ", normal.mean()), Style::default().fg(Color::Green)),
        Span::raw(format!("[{:.0}, {:.0}] ←/→   ", MEAN_RANGE.0, MEAN_RANGE.1)),
        Span::styled(format!(" sd = {:.1} ", normal.sd()), Style::default().fg(Color::Yellow)),
        Span::raw(format!("[{:.1}, {:.1}] ↓/↑   ", SD_RANGE.0, SD_RANGE.1)),
        Span::raw("q to quit"),
    ]);
    frame.render_widget(
        Paragraph::new(controls).block(Block::default().borders(Borders::ALL)),
        layout[1],
    );
}
