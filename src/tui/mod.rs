//! TUI module: the R console and the normal distribution chart, using Ratatui.

use std::io;

use anyhow::Result;
use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;

pub mod app;
pub mod chart;
pub mod events;
pub mod handler;
pub mod ui;

pub use chart::run_normal_chart;
pub use handler::run_tui_console;

pub(crate) type Term = Terminal<CrosstermBackend<io::Stdout>>;

pub(crate) fn enter_terminal() -> Result<Term> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableBracketedPaste)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

pub(crate) fn leave_terminal(terminal: &mut Term) -> Result<()> {
    disable_raw_mode()?;
    terminal.backend_mut().execute(DisableBracketedPaste)?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
