//! Custom event types for the TUI console.

use crossterm::event::KeyEvent;

use super::app::SavedPlot;
use crate::execution::{ExecutionResult, SessionState};

/// Events that can occur in the TUI application
#[derive(Debug)]
pub enum TuiEvent {
    /// User keyboard input
    Key(KeyEvent),
    /// Bracketed paste content
    Paste(String),
    /// Code to hand to the session
    Submit(String),
    /// Session state change
    Session(SessionState),
    /// A submission completed
    Finished {
        result: ExecutionResult,
        plot: Option<SavedPlot>,
    },
}
