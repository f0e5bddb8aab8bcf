//! TUI application state management.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::execution::{ExecutionResult, SessionState};
use crate::printer::console_lines;

/// Input mode for the console
#[derive(Debug, Clone, PartialEq)]
pub enum InputMode {
    /// Normal single-line input mode
    Normal,
    /// Multi-line input mode (activated by """)
    MultiLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Input,
    Output,
    Error,
    Plot,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub kind: EntryKind,
    pub text: String,
}

/// Where a run's plot was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPlot {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Application state for the R console
#[derive(Debug)]
pub struct App {
    /// Console transcript
    pub entries: Vec<Entry>,
    /// Input buffer
    pub input: String,
    /// Current input mode
    pub input_mode: InputMode,
    /// Multi-line input buffer
    pub multiline_buffer: Vec<String>,
    /// Input history (submitted programs)
    pub input_history: Vec<String>,
    /// Current history index when navigating (None = new line)
    pub history_index: Option<usize>,
    /// Last known session state
    pub session: SessionState,
    /// Whether a submission is in flight
    pub running: bool,
    /// Code submitted before the session was ready
    pub pending: Option<String>,
    /// Status message to display
    pub status_message: String,
    pub last_plot: Option<SavedPlot>,
    pub show_help: bool,
    /// Scroll offset from the bottom of the transcript, in lines
    pub scroll_offset: usize,
    pub max_entries: usize,
    /// Timestamp of last Ctrl+C press for double Ctrl+C detection
    pub last_ctrl_c_time: Option<Instant>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        let mut app = Self {
            entries: Vec::new(),
            input: String::new(),
            input_mode: InputMode::Normal,
            multiline_buffer: Vec::new(),
            input_history: Vec::new(),
            history_index: None,
            session: SessionState::Uninitialized,
            running: false,
            pending: None,
            status_message: String::new(),
            last_plot: None,
            show_help: false,
            scroll_offset: 0,
            max_entries: 2000,
            last_ctrl_c_time: None,
        };
        app.update_status_message();
        app
    }

    /// The submit action is only enabled on a Ready, idle session.
    pub fn can_submit(&self) -> bool {
        self.session.is_ready() && !self.running
    }

    pub fn set_session(&mut self, state: SessionState) {
        match &state {
            SessionState::Ready if !self.session.is_ready() => {
                self.push(EntryKind::Info, "R is ready. Type code and press Enter.".into());
            }
            SessionState::Failed(msg) => {
                self.push(EntryKind::Error, format!("Failed to load R: {msg}"));
            }
            _ => {}
        }
        self.session = state;
        self.update_status_message();
    }

    /// Record a submission; returns `false` when the submit action is disabled.
    pub fn start_run(&mut self, code: &str) -> bool {
        if !self.can_submit() {
            return false;
        }
        for (i, line) in code.lines().enumerate() {
            let prompt = if i == 0 { "> " } else { "+ " };
            self.push(EntryKind::Input, format!("{prompt}{line}"));
        }
        self.push_history(code.to_string());
        self.running = true;
        self.update_status_message();
        true
    }

    pub fn finish_run(&mut self, result: &ExecutionResult, plot: Option<SavedPlot>) {
        let kind = if result.success() { EntryKind::Output } else { EntryKind::Error };
        for line in console_lines(result) {
            self.push(kind, line);
        }
        if let Some(plot) = &plot {
            self.push(
                EntryKind::Plot,
                format!("[plot {}x{} saved to {}]", plot.width, plot.height, plot.path.display()),
            );
        }
        // A failed run must not leave the previous plot on display.
        self.last_plot = plot;
        self.running = false;
        self.update_status_message();
    }

    pub fn push(&mut self, kind: EntryKind, text: String) {
        self.entries.push(Entry { kind, text });
        if self.entries.len() > self.max_entries {
            self.entries.drain(0..self.entries.len() - self.max_entries);
        }
        self.scroll_to_bottom();
    }

    pub fn clear_transcript(&mut self) {
        self.entries.clear();
        self.scroll_to_bottom();
    }

    /// Clear input buffers
    pub fn clear_input(&mut self) {
        self.input.clear();
        self.multiline_buffer.clear();
        self.input_mode = InputMode::Normal;
        self.history_index = None;
    }

    /// Get the current input text
    pub fn get_input_text(&self) -> String {
        match self.input_mode {
            InputMode::MultiLine => {
                let mut lines = self.multiline_buffer.clone();
                lines.push(self.input.clone());
                lines.join("\n")
            }
            InputMode::Normal => self.input.clone(),
        }
    }

    pub fn insert_char(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn backspace(&mut self) {
        if self.input.pop().is_none() && self.input_mode == InputMode::MultiLine {
            // At the beginning of the current line, step back into the previous one
            if let Some(previous) = self.multiline_buffer.pop() {
                self.input = previous;
            }
            if self.multiline_buffer.is_empty() {
                self.input_mode = InputMode::Normal;
            }
        }
    }

    /// Pasted text keeps its line structure in multi-line mode.
    pub fn paste(&mut self, text: &str) {
        let mut parts = text.split('\n').map(|s| s.trim_end_matches('\r'));
        if let Some(first) = parts.next() {
            self.input.push_str(first);
        }
        for part in parts {
            self.multiline_buffer.push(std::mem::take(&mut self.input));
            self.input.push_str(part);
            self.input_mode = InputMode::MultiLine;
        }
    }

    pub fn push_history(&mut self, line: String) {
        if !line.trim().is_empty() && self.input_history.last() != Some(&line) {
            self.input_history.push(line);
        }
        self.history_index = None;
    }

    pub fn history_prev(&mut self) {
        if self.input_history.is_empty() {
            return;
        }
        let i = match self.history_index {
            None => self.input_history.len() - 1,
            Some(i) => i.saturating_sub(1),
        };
        self.history_index = Some(i);
        self.load_history_entry(i);
    }

    pub fn history_next(&mut self) {
        match self.history_index {
            Some(i) if i + 1 < self.input_history.len() => {
                self.history_index = Some(i + 1);
                self.load_history_entry(i + 1);
            }
            Some(_) => {
                self.clear_input();
            }
            None => {}
        }
    }

    fn load_history_entry(&mut self, i: usize) {
        let entry = self.input_history[i].clone();
        let index = self.history_index;
        self.clear_input();
        self.paste(&entry);
        self.history_index = index;
    }

    /// Toggle help display
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset += lines;
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    /// Handle Ctrl+C press and detect double press for quit
    /// Returns true if should quit (double Ctrl+C), false otherwise
    pub fn handle_ctrl_c(&mut self) -> bool {
        const DOUBLE_CTRL_C_TIMEOUT: Duration = Duration::from_millis(500);

        let now = Instant::now();
        if let Some(last_time) = self.last_ctrl_c_time {
            if now.duration_since(last_time) <= DOUBLE_CTRL_C_TIMEOUT {
                self.last_ctrl_c_time = None;
                return true;
            }
        }

        // Single Ctrl+C - clear input and record timestamp
        self.clear_input();
        self.last_ctrl_c_time = Some(now);
        false
    }

    pub fn update_status_message(&mut self) {
        self.status_message = match (&self.session, self.running) {
            (SessionState::Uninitialized | SessionState::Initializing, _) => {
                if self.pending.is_some() {
                    "Loading R… (your code will run once it is ready)".to_string()
                } else {
                    "Loading R…".to_string()
                }
            }
            (SessionState::Failed(_), _) => "R unavailable | Ctrl+C twice to quit".to_string(),
            (SessionState::Ready, true) => "Running… | F1 help".to_string(),
            (SessionState::Ready, false) => "R ready: Enter=run, \"\"\"=multi-line | F1 help".to_string(),
        };
    }
}
