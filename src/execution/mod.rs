//! Execution engine: result types and output normalization.

use std::sync::Arc;

use tracing::debug;

use crate::process::{OutputEvent, OutputKind};

pub mod artifact;
pub mod session;

pub use artifact::DecodedImage;
pub use session::{ExecutionRequest, SessionController, SessionState};

#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub text_lines: Vec<String>,
    /// First plot of the run, if any. Never set together with `error`.
    pub image: Option<Arc<DecodedImage>>,
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self { text_lines: Vec::new(), image: None, error: Some(message.into()) }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn output(&self) -> String {
        self.text_lines.join("\n")
    }
}

/// Flatten captured console events into display lines.
///
/// Stdout, messages and warnings are kept in emission order; each line is
/// trimmed and blank lines are dropped. Raw stderr is logged only.
pub fn normalize_text(events: &[OutputEvent]) -> Vec<String> {
    let mut lines = Vec::new();
    for event in events {
        let prefix = match event.kind {
            OutputKind::Stdout | OutputKind::Message => "",
            OutputKind::Warning => "Warning: ",
            OutputKind::Stderr => {
                debug!(stderr = %event.data, "dropping raw stderr from output");
                continue;
            }
        };
        for line in event.data.lines() {
            let line = line.trim();
            if !line.is_empty() {
                lines.push(format!("{prefix}{line}"));
            }
        }
    }
    lines
}
