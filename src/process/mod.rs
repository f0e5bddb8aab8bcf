//! Interpreter process management: the engine boundary and capture types.

use std::{future::Future, path::PathBuf, time::Duration};

use crate::config::Config;
use crate::error::EngineError;

pub mod protocol;
pub mod r;

pub use r::{RProcessEngine, RProcessHandle};

/// Start-up options for an engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding the runtime executable and its supporting assets.
    /// `None` resolves the executable from `PATH`.
    pub base_path: Option<PathBuf>,
    pub binary: String,
    pub init_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_path: None,
            binary: "R".into(),
            init_timeout: Duration::from_secs(60),
        }
    }
}

impl EngineConfig {
    pub fn from_config(cfg: &Config) -> Self {
        let defaults = Self::default();
        Self {
            base_path: cfg.get_path("R_ASSET_PATH"),
            binary: cfg
                .get("R_BINARY")
                .filter(|b| !b.trim().is_empty())
                .unwrap_or(defaults.binary),
            init_timeout: cfg.get_secs("R_INIT_TIMEOUT").unwrap_or(defaults.init_timeout),
        }
    }

    /// Full path (or bare name) of the executable to spawn.
    pub fn executable(&self) -> PathBuf {
        match &self.base_path {
            Some(base) => base.join(&self.binary),
            None => PathBuf::from(&self.binary),
        }
    }
}

/// Per-run capture options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    pub width: u32,
    pub height: u32,
    /// Print the value of each visible top-level expression, as a console would.
    pub autoprint: bool,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self { width: 640, height: 480, autoprint: true }
    }
}

impl CaptureOptions {
    pub fn from_config(cfg: &Config) -> Self {
        let defaults = Self::default();
        Self {
            width: cfg.get_u32("PLOT_WIDTH").filter(|w| *w > 0).unwrap_or(defaults.width),
            height: cfg.get_u32("PLOT_HEIGHT").filter(|h| *h > 0).unwrap_or(defaults.height),
            autoprint: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Stdout,
    Stderr,
    Message,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    pub kind: OutputKind,
    pub data: String,
}

impl OutputEvent {
    pub fn new(kind: OutputKind, data: impl Into<String>) -> Self {
        Self { kind, data: data.into() }
    }

    pub fn stdout(data: impl Into<String>) -> Self {
        Self::new(OutputKind::Stdout, data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Png,
}

/// One graphical output, still encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub format: ArtifactFormat,
    pub bytes: Vec<u8>,
}

/// Everything one run produced, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture {
    pub events: Vec<OutputEvent>,
    pub images: Vec<ImageArtifact>,
}

/// An embeddable interpreter that can be brought up asynchronously.
pub trait Engine: Send + Sync + 'static {
    type Handle: EngineHandle;

    fn start(
        &self,
        config: &EngineConfig,
    ) -> impl Future<Output = Result<Self::Handle, EngineError>> + Send;
}

/// A live engine instance. Not reentrant: callers must not overlap `run`s.
pub trait EngineHandle: Send + 'static {
    fn run(
        &mut self,
        program: &str,
        options: &CaptureOptions,
    ) -> impl Future<Output = Result<Capture, EngineError>> + Send;

    fn shutdown(self) -> impl Future<Output = ()> + Send;
}
