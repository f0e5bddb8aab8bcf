//! Typed errors at the runtime engine boundary.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bring-up was rejected (binary missing, bad asset path, early exit).
    #[error("failed to start runtime: {0}")]
    Init(String),

    #[error("runtime did not become ready within {0:?}")]
    InitTimeout(Duration),

    /// The submitted program faulted. The message is the engine's own.
    #[error("{0}")]
    Execution(String),

    /// The engine went away mid-run; the handle is no longer usable.
    #[error("runtime terminated: {0}")]
    Terminated(String),

    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// True when the handle that produced this error can no longer accept work.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Terminated(_))
    }
}

/// Failure to turn a captured artifact into a displayable raster.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("artifact is empty")]
    Empty,

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("decoder task failed: {0}")]
    Task(String),
}
