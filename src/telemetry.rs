//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::Config;

pub enum LogTarget {
    Stderr,
    /// Used by the full-screen modes, where stderr would tear the display.
    File(PathBuf),
}

impl LogTarget {
    pub fn default_file() -> Self {
        Self::File(std::env::temp_dir().join("statlab").join("statlab.log"))
    }
}

/// `RUST_LOG` wins; otherwise `LOG_LEVEL` from the config.
pub fn init_tracing(cfg: &Config, target: LogTarget) -> Result<()> {
    let fallback = cfg.get("LOG_LEVEL").unwrap_or_else(|| "warn".into());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (stderr_layer, file_layer) = match target {
        LogTarget::Stderr => (
            Some(fmt::layer().with_target(true).with_writer(std::io::stderr)),
            None,
        ),
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            (
                None,
                Some(fmt::layer().with_target(true).with_ansi(false).with_writer(Mutex::new(file))),
            )
        }
    };

    Registry::default()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}
