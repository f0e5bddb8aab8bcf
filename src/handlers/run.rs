//! One-shot R handler: runs code in a fresh session and prints the result.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::Config;
use crate::execution::session::NOTHING_TO_RUN;
use crate::execution::{SessionController, SessionState};
use crate::printer::{print_result, TextPrinter};
use crate::process::{CaptureOptions, EngineConfig, RProcessEngine};
use crate::utils::plot_file_in;

pub async fn run(code: &str, cfg: &Config, plot_out: Option<&Path>) -> Result<()> {
    if code.trim().is_empty() {
        bail!("{}: provide R code after --r, with --file, or via stdin", NOTHING_TO_RUN);
    }

    let controller = SessionController::new(
        RProcessEngine,
        EngineConfig::from_config(cfg),
        CaptureOptions::from_config(cfg),
    );
    if let SessionState::Failed(msg) = controller.initialize().await {
        bail!("Failed to load R: {}", msg);
    }

    let result = controller.execute(code).await;
    controller.shutdown().await;

    if let Some(err) = result.error {
        bail!("R error: {}", err);
    }
    print_result(&result);

    if let Some(image) = &result.image {
        let path = match plot_out {
            Some(p) => p.to_path_buf(),
            None => plot_file_in(&cfg.plot_output_path()),
        };
        image
            .save(&path)
            .with_context(|| format!("saving plot to {}", path.display()))?;
        TextPrinter { color: Some("green") }.print(&format!(
            "plot saved to {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        ));
    }
    Ok(())
}
