//! R console handler with TUI interface using Ratatui.

use anyhow::Result;
use is_terminal::IsTerminal;

use crate::config::Config;
use crate::tui::run_tui_console;

pub async fn run(cfg: &Config, init_code: Option<&str>) -> Result<()> {
    if !std::io::stdout().is_terminal() {
        eprintln!("Warning: TUI mode not available in this environment. The R console requires a proper terminal.");
        eprintln!("Use --r to run code non-interactively.");
        return Err(anyhow::anyhow!("TUI mode requires a proper terminal environment"));
    }

    run_tui_console(cfg, init_code).await
}
