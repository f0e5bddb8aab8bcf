//! Async event handler for the TUI R console.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{
    app::{App, EntryKind, InputMode, SavedPlot},
    enter_terminal,
    events::TuiEvent,
    leave_terminal,
    ui::render_ui,
    Term,
};
use crate::{
    config::Config,
    execution::{DecodedImage, SessionController, SessionState},
    process::{CaptureOptions, EngineConfig, RProcessEngine},
    utils::plot_file_in,
};

type Controller = SessionController<RProcessEngine>;

const SHUTDOWN_WAIT: Duration = Duration::from_secs(5);

/// Run the TUI-based R console
pub async fn run_tui_console(cfg: &Config, init_code: Option<&str>) -> Result<()> {
    let mut terminal = enter_terminal()?;

    let controller = Arc::new(SessionController::new(
        RProcessEngine,
        EngineConfig::from_config(cfg),
        CaptureOptions::from_config(cfg),
    ));
    let mut app = App::new();
    app.pending = init_code.filter(|c| !c.trim().is_empty()).map(str::to_string);
    app.update_status_message();

    let (event_tx, event_rx) = mpsc::unbounded_channel::<TuiEvent>();

    // Bring R up in the background; the console stays responsive meanwhile.
    let init = controller.clone();
    tokio::spawn(async move {
        init.initialize().await;
    });

    // Forward session state changes into the event loop
    let mut state_rx = controller.subscribe();
    let state_tx = event_tx.clone();
    tokio::spawn(async move {
        loop {
            let state = state_rx.borrow_and_update().clone();
            if state_tx.send(TuiEvent::Session(state)).is_err() {
                break;
            }
            if state_rx.changed().await.is_err() {
                break;
            }
        }
    });

    let stop = Arc::new(AtomicBool::new(false));
    let plot_dir = cfg.plot_output_path();
    let result = run_app(&mut terminal, &mut app, &controller, plot_dir, event_tx, event_rx, stop.clone()).await;

    stop.store(true, Ordering::Relaxed);
    leave_terminal(&mut terminal)?;
    if tokio::time::timeout(SHUTDOWN_WAIT, controller.shutdown()).await.is_err() {
        // Dropping the controller kills the child process.
        warn!("R did not shut down in time; abandoning it");
    }

    result
}

/// Main application loop
async fn run_app(
    terminal: &mut Term,
    app: &mut App,
    controller: &Arc<Controller>,
    plot_dir: PathBuf,
    event_tx: mpsc::UnboundedSender<TuiEvent>,
    mut event_rx: mpsc::UnboundedReceiver<TuiEvent>,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    // Spawn input handler
    let input_tx = event_tx.clone();
    tokio::task::spawn_blocking(move || {
        while !stop.load(Ordering::Relaxed) {
            if !event::poll(Duration::from_millis(100)).unwrap_or(false) {
                continue;
            }
            let forwarded = match event::read() {
                Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => input_tx.send(TuiEvent::Key(key)),
                Ok(Event::Paste(text)) => input_tx.send(TuiEvent::Paste(text)),
                _ => Ok(()),
            };
            if forwarded.is_err() {
                break; // Channel closed
            }
        }
    });

    loop {
        terminal.draw(|frame| render_ui(frame, app))?;

        let Some(tui_event) = event_rx.recv().await else {
            break;
        };
        match tui_event {
            TuiEvent::Key(key) => {
                if handle_key_event(app, key, &event_tx) {
                    break; // Quit requested
                }
            }
            TuiEvent::Paste(text) => app.paste(&text),
            TuiEvent::Submit(code) => {
                if !app.start_run(&code) {
                    let reason = if app.running {
                        "A run is still in progress; wait for it to finish."
                    } else if matches!(app.session, SessionState::Failed(_)) {
                        "R is unavailable in this session."
                    } else {
                        "R is still loading…"
                    };
                    app.push(EntryKind::Info, reason.to_string());
                    continue;
                }
                let controller = controller.clone();
                let tx = event_tx.clone();
                let dir = plot_dir.clone();
                tokio::spawn(async move {
                    let result = controller.execute(&code).await;
                    let plot = match result.image.clone() {
                        Some(image) => tokio::task::spawn_blocking(move || save_plot(&image, &dir))
                            .await
                            .ok()
                            .flatten(),
                        None => None,
                    };
                    let _ = tx.send(TuiEvent::Finished { result, plot });
                });
            }
            TuiEvent::Session(state) => {
                app.set_session(state);
                if app.can_submit() {
                    if let Some(code) = app.pending.take() {
                        let _ = event_tx.send(TuiEvent::Submit(code));
                    }
                }
            }
            TuiEvent::Finished { result, plot } => {
                app.finish_run(&result, plot);
            }
        }
    }

    Ok(())
}

fn save_plot(image: &DecodedImage, dir: &std::path::Path) -> Option<SavedPlot> {
    let path = plot_file_in(dir);
    match image.save(&path) {
        Ok(()) => {
            debug!(path = %path.display(), "plot saved");
            Some(SavedPlot { path, width: image.width(), height: image.height() })
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not save plot");
            None
        }
    }
}

/// Handle keyboard events; returns true when the console should quit.
fn handle_key_event(app: &mut App, key: KeyEvent, event_tx: &mpsc::UnboundedSender<TuiEvent>) -> bool {
    if app.show_help {
        app.toggle_help();
        return false;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return app.handle_ctrl_c(),
        KeyCode::Char('d') if ctrl => return true,
        KeyCode::Char('l') if ctrl => app.clear_transcript(),
        KeyCode::F(1) => app.toggle_help(),
        KeyCode::Up => app.history_prev(),
        KeyCode::Down => app.history_next(),
        KeyCode::PageUp => app.scroll_up(10),
        KeyCode::PageDown => app.scroll_down(10),
        KeyCode::Enter => {
            let input = app.get_input_text();
            let trimmed = input.trim();

            if matches!(trimmed, "q()" | "quit()" | "exit()") {
                return true;
            }

            if trimmed == "\"\"\"" || (app.input_mode == InputMode::MultiLine && app.input.trim() == "\"\"\"") {
                match app.input_mode {
                    InputMode::Normal => {
                        app.clear_input();
                        app.input_mode = InputMode::MultiLine;
                    }
                    InputMode::MultiLine => {
                        let program = app.multiline_buffer.join("\n");
                        app.clear_input();
                        if !program.trim().is_empty() {
                            let _ = event_tx.send(TuiEvent::Submit(program));
                        }
                    }
                }
            } else if app.input_mode == InputMode::MultiLine {
                let line = std::mem::take(&mut app.input);
                app.multiline_buffer.push(line);
            } else {
                if !trimmed.is_empty() {
                    let _ = event_tx.send(TuiEvent::Submit(input));
                }
                app.clear_input();
            }
        }
        KeyCode::Backspace => app.backspace(),
        KeyCode::Tab => {
            app.insert_char(' ');
            app.insert_char(' ');
        }
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        _ => {}
    }

    false
}
