//! Session controller: one runtime, initialized once, one program at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{debug, error, info, warn};

use super::artifact::{decode, DecodedImage};
use super::{normalize_text, ExecutionResult};
use crate::error::DecodeError;
use crate::process::{CaptureOptions, Engine, EngineConfig, EngineHandle};

pub const NOTHING_TO_RUN: &str = "nothing to run";
pub const NOT_READY: &str = "runtime not ready";
pub const BUSY: &str = "runtime busy";
pub const SESSION_CLOSED: &str = "session closed";

/// One running request plus one waiting.
const ADMISSION_SLOTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Failed(String),
}

impl SessionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// A unit of work, consumed by exactly one execution.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub seq: u64,
    pub source_text: String,
    pub submitted_at: Instant,
}

pub struct SessionController<E: Engine> {
    engine: E,
    config: EngineConfig,
    options: CaptureOptions,
    state: watch::Sender<SessionState>,
    handle: Mutex<Option<E::Handle>>,
    admission: Semaphore,
    displayed: StdMutex<Option<Arc<DecodedImage>>>,
    next_seq: AtomicU64,
}

impl<E: Engine> SessionController<E> {
    pub fn new(engine: E, config: EngineConfig, options: CaptureOptions) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            engine,
            config,
            options,
            state,
            handle: Mutex::new(None),
            admission: Semaphore::new(ADMISSION_SLOTS),
            displayed: StdMutex::new(None),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Follow state changes, e.g. to enable a submit control once Ready.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.admission.available_permits() < ADMISSION_SLOTS
    }

    /// Image of the last successful run; cleared whenever a run starts.
    pub fn displayed_image(&self) -> Option<Arc<DecodedImage>> {
        self.displayed.lock().ok().and_then(|slot| slot.clone())
    }

    /// Bring the runtime up. Only the first call from `Uninitialized` does
    /// anything; every other call returns the current state immediately.
    pub async fn initialize(&self) -> SessionState {
        let claimed = self.state.send_if_modified(|state| {
            if *state == SessionState::Uninitialized {
                *state = SessionState::Initializing;
                true
            } else {
                false
            }
        });
        if !claimed {
            debug!(state = ?self.state(), "initialize ignored");
            return self.state();
        }

        info!(exe = %self.config.executable().display(), "starting runtime");
        match self.engine.start(&self.config).await {
            Ok(handle) => {
                let mut slot = self.handle.lock().await;
                let promoted = self.state.send_if_modified(|state| {
                    if *state == SessionState::Initializing {
                        *state = SessionState::Ready;
                        true
                    } else {
                        false
                    }
                });
                if promoted {
                    *slot = Some(handle);
                    info!("runtime ready");
                } else {
                    drop(slot);
                    warn!("session closed during start-up; releasing runtime");
                    handle.shutdown().await;
                }
            }
            Err(e) => {
                error!(error = %e, "runtime failed to start");
                // A concurrent shutdown keeps its own reason.
                self.state.send_if_modified(|state| {
                    if *state == SessionState::Initializing {
                        *state = SessionState::Failed(e.to_string());
                        true
                    } else {
                        false
                    }
                });
            }
        }
        self.state()
    }

    pub async fn execute(&self, source_text: &str) -> ExecutionResult {
        if source_text.trim().is_empty() {
            return ExecutionResult::failure(NOTHING_TO_RUN);
        }
        if !self.state.borrow().is_ready() {
            return ExecutionResult::failure(NOT_READY);
        }
        let Ok(_permit) = self.admission.try_acquire() else {
            debug!("rejecting request: one running and one waiting already");
            return ExecutionResult::failure(BUSY);
        };

        let request = ExecutionRequest {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            source_text: source_text.to_string(),
            submitted_at: Instant::now(),
        };

        let closed = self.state.subscribe();
        let mut slot = self.handle.lock().await;
        let Some(engine) = slot.as_mut() else {
            return ExecutionResult::failure(NOT_READY);
        };

        self.set_displayed(None);
        debug!(seq = request.seq, "running request");
        let outcome = tokio::select! {
            biased;
            _ = session_left_ready(closed) => None,
            outcome = engine.run(&request.source_text, &self.options) => Some(outcome),
        };
        let Some(outcome) = outcome else {
            warn!(seq = request.seq, "session closed mid-run; stopping runtime");
            let handle = slot.take();
            drop(slot);
            if let Some(handle) = handle {
                handle.shutdown().await;
            }
            return ExecutionResult::failure(SESSION_CLOSED);
        };
        let capture = match outcome {
            Ok(capture) => capture,
            Err(e) if e.is_fatal() => {
                error!(seq = request.seq, error = %e, "runtime lost");
                let handle = slot.take();
                drop(slot);
                self.state.send_if_modified(|state| {
                    if state.is_ready() {
                        *state = SessionState::Failed(e.to_string());
                        true
                    } else {
                        false
                    }
                });
                if let Some(handle) = handle {
                    handle.shutdown().await;
                }
                return ExecutionResult::failure(e.to_string());
            }
            Err(e) => {
                debug!(seq = request.seq, error = %e, "request faulted");
                return ExecutionResult::failure(e.to_string());
            }
        };

        let mut result = ExecutionResult {
            text_lines: normalize_text(&capture.events),
            image: None,
            error: None,
        };

        let produced = capture.images.len();
        if produced > 1 {
            debug!(seq = request.seq, produced, "surfacing only the first plot");
        }
        if let Some(artifact) = capture.images.into_iter().next() {
            let decoded = tokio::task::spawn_blocking(move || decode(&artifact))
                .await
                .unwrap_or_else(|e| Err(DecodeError::Task(e.to_string())));
            match decoded {
                Ok(image) => {
                    let image = Arc::new(image);
                    self.set_displayed(Some(image.clone()));
                    result.image = Some(image);
                }
                Err(e) => {
                    warn!(seq = request.seq, error = %e, "plot decode failed");
                    result.text_lines.push(format!("[plot could not be decoded: {e}]"));
                }
            }
        }

        debug!(
            seq = request.seq,
            elapsed_ms = request.submitted_at.elapsed().as_millis() as u64,
            lines = result.text_lines.len(),
            image = result.image.is_some(),
            "request finished"
        );
        result
    }

    /// Release the runtime. An in-flight run is abandoned and its runtime
    /// stopped; later requests are rejected as not ready.
    pub async fn shutdown(&self) {
        self.state.send_replace(SessionState::Failed(SESSION_CLOSED.into()));
        let handle = self.handle.lock().await.take();
        self.set_displayed(None);
        if let Some(handle) = handle {
            info!("shutting runtime down");
            handle.shutdown().await;
        }
    }

    fn set_displayed(&self, image: Option<Arc<DecodedImage>>) {
        if let Ok(mut slot) = self.displayed.lock() {
            *slot = image;
        }
    }
}

/// Resolves once the session is no longer Ready.
async fn session_left_ready(mut rx: watch::Receiver<SessionState>) {
    loop {
        if !rx.borrow_and_update().is_ready() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone with the controller; nothing left to observe.
            std::future::pending::<()>().await;
        }
    }
}
