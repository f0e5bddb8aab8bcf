use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use image::{DynamicImage, ImageFormat, RgbaImage};
use tokio::sync::Semaphore;

use statlab::error::EngineError;
use statlab::execution::session::{BUSY, NOTHING_TO_RUN, NOT_READY, SESSION_CLOSED};
use statlab::execution::{SessionController, SessionState};
use statlab::process::{
    ArtifactFormat, Capture, CaptureOptions, Engine, EngineConfig, EngineHandle, ImageArtifact,
    OutputEvent, OutputKind, RProcessEngine,
};

/// Scripted stand-in for the R process.
struct Shared {
    starts: AtomicUsize,
    shutdowns: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    entered: Mutex<Vec<String>>,
    gate: Semaphore,
    start_gate: Option<Semaphore>,
    fail_start: bool,
}

impl Default for Shared {
    fn default() -> Self {
        Self {
            starts: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            entered: Mutex::new(Vec::new()),
            // Programs starting with "slow" wait here until released.
            gate: Semaphore::new(0),
            start_gate: None,
            fail_start: false,
        }
    }
}

#[derive(Clone, Default)]
struct FakeEngine(Arc<Shared>);

impl FakeEngine {
    fn failing() -> Self {
        Self(Arc::new(Shared { fail_start: true, ..Default::default() }))
    }

    /// `start` blocks until `release_start` is called.
    fn gated_start() -> Self {
        Self(Arc::new(Shared { start_gate: Some(Semaphore::new(0)), ..Default::default() }))
    }

    fn release_start(&self) {
        if let Some(gate) = &self.0.start_gate {
            gate.add_permits(1);
        }
    }

    fn shutdowns(&self) -> usize {
        self.0.shutdowns.load(Ordering::SeqCst)
    }

    fn starts(&self) -> usize {
        self.0.starts.load(Ordering::SeqCst)
    }

    fn active(&self) -> usize {
        self.0.active.load(Ordering::SeqCst)
    }

    fn release(&self, n: usize) {
        self.0.gate.add_permits(n);
    }

    fn entered(&self) -> Vec<String> {
        self.0.entered.lock().unwrap().clone()
    }
}

struct FakeHandle(Arc<Shared>);

impl Engine for FakeEngine {
    type Handle = FakeHandle;

    async fn start(&self, _config: &EngineConfig) -> Result<FakeHandle, EngineError> {
        self.0.starts.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if let Some(gate) = &self.0.start_gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.0.fail_start {
            return Err(EngineError::Init("no R here".into()));
        }
        Ok(FakeHandle(self.0.clone()))
    }
}

impl EngineHandle for FakeHandle {
    async fn run(&mut self, program: &str, options: &CaptureOptions) -> Result<Capture, EngineError> {
        let now = self.0.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.0.max_active.fetch_max(now, Ordering::SeqCst);
        self.0.entered.lock().unwrap().push(program.to_string());

        if program.starts_with("slow") {
            if let Ok(permit) = self.0.gate.acquire().await {
                permit.forget();
            }
        }
        let outcome = script(program, options);
        self.0.active.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn shutdown(self) {
        self.0.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

fn png(width: u32, height: u32) -> ImageArtifact {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(RgbaImage::new(width, height))
        .write_to(&mut bytes, ImageFormat::Png)
        .unwrap();
    ImageArtifact { format: ArtifactFormat::Png, bytes: bytes.into_inner() }
}

fn script(program: &str, options: &CaptureOptions) -> Result<Capture, EngineError> {
    let mut capture = Capture::default();
    match program.trim() {
        "1 + 1" | "mean(c(1,2,3))" => capture.events.push(OutputEvent::stdout("[1] 2\n")),
        "this is not valid code (" => {
            return Err(EngineError::Execution("<text>:2:0: unexpected end of input".into()))
        }
        "stop('boom')" => return Err(EngineError::Execution("boom".into())),
        "quit()" => return Err(EngineError::Terminated("process exited".into())),
        "hist(x)" | "plot(1:10)" => capture.images.push(png(options.width.min(4), options.height.min(3))),
        "two plots" => {
            capture.images.push(png(4, 3));
            capture.images.push(png(8, 8));
        }
        "broken plot" => {
            capture.events.push(OutputEvent::stdout("drawn"));
            capture.images.push(ImageArtifact { format: ArtifactFormat::Png, bytes: b"not a png".to_vec() });
        }
        "chatty" => {
            capture.events.push(OutputEvent::stdout("  first\n\n second  \n"));
            capture.events.push(OutputEvent::new(OutputKind::Warning, "NAs introduced"));
            capture.events.push(OutputEvent::new(OutputKind::Stderr, "raw noise"));
            capture.events.push(OutputEvent::new(OutputKind::Message, "note"));
        }
        other => capture.events.push(OutputEvent::stdout(format!("ran {other}"))),
    }
    Ok(capture)
}

fn controller(engine: FakeEngine) -> SessionController<FakeEngine> {
    SessionController::new(engine, EngineConfig::default(), CaptureOptions::default())
}

async fn ready(engine: FakeEngine) -> SessionController<FakeEngine> {
    let controller = controller(engine);
    assert_eq!(controller.initialize().await, SessionState::Ready);
    controller
}

async fn wait_until<F: Fn() -> bool>(cond: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition never became true");
}

#[tokio::test]
async fn execute_before_initialize_is_not_ready() {
    let engine = FakeEngine::default();
    let controller = controller(engine.clone());

    let result = controller.execute("1 + 1").await;
    assert_eq!(result.error.as_deref(), Some(NOT_READY));
    assert!(result.text_lines.is_empty());
    assert!(result.image.is_none());
    assert_eq!(engine.starts(), 0);
    assert_eq!(controller.state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn concurrent_initialize_starts_engine_once() {
    let engine = FakeEngine::default();
    let controller = controller(engine.clone());

    let states = join_all((0..8).map(|_| controller.initialize())).await;
    assert_eq!(engine.starts(), 1);
    assert!(states.contains(&SessionState::Ready));
    assert!(states
        .iter()
        .all(|s| matches!(s, SessionState::Ready | SessionState::Initializing)));
    assert_eq!(controller.state(), SessionState::Ready);

    // Later calls are no-ops.
    assert_eq!(controller.initialize().await, SessionState::Ready);
    assert_eq!(engine.starts(), 1);
}

#[tokio::test]
async fn execute_while_initializing_is_not_ready() {
    let engine = FakeEngine::gated_start();
    let controller = Arc::new(controller(engine.clone()));

    let init = tokio::spawn({
        let c = controller.clone();
        async move { c.initialize().await }
    });
    wait_until(|| engine.starts() == 1).await;
    assert_eq!(controller.state(), SessionState::Initializing);

    let results = join_all((0..5).map(|_| controller.execute("1 + 1"))).await;
    for result in &results {
        assert_eq!(result.error.as_deref(), Some(NOT_READY));
    }
    assert!(engine.entered().is_empty());

    engine.release_start();
    assert_eq!(init.await.unwrap(), SessionState::Ready);
    assert!(controller.execute("1 + 1").await.success());
}

#[tokio::test]
async fn shutdown_during_start_keeps_closed_reason() {
    let engine = FakeEngine(Arc::new(Shared {
        start_gate: Some(Semaphore::new(0)),
        fail_start: true,
        ..Default::default()
    }));
    let controller = Arc::new(controller(engine.clone()));

    let init = tokio::spawn({
        let c = controller.clone();
        async move { c.initialize().await }
    });
    wait_until(|| engine.starts() == 1).await;

    controller.shutdown().await;
    engine.release_start();
    init.await.unwrap();
    assert_eq!(controller.state(), SessionState::Failed(SESSION_CLOSED.into()));
}

#[tokio::test]
async fn failed_start_is_sticky() {
    let engine = FakeEngine::failing();
    let controller = controller(engine.clone());

    let state = controller.initialize().await;
    assert_eq!(state, SessionState::Failed("failed to start runtime: no R here".into()));

    assert_eq!(controller.initialize().await, state);
    assert_eq!(engine.starts(), 1);

    let result = controller.execute("1 + 1").await;
    assert_eq!(result.error.as_deref(), Some(NOT_READY));
}

#[tokio::test]
async fn subscribers_see_ready() {
    let controller = controller(FakeEngine::default());
    let mut rx = controller.subscribe();
    controller.initialize().await;
    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_ready());
}

#[tokio::test]
async fn empty_input_is_rejected_without_running() {
    let engine = FakeEngine::default();
    let uninitialized = controller(engine.clone());
    assert_eq!(uninitialized.execute("").await.error.as_deref(), Some(NOTHING_TO_RUN));

    let controller = ready(engine.clone()).await;
    for input in ["", "   ", "\n\t \n"] {
        let result = controller.execute(input).await;
        assert_eq!(result.error.as_deref(), Some(NOTHING_TO_RUN));
    }
    assert!(engine.entered().is_empty());
    assert!(controller.state().is_ready());
}

#[tokio::test]
async fn successful_run_returns_console_text() {
    let controller = ready(FakeEngine::default()).await;

    let result = controller.execute("1 + 1").await;
    assert!(result.success());
    assert_eq!(result.text_lines, vec!["[1] 2"]);
    assert!(result.image.is_none());
}

#[tokio::test]
async fn output_is_normalized() {
    let controller = ready(FakeEngine::default()).await;

    let result = controller.execute("chatty").await;
    assert_eq!(
        result.text_lines,
        vec!["first", "second", "Warning: NAs introduced", "note"]
    );
}

#[tokio::test]
async fn console_scenarios() {
    let engine = FakeEngine::default();
    let controller = ready(engine.clone()).await;

    let mean = controller.execute("mean(c(1,2,3))").await;
    assert!(mean.success());
    assert!(mean.image.is_none());
    assert!(mean.text_lines.iter().any(|l| l.contains('2')));

    let plot = controller.execute("plot(1:10)").await;
    assert!(plot.success());
    assert!(plot.image.is_some());

    let invalid = controller.execute("this is not valid code (").await;
    assert_eq!(invalid.error.as_deref(), Some("<text>:2:0: unexpected end of input"));
    assert!(invalid.text_lines.is_empty());
    assert!(invalid.image.is_none());

    assert!(controller.execute("mean(c(1,2,3))").await.success());
    assert_eq!(engine.entered().len(), 4);
}

#[tokio::test]
async fn fault_does_not_end_the_session() {
    let controller = ready(FakeEngine::default()).await;

    let failed = controller.execute("stop('boom')").await;
    assert_eq!(failed.error.as_deref(), Some("boom"));
    assert!(failed.text_lines.is_empty());
    assert!(failed.image.is_none());
    assert!(controller.state().is_ready());

    let next = controller.execute("1 + 1").await;
    assert!(next.success());
    assert_eq!(next.text_lines, vec!["[1] 2"]);
}

#[tokio::test]
async fn plot_is_decoded_and_displayed() {
    let controller = ready(FakeEngine::default()).await;

    let result = controller.execute("hist(x)").await;
    assert!(result.success());
    let image = result.image.clone().expect("plot expected");
    assert_eq!((image.width(), image.height()), (4, 3));
    assert!(!image.encoded().is_empty());

    let shown = controller.displayed_image().expect("plot on display");
    assert_eq!(*shown, *image);
}

#[tokio::test]
async fn stale_plot_is_cleared_by_next_run() {
    let controller = ready(FakeEngine::default()).await;

    controller.execute("hist(x)").await;
    assert!(controller.displayed_image().is_some());

    let failed = controller.execute("stop('boom')").await;
    assert!(failed.image.is_none());
    assert!(controller.displayed_image().is_none());

    controller.execute("hist(x)").await;
    let plain = controller.execute("1 + 1").await;
    assert!(plain.image.is_none());
    assert!(controller.displayed_image().is_none());
}

#[tokio::test]
async fn only_first_plot_is_surfaced() {
    let controller = ready(FakeEngine::default()).await;

    let result = controller.execute("two plots").await;
    let image = result.image.expect("plot expected");
    assert_eq!((image.width(), image.height()), (4, 3));
}

#[tokio::test]
async fn undecodable_plot_adds_diagnostic_line() {
    let controller = ready(FakeEngine::default()).await;

    let result = controller.execute("broken plot").await;
    assert!(result.success());
    assert!(result.image.is_none());
    assert_eq!(result.text_lines.len(), 2);
    assert_eq!(result.text_lines[0], "drawn");
    assert!(result.text_lines[1].starts_with("[plot could not be decoded:"));
    assert!(controller.displayed_image().is_none());
}

#[tokio::test]
async fn runs_never_overlap_and_keep_submission_order() {
    let engine = FakeEngine::default();
    let controller = Arc::new(ready(engine.clone()).await);

    let first = tokio::spawn({
        let c = controller.clone();
        async move { c.execute("slow first").await }
    });
    wait_until(|| engine.active() == 1).await;

    let second = tokio::spawn({
        let c = controller.clone();
        async move { c.execute("second").await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(engine.entered(), vec!["slow first"]);

    engine.release(1);
    let first = first.await.unwrap();
    let second = second.await.unwrap();

    assert_eq!(first.text_lines, vec!["ran slow first"]);
    assert_eq!(second.text_lines, vec!["ran second"]);
    assert_eq!(engine.entered(), vec!["slow first", "second"]);
    assert_eq!(engine.0.max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn third_concurrent_request_is_busy() {
    let engine = FakeEngine::default();
    let controller = Arc::new(ready(engine.clone()).await);

    let running = tokio::spawn({
        let c = controller.clone();
        async move { c.execute("slow running").await }
    });
    wait_until(|| engine.active() == 1).await;
    let waiting = tokio::spawn({
        let c = controller.clone();
        async move { c.execute("waiting").await }
    });
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(controller.is_busy());

    let rejected = controller.execute("third").await;
    assert_eq!(rejected.error.as_deref(), Some(BUSY));

    engine.release(1);
    assert!(running.await.unwrap().success());
    assert!(waiting.await.unwrap().success());
    assert!(!controller.is_busy());
    assert_eq!(engine.entered(), vec!["slow running", "waiting"]);
}

#[tokio::test]
async fn engine_termination_fails_the_session() {
    let controller = ready(FakeEngine::default()).await;

    let result = controller.execute("quit()").await;
    let error = result.error.expect("error expected");
    assert!(error.starts_with("runtime terminated"));
    assert!(matches!(controller.state(), SessionState::Failed(_)));

    let after = controller.execute("1 + 1").await;
    assert_eq!(after.error.as_deref(), Some(NOT_READY));
}

#[tokio::test]
async fn shutdown_releases_engine_and_rejects_work() {
    let engine = FakeEngine::default();
    let controller = ready(engine.clone()).await;
    controller.execute("hist(x)").await;

    controller.shutdown().await;
    assert_eq!(controller.state(), SessionState::Failed(SESSION_CLOSED.into()));
    assert!(controller.displayed_image().is_none());
    assert_eq!(engine.shutdowns(), 1);

    let result = controller.execute("1 + 1").await;
    assert_eq!(result.error.as_deref(), Some(NOT_READY));

    // Idempotent; a closed session is never restarted.
    controller.shutdown().await;
    assert_eq!(controller.initialize().await, SessionState::Failed(SESSION_CLOSED.into()));
    assert_eq!(engine.shutdowns(), 1);
    assert_eq!(engine.starts(), 1);
}

#[tokio::test]
async fn shutdown_abandons_a_run_that_never_finishes() {
    let engine = FakeEngine::default();
    let controller = Arc::new(ready(engine.clone()).await);

    let stuck = tokio::spawn({
        let c = controller.clone();
        async move { c.execute("slow forever").await }
    });
    wait_until(|| engine.active() == 1).await;

    tokio::time::timeout(Duration::from_secs(2), controller.shutdown())
        .await
        .expect("shutdown should not wait for the run");
    let abandoned = stuck.await.unwrap();

    assert_eq!(abandoned.error.as_deref(), Some(SESSION_CLOSED));
    assert_eq!(controller.state(), SessionState::Failed(SESSION_CLOSED.into()));
    assert_eq!(engine.shutdowns(), 1);
    assert_eq!(controller.execute("1 + 1").await.error.as_deref(), Some(NOT_READY));
}

#[tokio::test]
async fn missing_r_binary_fails_initialization() {
    let config = EngineConfig {
        binary: "statlab-no-such-r-binary".into(),
        ..EngineConfig::default()
    };
    let controller = SessionController::new(RProcessEngine, config, CaptureOptions::default());

    let state = controller.initialize().await;
    match state {
        SessionState::Failed(msg) => assert!(msg.starts_with("failed to start runtime")),
        other => panic!("unexpected state {other:?}"),
    }
}

#[tokio::test]
async fn asset_path_must_be_a_directory() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let config = EngineConfig {
        base_path: Some(file.path().to_path_buf()),
        ..EngineConfig::default()
    };
    let err = match RProcessEngine.start(&config).await {
        Err(e) => e,
        Ok(_) => panic!("start should fail"),
    };
    assert!(matches!(err, EngineError::Init(_)));
    assert!(!err.is_fatal());
}
