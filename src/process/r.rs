//! R interpreter process bootstrap and I/O glue.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::protocol::{Frame, Protocol};
use super::{
    ArtifactFormat, Capture, CaptureOptions, Engine, EngineConfig, EngineHandle, ImageArtifact,
    OutputEvent, OutputKind,
};
use crate::error::EngineError;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Spawns one long-lived `R` process per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct RProcessEngine;

impl Engine for RProcessEngine {
    type Handle = RProcessHandle;

    async fn start(&self, config: &EngineConfig) -> Result<Self::Handle, EngineError> {
        RProcessHandle::spawn(config).await
    }
}

pub struct RProcessHandle {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    stderr_rx: mpsc::UnboundedReceiver<String>,
    protocol: Protocol,
    scratch: TempDir,
    runs: u64,
    version: String,
}

impl RProcessHandle {
    async fn spawn(config: &EngineConfig) -> Result<Self, EngineError> {
        if let Some(base) = &config.base_path {
            if !base.is_dir() {
                return Err(EngineError::Init(format!(
                    "asset path {} is not a directory",
                    base.display()
                )));
            }
        }

        let exe = config.executable();
        let mut cmd = Command::new(&exe);
        cmd.arg("--vanilla")
            .arg("--no-echo")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::Init(format!("cannot spawn {}: {}", exe.display(), e)))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EngineError::Init("no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Init("no stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::Init("no stderr".into()))?;

        // Drain stderr continuously so the pipe never fills up and stalls R.
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "statlab::r", stderr = %line);
                if stderr_tx.send(line).is_err() {
                    break;
                }
            }
        });

        let scratch = tempfile::Builder::new()
            .prefix("statlab-r-")
            .tempdir()
            .map_err(|e| EngineError::Init(format!("cannot create scratch dir: {e}")))?;

        let mut handle = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            stderr_rx,
            protocol: Protocol::generate(),
            scratch,
            runs: 0,
            version: String::new(),
        };

        let handshake = handle.protocol.handshake_script();
        handle
            .send(&handshake)
            .await
            .map_err(|e| EngineError::Init(format!("cannot talk to {}: {}", exe.display(), e)))?;

        let version = tokio::time::timeout(config.init_timeout, handle.await_ready())
            .await
            .map_err(|_| EngineError::InitTimeout(config.init_timeout))??;
        info!(%version, exe = %exe.display(), "R runtime ready");
        handle.version = version;
        Ok(handle)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    async fn await_ready(&mut self) -> Result<String, EngineError> {
        loop {
            let Some(line) = self.read_line().await? else {
                let stderr = self.drain_stderr().join("\n");
                return Err(EngineError::Init(if stderr.is_empty() {
                    "R exited during start-up".into()
                } else {
                    format!("R exited during start-up: {stderr}")
                }));
            };
            for frame in self.protocol.parse_line(&line) {
                if let Frame::Ready(version) = frame {
                    return Ok(version);
                }
            }
        }
    }

    async fn send(&mut self, script: &str) -> std::io::Result<()> {
        self.stdin.write_all(script.as_bytes()).await?;
        self.stdin.flush().await
    }

    /// Read one line, tolerating non-UTF-8 output from the locale.
    async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        let mut buf = Vec::new();
        let n = self.stdout.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        while matches!(buf.last(), Some(b'\n' | b'\r')) {
            buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
    }

    fn drain_stderr(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.stderr_rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    async fn execute(&mut self, program: &str, options: &CaptureOptions) -> Result<Capture, EngineError> {
        self.runs += 1;
        let run_dir = self.scratch.path().join(format!("run-{:04}", self.runs));
        tokio::fs::create_dir_all(&run_dir).await?;
        let source_file = run_dir.join("submission.R");
        tokio::fs::write(&source_file, program).await?;

        let script = self.protocol.run_script(&source_file, &run_dir, options);
        self.send(&script)
            .await
            .map_err(|e| EngineError::Terminated(e.to_string()))?;

        let mut events = Vec::new();
        let mut errors = Vec::new();
        'read: loop {
            let line = match self.read_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return Err(EngineError::Terminated("R exited while running".into())),
                Err(e) => return Err(EngineError::Terminated(e.to_string())),
            };
            for frame in self.protocol.parse_line(&line) {
                match frame {
                    Frame::Output(text) => events.push(OutputEvent::stdout(text)),
                    Frame::Message(text) => events.push(OutputEvent::new(OutputKind::Message, text)),
                    Frame::Warning(text) => events.push(OutputEvent::new(OutputKind::Warning, text)),
                    Frame::Error(text) => errors.push(text),
                    Frame::Ready(_) => {}
                    Frame::Done => break 'read,
                }
            }
        }
        events.extend(
            self.drain_stderr()
                .into_iter()
                .map(|line| OutputEvent::new(OutputKind::Stderr, line)),
        );

        let images = collect_plots(&run_dir).await;
        if let Err(e) = tokio::fs::remove_dir_all(&run_dir).await {
            warn!(dir = %run_dir.display(), error = %e, "could not remove run directory");
        }
        let images = images?;

        if !errors.is_empty() {
            return Err(EngineError::Execution(errors.join("\n")));
        }
        Ok(Capture { events, images })
    }
}

impl EngineHandle for RProcessHandle {
    async fn run(&mut self, program: &str, options: &CaptureOptions) -> Result<Capture, EngineError> {
        self.execute(program, options).await
    }

    async fn shutdown(mut self) {
        let _ = self.send("q(\"no\")\n").await;
        drop(self.stdin);
        match tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "R runtime exited"),
            _ => {
                warn!("R runtime did not exit in time; killing it");
                let _ = self.child.kill().await;
            }
        }
    }
}

/// Non-empty plot files of one run, in page order.
async fn collect_plots(run_dir: &Path) -> Result<Vec<ImageArtifact>, EngineError> {
    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(run_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_plot = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("plot-") && n.ends_with(".png"));
        if is_plot {
            paths.push(path);
        }
    }
    paths.sort();

    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(&path).await?;
        if !bytes.is_empty() {
            images.push(ImageArtifact { format: ArtifactFormat::Png, bytes });
        }
    }
    Ok(images)
}
