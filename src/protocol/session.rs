//! # Worker Session
//!
//! Owns the one worker subprocess and both directions of its pipe.
//!
//! ```text
//!            send(Command) ──► unbounded chan ──► stdin writer task ──► child stdin
//! event loop ◄── std mpsc ◄── stdout reader task ◄── LineBuffer ◄── child stdout
//!                                  stderr drain task ──► log::debug
//!                                  supervisor task   ──► Exited / kill
//! ```
//!
//! Every event is stamped with the generation (restart counter) that produced
//! it, so the event loop can ignore a dead child's final words after a
//! restart. There is no automatic retry: a new child is only started by an
//! explicit [`WorkerSession::restart`].

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command as ProcessCommand;
use tokio::sync::{mpsc as async_mpsc, oneshot};

use super::codec;
use super::message::{Command, Inbound};

/// How long `shutdown` lets the worker act on `exit` before killing it.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// How to launch the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub program: String,
    pub args: Vec<String>,
    pub workspace_root: PathBuf,
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEventKind {
    Message(Inbound),
    /// Transport failure. Sent at most once per child.
    Fatal(String),
    Exited(Option<i32>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub generation: u64,
    pub kind: SessionEventKind,
}

#[derive(Debug)]
pub enum SessionError {
    /// The executable could not be started.
    Spawn(std::io::Error),
    /// A pipe to the child was unavailable.
    Io(std::io::Error),
    /// No child is running.
    NotRunning,
    Encode(serde_json::Error),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Spawn(e) => write!(f, "failed to start worker: {e}"),
            SessionError::Io(e) => write!(f, "worker I/O error: {e}"),
            SessionError::NotRunning => write!(f, "worker is not running"),
            SessionError::Encode(e) => write!(f, "failed to encode command: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Forwards events for one child, sending `Fatal` at most once.
#[derive(Clone)]
struct Reporter {
    generation: u64,
    tx: mpsc::Sender<SessionEvent>,
    fatal_sent: Arc<AtomicBool>,
}

impl Reporter {
    fn send(&self, kind: SessionEventKind) -> bool {
        self.tx
            .send(SessionEvent {
                generation: self.generation,
                kind,
            })
            .is_ok()
    }

    fn fatal(&self, reason: String) {
        if !self.fatal_sent.swap(true, Ordering::SeqCst) {
            warn!("Worker generation {} failed: {}", self.generation, reason);
            self.send(SessionEventKind::Fatal(reason));
        }
    }
}

struct RunningChild {
    stdin: async_mpsc::UnboundedSender<String>,
    /// Tells the supervisor to stop the child after the given grace period.
    stop: oneshot::Sender<Duration>,
}

pub struct WorkerSession {
    spec: WorkerSpec,
    tx: mpsc::Sender<SessionEvent>,
    generation: u64,
    child: Option<RunningChild>,
}

impl WorkerSession {
    pub fn new(spec: WorkerSpec, tx: mpsc::Sender<SessionEvent>) -> Self {
        Self {
            spec,
            tx,
            generation: 0,
            child: None,
        }
    }

    /// The restart counter. Bumped once per [`restart`](Self::restart).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Start the worker. With `skip_init` the child is told to skip its
    /// expensive start-up work via `SKIP_RAG=true`.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn spawn(&mut self, skip_init: bool) -> Result<(), SessionError> {
        let mut command = ProcessCommand::new(&self.spec.program);
        command
            .args(&self.spec.args)
            .env("WORKSPACE_DIR", &self.spec.workspace_root)
            .envs(self.spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if skip_init {
            command.env("SKIP_RAG", "true");
        }

        let mut child = command.spawn().map_err(SessionError::Spawn)?;
        let pipe_error = |name: &str| {
            SessionError::Io(std::io::Error::other(format!("worker {name} unavailable")))
        };
        let mut stdin = child.stdin.take().ok_or_else(|| pipe_error("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| pipe_error("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| pipe_error("stderr"))?;

        info!(
            "Spawned worker '{}' (generation {}, pid {:?}, skip_init={})",
            self.spec.program,
            self.generation,
            child.id(),
            skip_init
        );

        let reporter = Reporter {
            generation: self.generation,
            tx: self.tx.clone(),
            fatal_sent: Arc::new(AtomicBool::new(false)),
        };

        // stdout → decoded messages
        let out = reporter.clone();
        tokio::spawn(async move {
            let forward = |message: Inbound| {
                debug!("Worker message: {}", message.kind());
                out.send(SessionEventKind::Message(message))
            };
            if let Err(e) = codec::pump(stdout, forward).await {
                out.fatal(format!("failed to read worker output: {e}"));
            }
        });

        // stderr → log file
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("worker stderr: {line}");
            }
        });

        // queued commands → stdin
        let (stdin_tx, mut stdin_rx) = async_mpsc::unbounded_channel::<String>();
        let writer = reporter.clone();
        tokio::spawn(async move {
            while let Some(line) = stdin_rx.recv().await {
                let written = match stdin.write_all(line.as_bytes()).await {
                    Ok(()) => stdin.flush().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    writer.fatal(format!("failed to write to worker: {e}"));
                    break;
                }
            }
        });

        // exit status / stop requests
        let (stop_tx, stop_rx) = oneshot::channel::<Duration>();
        let supervisor = reporter;
        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => {
                        info!("Worker generation {} exited: {status}", supervisor.generation);
                        supervisor.send(SessionEventKind::Exited(status.code()));
                    }
                    Err(e) => supervisor.fatal(format!("failed to wait for worker: {e}")),
                },
                grace = stop_rx => {
                    let grace = grace.unwrap_or(Duration::ZERO);
                    if tokio::time::timeout(grace, child.wait()).await.is_err()
                        && let Err(e) = child.kill().await
                    {
                        warn!("Failed to kill worker generation {}: {e}", supervisor.generation);
                    }
                    debug!("Worker generation {} stopped", supervisor.generation);
                }
            }
        });

        self.child = Some(RunningChild {
            stdin: stdin_tx,
            stop: stop_tx,
        });
        Ok(())
    }

    /// Queue one command for the worker. Fire-and-forget.
    pub fn send(&self, command: &Command) -> Result<(), SessionError> {
        let child = self.child.as_ref().ok_or(SessionError::NotRunning)?;
        let mut line = serde_json::to_string(command).map_err(SessionError::Encode)?;
        line.push('\n');
        debug!("Sending to worker: {}", line.trim_end());
        child.stdin.send(line).map_err(|_| SessionError::NotRunning)
    }

    fn stop(&mut self, grace: Duration) {
        if let Some(child) = self.child.take() {
            // The supervisor may already be gone if the child exited on its own.
            let _ = child.stop.send(grace);
        }
    }

    /// Kill the current child and start a fresh one that skips
    /// reinitialization. Increments the restart counter exactly once.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        self.stop(Duration::ZERO);
        self.generation += 1;
        info!("Restarting worker (generation {})", self.generation);
        self.spawn(true)
    }

    /// Ask the worker to exit, then stop it.
    pub fn shutdown(&mut self) {
        if self.send(&Command::Exit).is_err() {
            debug!("Worker already gone at shutdown");
        }
        self.stop(SHUTDOWN_GRACE);
    }
}
