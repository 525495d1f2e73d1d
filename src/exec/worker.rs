// src/exec/worker.rs

//! Process workers: the strategy that actually produces output lines and
//! an exit code for an [`ExecutionRequest`].
//!
//! [`OsProcessWorker`] spawns a real child process; [`SimWorker`] in
//! [`sim`](crate::exec::sim) runs an in-process async function instead.
//! Both feed the same [`WorkerEvent`] channel, and both guarantee that the
//! single [`WorkerEvent::Exited`] event is the last one sent.

use std::process::Stdio;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::exec::request::ExecutionRequest;

/// How long the exit path waits for the output pump to drain after the
/// process has exited, before giving up on trailing lines.
const DRAIN_GRACE: Duration = Duration::from_secs(10);

pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Events produced by a worker, in order; `Exited` is always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    StdoutLine(String),
    StderrLine(String),
    Exited(i32),
}

/// Strategy for running a request.
///
/// `start` spawns whatever does the work and returns immediately; events
/// arrive on the returned channel. Cancelling `terminate` stops the work
/// (killing the child for a real process); the worker still emits a final
/// `Exited` event afterwards.
pub trait ProcessWorker: Send + Sync {
    fn start(
        &self,
        request: &ExecutionRequest,
        terminate: CancellationToken,
    ) -> Result<mpsc::Receiver<WorkerEvent>>;
}

/// Worker that spawns a real OS child process.
#[derive(Debug, Default)]
pub struct OsProcessWorker;

impl ProcessWorker for OsProcessWorker {
    fn start(
        &self,
        request: &ExecutionRequest,
        terminate: CancellationToken,
    ) -> Result<mpsc::Receiver<WorkerEvent>> {
        let mut cmd = Command::new(request.command());
        cmd.args(request.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = request.working_dir() {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning process '{}'", request.command()))?;

        let command = request.command().to_string();
        debug!(command = %command, "process spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        // Pump both streams concurrently in one task; signal completion so
        // the exit path can wait for trailing output.
        let (pump_done_tx, pump_done_rx) = oneshot::channel::<()>();
        {
            let events_tx = events_tx.clone();
            tokio::spawn(async move {
                pump_streams(stdout, stderr, events_tx).await;
                let _ = pump_done_tx.send(());
            });
        }

        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = terminate.cancelled() => {
                    // The process may have exited between the cancellation
                    // and the kill; that race is benign, so the error is
                    // only logged.
                    if let Err(err) = child.start_kill() {
                        debug!(command = %command, error = %err, "kill after exit ignored");
                    }
                    child.wait().await
                }
            };

            let code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(err) => {
                    warn!(command = %command, error = %err, "waiting for process failed");
                    -1
                }
            };

            // Exit is detected independently of output; give the pump a
            // bounded grace to deliver lines still in flight so `Exited`
            // stays the last event.
            if tokio::time::timeout(DRAIN_GRACE, pump_done_rx).await.is_err() {
                warn!(
                    command = %command,
                    "output pump did not drain within grace period; trailing lines may be lost"
                );
            }

            let _ = events_tx.send(WorkerEvent::Exited(code)).await;
        });

        Ok(events_rx)
    }
}

/// Read stdout and stderr concurrently, line by line, until both hit EOF.
///
/// A single task with `select!` over both streams avoids the classic
/// deadlock where the child blocks writing one full pipe while the parent
/// blocks reading the other.
async fn pump_streams<O, E>(
    stdout: Option<O>,
    stderr: Option<E>,
    events_tx: mpsc::Sender<WorkerEvent>,
) where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out = stdout.map(|s| BufReader::new(s).lines());
    let mut err = stderr.map(|s| BufReader::new(s).lines());

    while out.is_some() || err.is_some() {
        tokio::select! {
            line = next_line(&mut out), if out.is_some() => {
                match line {
                    Some(line) => {
                        if events_tx.send(WorkerEvent::StdoutLine(line)).await.is_err() {
                            return;
                        }
                    }
                    None => out = None,
                }
            }
            line = next_line(&mut err), if err.is_some() => {
                match line {
                    Some(line) => {
                        if events_tx.send(WorkerEvent::StderrLine(line)).await.is_err() {
                            return;
                        }
                    }
                    None => err = None,
                }
            }
        }
    }
}

// Disabled select! arms still evaluate their expression, so the None case
// must produce a future; it just never resolves.
async fn next_line<R: AsyncRead + Unpin>(lines: &mut Option<Lines<BufReader<R>>>) -> Option<String> {
    match lines {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => std::future::pending().await,
    }
}
