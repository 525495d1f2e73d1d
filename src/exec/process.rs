// src/exec/process.rs

//! Single-use managed process execution.
//!
//! [`ManagedProcess`] wraps one invocation of a [`ProcessWorker`]: it
//! captures output lines in order, forwards them to an optional observer,
//! and resolves to an exit code. A process object executes at most once;
//! a second attempt fails with `AlreadyExecuted`. Termination requested
//! before execution is sticky: the process never spawns and completes
//! immediately with exit code -1.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Result, ToolError};
use crate::exec::request::{ExecutionRequest, ExecutionStatus};
use crate::exec::sim::SimWorker;
use crate::exec::worker::{OsProcessWorker, ProcessWorker, WorkerEvent};

/// Observer of process output and completion.
///
/// Callbacks run on the execution task, in event order. A callback that
/// panics disables the observer for the remainder of the execution; line
/// capture is unaffected.
pub trait ProcessObserver: Send + Sync {
    fn on_stdout_line(&self, _line: &str) {}
    fn on_stderr_line(&self, _line: &str) {}
    fn on_exited(&self, _exit_code: i32) {}
}

/// Why the process was (or will be) stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KillCommand {
    None,
    Terminated,
    Cancelled,
}

struct Inner {
    request: ExecutionRequest,
    worker: Arc<dyn ProcessWorker>,
    started: AtomicBool,
    status: Mutex<ExecutionStatus>,
    kill: Mutex<KillCommand>,
    terminate: CancellationToken,
    stdout: Mutex<Vec<String>>,
    stderr: Mutex<Vec<String>>,
    exit_code: Mutex<Option<i32>>,
    observer: Mutex<Option<Arc<dyn ProcessObserver>>>,
    observer_disabled: AtomicBool,
}

/// A single tool invocation. Cheap to clone; all clones share the one
/// underlying execution.
#[derive(Clone)]
pub struct ManagedProcess {
    inner: Arc<Inner>,
}

impl ManagedProcess {
    /// A process that will spawn a real OS child.
    pub fn new(request: ExecutionRequest) -> Result<Self> {
        Self::with_worker(request, Arc::new(OsProcessWorker))
    }

    /// A process driven by the given worker.
    pub fn with_worker(request: ExecutionRequest, worker: Arc<dyn ProcessWorker>) -> Result<Self> {
        if request.command().is_empty() {
            return Err(ToolError::InvalidRequest("command is empty".into()));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                request,
                worker,
                started: AtomicBool::new(false),
                status: Mutex::new(ExecutionStatus::Pending),
                kill: Mutex::new(KillCommand::None),
                terminate: CancellationToken::new(),
                stdout: Mutex::new(Vec::new()),
                stderr: Mutex::new(Vec::new()),
                exit_code: Mutex::new(None),
                observer: Mutex::new(None),
                observer_disabled: AtomicBool::new(false),
            }),
        })
    }

    /// A process driven by a simulation instead of a real child.
    pub fn simulated(request: ExecutionRequest, sim: SimWorker) -> Result<Self> {
        Self::with_worker(request, Arc::new(sim))
    }

    /// Run a request once with the default worker and return its exit code.
    pub async fn run(request: ExecutionRequest) -> Result<i32> {
        Self::new(request)?.execute().await
    }

    pub fn request(&self) -> &ExecutionRequest {
        &self.inner.request
    }

    pub fn status(&self) -> ExecutionStatus {
        *self.inner.status.lock().unwrap()
    }

    /// Captured stdout lines, in arrival order.
    pub fn stdout_lines(&self) -> Vec<String> {
        self.inner.stdout.lock().unwrap().clone()
    }

    /// Captured stderr lines, in arrival order.
    pub fn stderr_lines(&self) -> Vec<String> {
        self.inner.stderr.lock().unwrap().clone()
    }

    /// The exit code, or `NotYetComplete` before the process finished.
    pub fn exit_code(&self) -> Result<i32> {
        self.inner
            .exit_code
            .lock()
            .unwrap()
            .ok_or(ToolError::NotYetComplete)
    }

    /// Attach an observer. Replaces any previous one and re-enables
    /// observation if a previous observer had panicked.
    pub fn set_observer(&self, observer: Arc<dyn ProcessObserver>) {
        *self.inner.observer.lock().unwrap() = Some(observer);
        self.inner.observer_disabled.store(false, Ordering::Release);
    }

    /// Stop the process.
    ///
    /// Before execution this is sticky: a later `execute` never spawns and
    /// completes immediately with exit code -1. During execution the child
    /// is killed; killing a process that already exited is not an error.
    pub fn terminate(&self) {
        self.request_kill(KillCommand::Terminated);
    }

    /// Used by the legacy completion handles to tie a handle to the
    /// process that issued it.
    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    /// Execute to completion.
    pub async fn execute(&self) -> Result<i32> {
        self.run_internal(CancellationToken::new(), true).await
    }

    /// Execute, stopping early if `cancel` fires.
    ///
    /// With `fail_on_cancel` a cancelled run resolves to the `Cancelled`
    /// error; without it, cancellation is an ordinary completion with exit
    /// code -1.
    pub async fn execute_cancellable(
        &self,
        cancel: CancellationToken,
        fail_on_cancel: bool,
    ) -> Result<i32> {
        self.run_internal(cancel, fail_on_cancel).await
    }

    /// Execute from synchronous code.
    ///
    /// Builds a private current-thread runtime; must not be called from
    /// inside an async runtime thread.
    pub fn execute_blocking(&self) -> Result<i32> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(anyhow::Error::from)?;
        runtime.block_on(self.execute())
    }

    async fn run_internal(&self, cancel: CancellationToken, fail_on_cancel: bool) -> Result<i32> {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Err(ToolError::AlreadyExecuted);
        }

        if cancel.is_cancelled() {
            self.request_kill(KillCommand::Cancelled);
        }

        // A kill requested before execution is sticky: never spawn.
        if *self.inner.kill.lock().unwrap() != KillCommand::None {
            debug!(
                command = %self.inner.request.command(),
                "kill requested before start; not spawning"
            );
            return self.finish(-1, fail_on_cancel);
        }

        info!(command = %self.inner.request.display_command(), "executing");

        // Only report Running once the worker actually started; a spawn
        // failure leaves the process in Pending, never ran.
        let mut events = self
            .inner
            .worker
            .start(&self.inner.request, self.inner.terminate.clone())?;
        *self.inner.status.lock().unwrap() = ExecutionStatus::Running;

        let mut cancel_seen = false;
        let code = loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(WorkerEvent::StdoutLine(line)) => self.capture_stdout(line),
                    Some(WorkerEvent::StderrLine(line)) => self.capture_stderr(line),
                    Some(WorkerEvent::Exited(code)) => break code,
                    // Worker dropped the channel without an exit event.
                    None => break -1,
                },
                _ = cancel.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    self.request_kill(KillCommand::Cancelled);
                }
            }
        };

        self.finish(code, fail_on_cancel)
    }

    fn request_kill(&self, command: KillCommand) {
        {
            let mut kill = self.inner.kill.lock().unwrap();
            if *kill == KillCommand::None {
                *kill = command;
            }
        }
        self.inner.terminate.cancel();
    }

    fn finish(&self, code: i32, fail_on_cancel: bool) -> Result<i32> {
        let kill = *self.inner.kill.lock().unwrap();
        let status = match kill {
            KillCommand::None => ExecutionStatus::CompletedNormally,
            KillCommand::Terminated => ExecutionStatus::Terminated,
            KillCommand::Cancelled => ExecutionStatus::Cancelled,
        };
        *self.inner.status.lock().unwrap() = status;
        *self.inner.exit_code.lock().unwrap() = Some(code);

        info!(
            command = %self.inner.request.command(),
            exit_code = code,
            ?status,
            "execution finished"
        );

        self.notify(|obs| obs.on_exited(code));

        if kill == KillCommand::Cancelled && fail_on_cancel {
            return Err(ToolError::Cancelled);
        }
        Ok(code)
    }

    fn capture_stdout(&self, line: String) {
        self.notify(|obs| obs.on_stdout_line(&line));
        self.inner.stdout.lock().unwrap().push(line);
    }

    fn capture_stderr(&self, line: String) {
        self.notify(|obs| obs.on_stderr_line(&line));
        self.inner.stderr.lock().unwrap().push(line);
    }

    /// Dispatch to the observer without holding the observer lock, so a
    /// callback can re-enter the process handle.
    fn notify<F>(&self, f: F)
    where
        F: FnOnce(&dyn ProcessObserver),
    {
        if self.inner.observer_disabled.load(Ordering::Acquire) {
            return;
        }
        let observer = self.inner.observer.lock().unwrap().clone();
        let Some(observer) = observer else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))).is_err() {
            self.inner.observer_disabled.store(true, Ordering::Release);
            warn!(
                command = %self.inner.request.command(),
                "observer callback panicked; observer disabled for this execution"
            );
        }
    }
}
