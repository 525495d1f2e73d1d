// src/exec/executable.rs

//! Tool lookup and bounded execution.
//!
//! [`ToolLocator`] finds executables on `PATH` with memoized existence
//! probes; [`Executable`] binds a tool name to a locator and an optional
//! concurrency cap, resolving the binary once and sharing the result
//! across every run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{Result, ToolError};
use crate::exec::process::ManagedProcess;
use crate::exec::request::ExecutionRequest;
use crate::exec::worker::{OsProcessWorker, ProcessWorker};
use crate::sync::{AsyncSemaphore, SingleFlightCache, SingleFlightValue};

/// Locates tools on the search path.
///
/// Every filesystem probe is memoized, including negative results, so a
/// missing tool is only statted once. [`forget`](ToolLocator::forget)
/// invalidates a probe, for callers that install tools at runtime.
#[derive(Default)]
pub struct ToolLocator {
    probes: SingleFlightCache<PathBuf, bool>,
}

impl ToolLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find `tool` and return its full path, or `None` if absent.
    ///
    /// A tool given with a path component (absolute or relative) is probed
    /// directly; a bare name is searched across the `PATH` directories in
    /// order.
    pub async fn locate(&self, tool: &str) -> Option<PathBuf> {
        let as_path = Path::new(tool);
        if as_path.components().count() > 1 || as_path.is_absolute() {
            let candidate = as_path.to_path_buf();
            return self.probe(&candidate).await.then_some(candidate);
        }

        let path_var = std::env::var_os("PATH")?;
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(tool);
            if self.probe(&candidate).await {
                debug!(tool = %tool, path = %candidate.display(), "tool located");
                return Some(candidate);
            }
        }
        None
    }

    /// Memoized file-existence probe.
    async fn probe(&self, candidate: &Path) -> bool {
        let key = candidate.to_path_buf();
        let target = key.clone();
        self.probes
            .get_or_compute(&key, || async move {
                let exists = tokio::fs::metadata(&target)
                    .await
                    .map(|meta| meta.is_file())
                    .unwrap_or(false);
                Ok(exists)
            })
            .await
            .unwrap_or(false)
    }

    /// Forget the probe result for one path.
    pub fn forget(&self, candidate: &Path) -> bool {
        self.probes.remove(&candidate.to_path_buf())
    }

    /// Forget every probe result whose path matches the predicate.
    pub fn forget_where<P>(&self, pred: P) -> bool
    where
        P: FnMut(&PathBuf) -> bool,
    {
        self.probes.remove_where(pred)
    }
}

/// An external tool with resolved location and an optional cap on how many
/// invocations may run at once.
pub struct Executable {
    tool: String,
    locator: Arc<ToolLocator>,
    worker: Arc<dyn ProcessWorker>,
    semaphore: Option<AsyncSemaphore>,
    binary: SingleFlightValue<Option<PathBuf>>,
}

impl Executable {
    pub fn new(tool: impl Into<String>, locator: Arc<ToolLocator>) -> Self {
        Self {
            tool: tool.into(),
            locator,
            worker: Arc::new(OsProcessWorker),
            semaphore: None,
            binary: SingleFlightValue::new(),
        }
    }

    /// Cap concurrent runs of this tool. Zero means unbounded.
    pub fn with_max_parallel(mut self, max: usize) -> Self {
        self.semaphore = (max > 0).then(|| AsyncSemaphore::new(max));
        self
    }

    /// Replace the worker, e.g. with a simulation.
    pub fn with_worker(mut self, worker: Arc<dyn ProcessWorker>) -> Self {
        self.worker = worker;
        self
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Whether the tool exists. Resolution happens once; every later call
    /// shares the memoized answer.
    pub async fn find(&self) -> bool {
        self.resolve().await.is_some()
    }

    /// The resolved binary path, or `ToolNotAvailable`.
    pub async fn binary_path(&self) -> Result<PathBuf> {
        self.resolve()
            .await
            .ok_or_else(|| ToolError::ToolNotAvailable(self.tool.clone()))
    }

    async fn resolve(&self) -> Option<PathBuf> {
        self.binary
            .get_or_compute(|| async { Ok(self.locator.locate(&self.tool).await) })
            .await
            .unwrap_or(None)
    }

    /// Run the tool with the given arguments.
    pub async fn run<I, S>(&self, args: I) -> Result<ManagedProcess>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_with(args, None, None, true).await
    }

    /// Run the tool from a working directory.
    pub async fn run_from<I, S>(&self, working_dir: impl Into<PathBuf>, args: I) -> Result<ManagedProcess>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_with(args, Some(working_dir.into()), None, true).await
    }

    /// Run the tool with cancellation.
    pub async fn run_cancellable<I, S>(
        &self,
        args: I,
        cancel: CancellationToken,
        fail_on_cancel: bool,
    ) -> Result<ManagedProcess>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_with(args, None, Some(cancel), fail_on_cancel).await
    }

    async fn run_with<I, S>(
        &self,
        args: I,
        working_dir: Option<PathBuf>,
        cancel: Option<CancellationToken>,
        fail_on_cancel: bool,
    ) -> Result<ManagedProcess>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let binary = self.binary_path().await?;

        // The permit guard spans the whole execution, so the slot frees on
        // success, failure, and cancellation alike.
        let _permit = match &self.semaphore {
            Some(semaphore) => Some(semaphore.acquire().await),
            None => None,
        };

        let mut request = ExecutionRequest::new(binary.to_string_lossy().into_owned()).args(args);
        if let Some(dir) = working_dir {
            request = request.current_dir(dir);
        }

        let process = ManagedProcess::with_worker(request, Arc::clone(&self.worker))?;
        match cancel {
            Some(cancel) => {
                process.execute_cancellable(cancel, fail_on_cancel).await?;
            }
            None => {
                process.execute().await?;
            }
        }
        Ok(process)
    }
}
