// src/exec/begin_end.rs

//! Legacy begin/end execution adapter.
//!
//! For callers that still follow the begin/end pattern:
//! [`ManagedProcess::begin_execute`] starts the execution in the
//! background and returns an [`ExecutionHandle`]; `end_execute` blocks for
//! the outcome. The handle records which process issued it and for which
//! operation, and `end_execute` rejects handles from anybody else. The
//! handle is consumed by value, so ending the same execution twice does
//! not compile.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::sync::oneshot;
use tracing::warn;

use crate::errors::{Result, ToolError};
use crate::exec::process::ManagedProcess;

/// Operation tag for `begin_execute`/`end_execute`.
pub const OP_EXECUTE: &str = "execute";

/// Callback invoked when the background execution completes, before
/// `end_execute` is released.
pub type CompletionCallback = Box<dyn FnOnce(&Result<i32>) + Send>;

/// Pending outcome of a `begin_execute` call.
pub struct ExecutionHandle {
    owner: usize,
    operation: &'static str,
    state: Option<Box<dyn Any + Send>>,
    outcome: oneshot::Receiver<Result<i32>>,
}

impl ExecutionHandle {
    /// Caller-supplied state passed to `begin_execute`.
    pub fn state(&self) -> Option<&(dyn Any + Send)> {
        self.state.as_deref()
    }
}

impl ManagedProcess {
    /// Start executing in the background.
    ///
    /// `state` is carried on the returned handle for the caller's own use;
    /// `callback`, if given, runs when the execution completes. A panic in
    /// the callback is contained and logged.
    pub fn begin_execute(
        &self,
        state: Option<Box<dyn Any + Send>>,
        callback: Option<CompletionCallback>,
    ) -> ExecutionHandle {
        let (tx, rx) = oneshot::channel();
        let process = self.clone();
        tokio::spawn(async move {
            let outcome = process.execute().await;
            if let Some(callback) = callback {
                if catch_unwind(AssertUnwindSafe(|| callback(&outcome))).is_err() {
                    warn!(
                        command = %process.request().command(),
                        "completion callback panicked"
                    );
                }
            }
            let _ = tx.send(outcome);
        });

        ExecutionHandle {
            owner: self.identity(),
            operation: OP_EXECUTE,
            state,
            outcome: rx,
        }
    }

    /// Block for the outcome of a `begin_execute` call.
    ///
    /// The handle must come from this process and carry the expected
    /// operation tag. Must not be called from inside an async runtime
    /// thread.
    pub fn end_execute(&self, handle: ExecutionHandle, operation: &str) -> Result<i32> {
        if handle.owner != self.identity() {
            return Err(ToolError::MismatchedCompletionHandle(
                "handle was issued by a different process",
            ));
        }
        if handle.operation != operation {
            return Err(ToolError::MismatchedCompletionHandle(
                "handle was issued for a different operation",
            ));
        }

        futures::executor::block_on(handle.outcome)
            .map_err(|_| ToolError::Other(anyhow::anyhow!("execution task was dropped")))?
    }
}
