// src/exec/sim.rs

//! Simulated process worker.
//!
//! Runs a user-supplied async function as a spawned task instead of a real
//! child process. The function receives a [`SimProcess`] handle to emit
//! output lines through and the cancellation token for the run; its return
//! value becomes the exit code. Cancellation aborts the function and
//! reports exit code -1, mirroring a killed process.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::Result;
use crate::exec::request::ExecutionRequest;
use crate::exec::worker::{ProcessWorker, WorkerEvent, EVENT_CHANNEL_CAPACITY};

/// The body of a simulated tool.
pub type SimFn = Arc<dyn Fn(SimProcess, CancellationToken) -> BoxFuture<'static, i32> + Send + Sync>;

/// Handle given to a simulation body: the request being "run" plus output
/// emitters that feed the ordinary worker event channel.
#[derive(Clone)]
pub struct SimProcess {
    request: ExecutionRequest,
    events: mpsc::Sender<WorkerEvent>,
}

impl SimProcess {
    pub fn request(&self) -> &ExecutionRequest {
        &self.request
    }

    pub fn command(&self) -> &str {
        self.request.command()
    }

    pub fn arguments(&self) -> &[String] {
        self.request.arguments()
    }

    pub fn working_dir(&self) -> Option<&std::path::Path> {
        self.request.working_dir()
    }

    pub async fn emit_stdout(&self, line: impl Into<String>) {
        let _ = self.events.send(WorkerEvent::StdoutLine(line.into())).await;
    }

    pub async fn emit_stderr(&self, line: impl Into<String>) {
        let _ = self.events.send(WorkerEvent::StderrLine(line.into())).await;
    }
}

/// Worker that runs a [`SimFn`] instead of spawning a process.
#[derive(Clone)]
pub struct SimWorker {
    body: SimFn,
}

impl SimWorker {
    pub fn new(body: SimFn) -> Self {
        Self { body }
    }

    /// Build a worker from an ordinary async closure.
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(SimProcess, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = i32> + Send + 'static,
    {
        Self::new(Arc::new(move |sim, token| Box::pin(f(sim, token))))
    }
}

impl ProcessWorker for SimWorker {
    fn start(
        &self,
        request: &ExecutionRequest,
        terminate: CancellationToken,
    ) -> Result<mpsc::Receiver<WorkerEvent>> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let sim = SimProcess {
            request: request.clone(),
            events: events_tx.clone(),
        };
        let command = request.command().to_string();
        debug!(command = %command, "simulated process started");

        let body = (self.body)(sim, terminate.clone());
        tokio::spawn(async move {
            let code = tokio::select! {
                code = body => code,
                _ = terminate.cancelled() => {
                    debug!(command = %command, "simulated process cancelled");
                    -1
                }
            };
            let _ = events_tx.send(WorkerEvent::Exited(code)).await;
        });

        Ok(events_rx)
    }
}
