// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`request`] describes what to run.
//! - [`worker`] defines the [`ProcessWorker`] strategy and the real
//!   OS-process implementation with its deadlock-free output pump.
//! - [`sim`] runs an in-process async function as a fake tool.
//! - [`process`] is the single-use [`ManagedProcess`] wrapper around a
//!   worker: line capture, observers, termination, cancellation.
//! - [`begin_end`] adapts executions to the legacy begin/end pattern.
//! - [`executable`] adds tool lookup and per-tool concurrency caps.

pub mod begin_end;
pub mod executable;
pub mod process;
pub mod request;
pub mod sim;
pub mod worker;

pub use begin_end::{CompletionCallback, ExecutionHandle, OP_EXECUTE};
pub use executable::{Executable, ToolLocator};
pub use process::{ManagedProcess, ProcessObserver};
pub use request::{ExecutionRequest, ExecutionStatus};
pub use sim::{SimFn, SimProcess, SimWorker};
pub use worker::{OsProcessWorker, ProcessWorker, WorkerEvent};
