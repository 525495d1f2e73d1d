// src/lib.rs

//! Run external tools from async code without the usual sharp edges.
//!
//! The execution layer ([`exec`]) spawns a tool, pumps stdout and stderr
//! concurrently so a chatty child can never deadlock against full pipes,
//! captures the output line by line, and resolves to an exit code. It
//! supports termination, cancellation tokens, observers, simulated tools
//! for tests, and per-tool concurrency caps.
//!
//! The coordination layer ([`sync`]) holds the primitives the execution
//! layer is built from: a re-armable gate, a FIFO semaphore, and
//! single-flight values and caches for deduplicating concurrent work.

pub mod cmdline;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod sync;

pub use errors::{Result, ToolError};
pub use exec::{
    Executable, ExecutionRequest, ExecutionStatus, ManagedProcess, ProcessObserver, SimProcess,
    SimWorker, ToolLocator,
};
pub use sync::{AsyncGate, AsyncSemaphore, SingleFlightCache, SingleFlightValue};
