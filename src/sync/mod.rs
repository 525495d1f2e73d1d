// src/sync/mod.rs

//! Async coordination primitives.
//!
//! These back the execution layer but are usable on their own:
//!
//! - [`gate`] provides a re-armable manual-reset event.
//! - [`semaphore`] provides a FIFO counting semaphore with direct handoff.
//! - [`value`] provides single-flight computation of one shared value.
//! - [`cache`] provides a keyed map of single-flight values.

pub mod cache;
pub mod gate;
pub mod semaphore;
pub mod value;

pub use cache::SingleFlightCache;
pub use gate::AsyncGate;
pub use semaphore::{AsyncSemaphore, SemaphorePermit};
pub use value::{ComputationFailure, SingleFlightValue};
