// src/sync/value.rs

//! Single-flight computation of one shared value.
//!
//! Exactly one caller of [`SingleFlightValue::get_or_compute`] is elected
//! to run the computation; every other caller waits for and shares the
//! winner's result, including its failure.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::debug;

use crate::sync::AsyncGate;

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;

/// A computation failure shared by every caller of the value.
///
/// Cloneable so the one captured error can be re-delivered to each waiter.
#[derive(Debug, Clone, Error)]
#[error("single-flight computation failed: {0}")]
pub struct ComputationFailure(Arc<anyhow::Error>);

impl ComputationFailure {
    pub fn new(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }
}

pub struct SingleFlightValue<T: Clone> {
    state: AtomicU8,
    slot: Mutex<Option<Result<T, ComputationFailure>>>,
    done: AsyncGate,
}

impl<T: Clone> SingleFlightValue<T> {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(NOT_STARTED),
            slot: Mutex::new(None),
            done: AsyncGate::new(),
        }
    }

    /// A value that is already resolved.
    pub fn resolved(value: T) -> Self {
        let v = Self::new();
        v.state.store(DONE, Ordering::Release);
        *v.slot.lock().unwrap() = Some(Ok(value));
        v.done.set();
        v
    }

    pub fn is_done(&self) -> bool {
        self.state.load(Ordering::Acquire) == DONE
    }

    /// Compute the value if nobody has yet; otherwise wait for whoever is.
    ///
    /// The first caller to arrive runs `f`; concurrent and later callers
    /// never run their closure and instead receive a clone of the winner's
    /// result. A failed computation is delivered to every caller as the
    /// same shared [`ComputationFailure`].
    pub async fn get_or_compute<F, Fut>(&self, f: F) -> Result<T, ComputationFailure>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if self
            .state
            .compare_exchange(NOT_STARTED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            debug!("elected to run single-flight computation");
            // If this future is dropped mid-computation (timeouts, select
            // arms), the rollback re-opens the election; otherwise waiters
            // would park on a gate that never opens.
            let mut rollback = ElectionRollback {
                state: &self.state,
                armed: true,
            };
            let outcome = f().await.map_err(ComputationFailure::new);
            rollback.armed = false;
            self.store(outcome.clone());
            return outcome;
        }

        self.get().await
    }

    /// Wait for the value to resolve and return a clone of it.
    pub async fn get(&self) -> Result<T, ComputationFailure> {
        if self.state.load(Ordering::Acquire) != DONE {
            self.done.wait().await;
        }
        self.slot
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| unreachable!("gate opened without a stored result"))
    }

    /// Resolve the value directly, without a computation.
    ///
    /// If a computation is in flight the last write wins: whichever of the
    /// two stores happens second is what later `get` calls observe. Waiters
    /// released by the first store keep the result they saw.
    pub fn set(&self, value: T) {
        self.store(Ok(value));
    }

    /// Resolve the value with a failure.
    pub fn set_failure(&self, error: anyhow::Error) {
        self.store(Err(ComputationFailure::new(error)));
    }

    fn store(&self, outcome: Result<T, ComputationFailure>) {
        *self.slot.lock().unwrap() = Some(outcome);
        self.state.swap(DONE, Ordering::AcqRel);
        self.done.set();
    }
}

impl<T: Clone> Default for SingleFlightValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolls an abandoned computation back from `RUNNING` to `NOT_STARTED`.
///
/// The compare-exchange leaves a concurrent `set` alone: if the state
/// already moved to `DONE`, the rollback is a no-op.
struct ElectionRollback<'a> {
    state: &'a AtomicU8,
    armed: bool,
}

impl Drop for ElectionRollback<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.state.compare_exchange(
                RUNNING,
                NOT_STARTED,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }
}
