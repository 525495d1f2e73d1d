// src/sync/gate.rs

//! Re-armable async gate (manual-reset event).
//!
//! A gate starts closed (or open, via [`AsyncGate::new_set`]), lets any
//! number of tasks [`wait`](AsyncGate::wait) for it, and releases all of
//! them at once when [`set`](AsyncGate::set) is called. Unlike a oneshot,
//! the gate can be re-armed with [`reset`](AsyncGate::reset): waits that
//! already observed the open state stay resolved, while waits that arrive
//! after the reset block until the next `set`.

use std::sync::Mutex;

use tokio::sync::watch;

pub struct AsyncGate {
    // One watch channel per signal cycle. `reset()` swaps in a fresh
    // channel, so receivers subscribed to a previous cycle still observe
    // `true` and resolve.
    cycle: Mutex<watch::Sender<bool>>,
}

impl AsyncGate {
    /// A closed gate.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { cycle: Mutex::new(tx) }
    }

    /// A gate that starts open.
    pub fn new_set() -> Self {
        let (tx, _rx) = watch::channel(true);
        Self { cycle: Mutex::new(tx) }
    }

    /// Open the gate, releasing all current and future waiters of this
    /// cycle. Idempotent.
    pub fn set(&self) {
        let tx = self.cycle.lock().unwrap();
        tx.send_replace(true);
    }

    /// Close the gate again if it is open.
    ///
    /// Waiters already released (or subscribed before the reset) keep their
    /// resolved state; new waiters block until the next [`set`](Self::set).
    pub fn reset(&self) {
        let mut tx = self.cycle.lock().unwrap();
        if *tx.borrow() {
            let (fresh, _rx) = watch::channel(false);
            *tx = fresh;
        }
    }

    pub fn is_set(&self) -> bool {
        *self.cycle.lock().unwrap().borrow()
    }

    /// Wait until the gate is open. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.cycle.lock().unwrap().subscribe();
        // A closed sender means the cycle was replaced after opening; the
        // final observed value in that case is `true`.
        let _ = rx.wait_for(|open| *open).await;
    }

    /// Blocking variant of [`wait`](Self::wait) for non-async callers.
    ///
    /// Must not be called from inside an async runtime thread.
    pub fn wait_blocking(&self) {
        futures::executor::block_on(self.wait());
    }
}

impl Default for AsyncGate {
    fn default() -> Self {
        Self::new()
    }
}
