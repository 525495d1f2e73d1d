// src/sync/semaphore.rs

//! FIFO counting semaphore with direct handoff.
//!
//! [`release`](AsyncSemaphore::release) hands the permit straight to the
//! longest-waiting task instead of incrementing the counter and waking it,
//! so a late arrival can never overtake a queued waiter.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::oneshot;

struct SemState {
    available: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

pub struct AsyncSemaphore {
    state: Mutex<SemState>,
}

impl AsyncSemaphore {
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(SemState {
                available: permits,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Number of permits currently available.
    pub fn available(&self) -> usize {
        self.state.lock().unwrap().available
    }

    /// Wait for a permit. Callers are released in arrival order.
    pub async fn wait(&self) {
        let rx = {
            let mut state = self.state.lock().unwrap();
            if state.available > 0 {
                state.available -= 1;
                return;
            }
            let (tx, rx) = oneshot::channel();
            state.waiters.push_back(tx);
            rx
        };

        let mut grant = PendingGrant {
            semaphore: self,
            rx: Some(rx),
        };
        // The sender is only dropped if the semaphore itself is dropped
        // while we wait, which cannot happen while `&self` is borrowed.
        let _ = grant.rx.as_mut().unwrap().await;
        grant.rx = None;
    }

    /// Return a permit.
    ///
    /// If anyone is queued the permit is handed directly to the front
    /// waiter; the available count is only incremented when the queue is
    /// empty, so there is no window in which a newcomer could steal it.
    pub fn release(&self) {
        let mut state = self.state.lock().unwrap();
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.send(()).is_ok() {
                return;
            }
            // Receiver dropped (waiter cancelled); try the next one.
        }
        state.available += 1;
    }

    /// Acquire a permit held by an RAII guard; the permit is returned when
    /// the guard drops, on every exit path.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.wait().await;
        SemaphorePermit { semaphore: self }
    }
}

pub struct SemaphorePermit<'a> {
    semaphore: &'a AsyncSemaphore,
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

/// Returns a permit that was handed to a waiter whose future was dropped
/// before it could consume the grant.
///
/// Closing the channel first settles the race with a concurrent `release`:
/// a grant sent before the close is still readable here and gets returned;
/// a `release` arriving after the close fails to send and moves on to the
/// next waiter.
struct PendingGrant<'a> {
    semaphore: &'a AsyncSemaphore,
    rx: Option<oneshot::Receiver<()>>,
}

impl Drop for PendingGrant<'_> {
    fn drop(&mut self) {
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.semaphore.release();
            }
        }
    }
}
