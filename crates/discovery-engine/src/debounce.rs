//! Trailing-edge debounce for query input.
//!
//! Each `schedule` supersedes the previous one: its timer is aborted and its
//! callback dropped. A timer that still wakes up (abort raced the wakeup)
//! checks its generation against the armed one and does nothing if it lost.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

type Callback = Box<dyn FnOnce() + Send + 'static>;

struct Armed {
    generation: u64,
    callback: Callback,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct DebounceState {
    generation: u64,
    armed: Option<Armed>,
}

/// Cloning yields a handle to the same debouncer.
#[derive(Clone)]
pub struct QueryDebouncer {
    delay: Duration,
    state: Arc<Mutex<DebounceState>>,
}

impl QueryDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, state: Arc::new(Mutex::new(DebounceState::default())) }
    }

    /// Arms `callback` to run after the delay. Must be called from within a
    /// tokio runtime.
    pub fn schedule<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // The lock is held until the new entry is stored, so the timer cannot
        // observe the state before it is armed.
        let mut state = lock(&self.state);
        state.generation += 1;
        let generation = state.generation;
        if let Some(previous) = state.armed.take() {
            previous.timer.abort();
            trace!(superseded = previous.generation, generation, "debounce rescheduled");
        }

        let shared = Arc::clone(&self.state);
        let delay = self.delay;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let callback = {
                let mut state = lock(&shared);
                if state.armed.as_ref().is_some_and(|armed| armed.generation == generation) {
                    state.armed.take().map(|armed| armed.callback)
                } else {
                    None
                }
            };
            if let Some(callback) = callback {
                trace!(generation, "debounce fired");
                callback();
            }
        });
        state.armed = Some(Armed { generation, callback: Box::new(callback), timer });
    }

    /// Runs the pending callback now. Returns `false` if nothing was armed.
    pub fn flush(&self) -> bool {
        let Some(armed) = lock(&self.state).armed.take() else { return false };
        armed.timer.abort();
        trace!(generation = armed.generation, "debounce flushed");
        (armed.callback)();
        true
    }

    /// Drops the pending callback without running it.
    pub fn cancel(&self) -> bool {
        let Some(armed) = lock(&self.state).armed.take() else { return false };
        armed.timer.abort();
        trace!(generation = armed.generation, "debounce cancelled");
        true
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.state).armed.is_some()
    }
}

fn lock(state: &Mutex<DebounceState>) -> MutexGuard<'_, DebounceState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
