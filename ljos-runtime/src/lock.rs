//! A binary lock with FIFO hand-off.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::LockError;
use crate::signal::Signal;

/// Unlike `std::sync::Mutex`, the lock is not tied to a guard or a
/// thread: whoever holds it logically may release it. `unlock` passes
/// ownership straight to the oldest waiter, so the lock never appears free
/// while someone is queued.
#[derive(Debug, Default)]
pub struct Lock {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    locked: bool,
    waiters: VecDeque<Arc<Signal<()>>>,
}

impl Lock {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock(&self) {
        let signal = {
            let mut state = self.state();
            if !state.locked {
                state.locked = true;
                return;
            }
            let signal = Arc::new(Signal::new());
            state.waiters.push_back(Arc::clone(&signal));
            signal
        };
        signal.wait();
    }

    pub fn try_lock(&self) -> bool {
        let mut state = self.state();
        if state.locked {
            return false;
        }
        state.locked = true;
        true
    }

    pub fn unlock(&self) -> Result<(), LockError> {
        let mut state = self.state();
        if !state.locked {
            return Err(LockError::NotLocked);
        }
        match state.waiters.pop_front() {
            Some(next) => {
                let _ = next.complete(());
            }
            None => state.locked = false,
        }
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.state().locked
    }

    /// Number of parked waiters.
    pub fn waiting(&self) -> usize {
        self.state().waiters.len()
    }
}
