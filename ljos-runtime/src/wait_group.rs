//! Counting barrier.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::WaitGroupError;
use crate::signal::Signal;

#[derive(Debug, Default)]
pub struct WaitGroup {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    count: i64,
    waiters: Vec<Arc<Signal<()>>>,
}

impl WaitGroup {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adjust the counter. Reaching zero releases every waiter; a change
    /// that would go below zero is rejected and leaves the counter as is.
    pub fn add(&self, delta: i64) -> Result<(), WaitGroupError> {
        let mut state = self.state();
        let next = state.count + delta;
        if next < 0 {
            return Err(WaitGroupError::NegativeCounter(next));
        }
        state.count = next;
        if next == 0 {
            for waiter in state.waiters.drain(..) {
                let _ = waiter.complete(());
            }
        }
        Ok(())
    }

    pub fn done(&self) -> Result<(), WaitGroupError> {
        self.add(-1)
    }

    pub fn count(&self) -> i64 {
        self.state().count
    }

    /// Block until the counter is zero. Returns at once if it already is.
    pub fn wait(&self) {
        let signal = {
            let mut state = self.state();
            if state.count == 0 {
                return;
            }
            let signal = Arc::new(Signal::new());
            state.waiters.push(Arc::clone(&signal));
            signal
        };
        signal.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn negative_counter_is_rejected() {
        let group = WaitGroup::new();
        assert_eq!(group.done(), Err(WaitGroupError::NegativeCounter(-1)));
        group.add(2).expect("add");
        assert_eq!(group.add(-3), Err(WaitGroupError::NegativeCounter(-1)));
        assert_eq!(group.count(), 2);
    }

    #[test]
    fn wait_returns_when_every_worker_is_done() {
        let group = Arc::new(WaitGroup::new());
        group.add(3).expect("add");
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let group = Arc::clone(&group);
                thread::spawn(move || group.done())
            })
            .collect();
        group.wait();
        assert_eq!(group.count(), 0);
        for handle in handles {
            handle.join().expect("worker").expect("done");
        }
        // already zero
        group.wait();
    }
}
