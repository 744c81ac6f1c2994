//! One-shot suspend/resume point.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// A slot that is completed at most once and waited on by its creator.
///
/// `complete` hands the value back when the signal was already completed,
/// which is how a sender notices it lost a race to another channel.
#[derive(Debug)]
pub(crate) struct Signal<T> {
    state: Mutex<State<T>>,
    ready: Condvar,
}

#[derive(Debug)]
struct State<T> {
    completed: bool,
    value: Option<T>,
}

impl<T> Signal<T> {
    pub(crate) fn new() -> Self {
        Signal {
            state: Mutex::new(State {
                completed: false,
                value: None,
            }),
            ready: Condvar::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn complete(&self, value: T) -> Result<(), T> {
        let mut state = self.state();
        if state.completed {
            return Err(value);
        }
        state.completed = true;
        state.value = Some(value);
        self.ready.notify_all();
        Ok(())
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.state().completed
    }

    /// Block until completed and take the value. Only the creator waits,
    /// and only once.
    pub(crate) fn wait(&self) -> T {
        let mut state = self.state();
        loop {
            if let Some(value) = state.value.take() {
                return value;
            }
            state = self
                .ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn first_completion_wins() {
        let signal = Signal::new();
        assert_eq!(signal.complete(1), Ok(()));
        assert_eq!(signal.complete(2), Err(2));
        assert!(signal.is_complete());
        assert_eq!(signal.wait(), 1);
    }

    #[test]
    fn wait_resumes_after_completion_from_another_thread() {
        let signal = Arc::new(Signal::new());
        let remote = Arc::clone(&signal);
        let handle = thread::spawn(move || remote.complete("done"));
        assert_eq!(signal.wait(), "done");
        assert_eq!(handle.join().expect("thread"), Ok(()));
    }
}
