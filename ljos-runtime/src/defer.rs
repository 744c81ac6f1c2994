//! Deferred actions, run last-in first-out.
//!
//! Each action runs in isolation: an error or a panic in one is reported
//! and the rest still run.

use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

type Action<'a> = Box<dyn FnOnce() -> anyhow::Result<()> + 'a>;

/// One action that did not finish cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferFailure {
    /// Position in registration order, 0 being the first `defer`.
    pub index: usize,
    pub message: String,
    pub panicked: bool,
}

impl fmt::Display for DeferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.panicked { "panicked" } else { "failed" };
        write!(f, "deferred action #{} {kind}: {}", self.index, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeferReport {
    /// In the order the actions ran.
    pub failures: Vec<DeferFailure>,
    pub ran: usize,
}

impl DeferReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
pub struct DeferStack<'a> {
    actions: Vec<Action<'a>>,
}

impl fmt::Debug for DeferStack<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferStack")
            .field("pending", &self.actions.len())
            .finish()
    }
}

impl<'a> DeferStack<'a> {
    pub fn new() -> Self {
        DeferStack {
            actions: Vec::new(),
        }
    }

    pub fn push(&mut self, action: impl FnOnce() -> anyhow::Result<()> + 'a) {
        self.actions.push(Box::new(action));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every pending action, newest first. Failures are logged to
    /// stderr and collected in the report.
    pub fn drain(&mut self) -> DeferReport {
        let mut report = DeferReport::default();
        while let Some(action) = self.actions.pop() {
            let index = self.actions.len();
            report.ran += 1;
            let failure = match catch_unwind(AssertUnwindSafe(action)) {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => DeferFailure {
                    index,
                    message: format!("{error:#}"),
                    panicked: false,
                },
                Err(payload) => DeferFailure {
                    index,
                    message: panic_message(payload.as_ref()),
                    panicked: true,
                },
            };
            eprintln!("{failure}");
            report.failures.push(failure);
        }
        report
    }
}

impl Drop for DeferStack<'_> {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            self.drain();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::cell::RefCell;

    #[test]
    fn runs_last_in_first_out() {
        let log = RefCell::new(Vec::new());
        let mut stack = DeferStack::new();
        for i in 0..3 {
            let log = &log;
            stack.push(move || {
                log.borrow_mut().push(i);
                Ok(())
            });
        }
        let report = stack.drain();
        assert!(report.is_clean());
        assert_eq!(report.ran, 3);
        assert!(stack.is_empty());
        assert_eq!(*log.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn failures_are_isolated() {
        let log = RefCell::new(Vec::new());
        let mut stack = DeferStack::new();
        stack.push(|| {
            log.borrow_mut().push("first");
            Ok(())
        });
        stack.push(|| panic!("boom"));
        stack.push(|| bail!("cannot close file"));
        stack.push(|| {
            log.borrow_mut().push("last");
            Ok(())
        });

        let report = stack.drain();
        assert_eq!(*log.borrow(), vec!["last", "first"]);
        assert_eq!(report.ran, 4);
        assert_eq!(
            report.failures,
            vec![
                DeferFailure {
                    index: 2,
                    message: "cannot close file".into(),
                    panicked: false,
                },
                DeferFailure {
                    index: 1,
                    message: "boom".into(),
                    panicked: true,
                },
            ]
        );
    }

    #[test]
    fn pending_actions_run_on_drop() {
        let ran = RefCell::new(false);
        {
            let mut stack = DeferStack::new();
            stack.push(|| {
                *ran.borrow_mut() = true;
                Ok(())
            });
        }
        assert!(*ran.borrow());
    }
}
