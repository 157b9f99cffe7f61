//! Execution boundaries for untrusted code.

use crate::model::ClassSpace;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Work handed to a sandbox.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Capability to run a task under a wall-clock budget.
pub trait Sandbox: Send + Sync {
    /// Produce the restricted space submissions run in. Identity by default.
    fn transform(&self, space: Arc<ClassSpace>) -> Arc<ClassSpace> {
        space
    }

    /// Run `task`, waiting at most `timeout` (forever when `None`).
    /// Returns whether the task completed in time.
    fn run(&self, timeout: Option<Duration>, task: Task) -> bool;
}

/// Runs the task on the calling thread. Timeouts are not enforced.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineSandbox;

impl Sandbox for InlineSandbox {
    fn run(&self, _timeout: Option<Duration>, task: Task) -> bool {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
            warn!(
                message = %crate::model::space::panic_message(payload),
                "inline task panicked"
            );
        }
        true
    }
}

/// Runs the task on a dedicated worker thread and waits for it with a
/// timeout. A task that overruns is left to finish detached; callers stop
/// it cooperatively.
#[derive(Debug, Clone)]
pub struct ThreadSandbox {
    name: String,
}

impl ThreadSandbox {
    /// Worker threads get this name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ThreadSandbox {
    fn default() -> Self {
        Self::new("diffgrade-worker")
    }
}

impl Sandbox for ThreadSandbox {
    fn run(&self, timeout: Option<Duration>, task: Task) -> bool {
        let (tx, rx) = mpsc::channel::<()>();
        let spawned = thread::Builder::new().name(self.name.clone()).spawn(move || {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(task)) {
                warn!(
                    message = %crate::model::space::panic_message(payload),
                    "worker task panicked"
                );
            }
            let _ = tx.send(());
        });
        if let Err(err) = spawned {
            warn!(error = %err, "could not spawn worker thread");
            return false;
        }
        match timeout {
            Some(limit) => rx.recv_timeout(limit).is_ok(),
            None => rx.recv().is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_thread_sandbox_completes() {
        let flag = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&flag);
        let done = ThreadSandbox::default().run(
            Some(Duration::from_secs(5)),
            Box::new(move || seen.store(true, Ordering::SeqCst)),
        );
        assert!(done);
        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_thread_sandbox_times_out() {
        let done = ThreadSandbox::default().run(
            Some(Duration::from_millis(20)),
            Box::new(|| thread::sleep(Duration::from_millis(500))),
        );
        assert!(!done);
    }

    #[test]
    fn test_panicking_task_still_reports_completion() {
        assert!(InlineSandbox.run(None, Box::new(|| panic!("inline"))));
        assert!(ThreadSandbox::default().run(None, Box::new(|| panic!("worker"))));
    }
}
