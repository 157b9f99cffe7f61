//! Per-thread output capture.
//!
//! Code running inside a class space prints through [`write_out`] and
//! [`write_err`]. While a capture is active on the current thread the text
//! lands in its buffers; otherwise it goes to the process streams.

use std::cell::RefCell;
use std::io::Write;

#[derive(Default)]
struct Buffers {
    out: String,
    err: String,
}

thread_local! {
    static SINKS: RefCell<Vec<Buffers>> = const { RefCell::new(Vec::new()) };
}

/// Text printed while a capture was active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CapturedOutput {
    /// Captured standard output.
    pub fn standard_out(&self) -> &str {
        &self.stdout
    }

    /// Captured standard error.
    pub fn standard_err(&self) -> &str {
        &self.stderr
    }
}

/// Capability to run a callback while collecting what it prints.
pub trait OutputCapturer: Send + Sync {
    /// Run `task`, returning everything it printed.
    fn run_capturing_output(&self, task: &mut dyn FnMut()) -> CapturedOutput;
}

/// Captures the calling thread's print sink. Captures nest; the innermost
/// one receives the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadCapturer;

impl OutputCapturer for ThreadCapturer {
    fn run_capturing_output(&self, task: &mut dyn FnMut()) -> CapturedOutput {
        let guard = CaptureGuard::install();
        task();
        guard.finish()
    }
}

/// Restores the previous sink when dropped, including during unwinding.
#[must_use]
pub struct CaptureGuard {
    depth: usize,
    finished: bool,
}

impl CaptureGuard {
    /// Push a fresh sink for the current thread.
    pub fn install() -> Self {
        let depth = SINKS.with(|sinks| {
            let mut sinks = sinks.borrow_mut();
            sinks.push(Buffers::default());
            sinks.len()
        });
        Self {
            depth,
            finished: false,
        }
    }

    /// Pop the sink and return what it collected.
    pub fn finish(mut self) -> CapturedOutput {
        self.finished = true;
        pop_to(self.depth)
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        if !self.finished {
            pop_to(self.depth);
        }
    }
}

fn pop_to(depth: usize) -> CapturedOutput {
    SINKS.with(|sinks| {
        let mut sinks = sinks.borrow_mut();
        // Sinks above ours belong to guards that leaked; discard them.
        while sinks.len() > depth {
            sinks.pop();
        }
        if sinks.len() == depth {
            sinks
                .pop()
                .map(|b| CapturedOutput {
                    stdout: b.out,
                    stderr: b.err,
                })
                .unwrap_or_default()
        } else {
            CapturedOutput::default()
        }
    })
}

/// Print to the active standard output sink.
pub fn write_out(text: &str) {
    let captured = SINKS.with(|sinks| match sinks.borrow_mut().last_mut() {
        Some(buffers) => {
            buffers.out.push_str(text);
            true
        }
        None => false,
    });
    if !captured {
        let _ = std::io::stdout().write_all(text.as_bytes());
    }
}

/// Print to the active standard error sink.
pub fn write_err(text: &str) {
    let captured = SINKS.with(|sinks| match sinks.borrow_mut().last_mut() {
        Some(buffers) => {
            buffers.err.push_str(text);
            true
        }
        None => false,
    });
    if !captured {
        let _ = std::io::stderr().write_all(text.as_bytes());
    }
}

/// Whether a capture is active on this thread.
pub fn is_capturing() -> bool {
    SINKS.with(|sinks| !sinks.borrow().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_collects_both_streams() {
        let output = ThreadCapturer.run_capturing_output(&mut || {
            write_out("hello ");
            write_out("world");
            write_err("oops");
        });
        assert_eq!(output.standard_out(), "hello world");
        assert_eq!(output.standard_err(), "oops");
        assert!(!is_capturing());
    }

    #[test]
    fn test_nested_captures_are_isolated() {
        let mut inner = CapturedOutput::default();
        let outer = ThreadCapturer.run_capturing_output(&mut || {
            write_out("a");
            inner = ThreadCapturer.run_capturing_output(&mut || write_out("b"));
            write_out("c");
        });
        assert_eq!(outer.stdout, "ac");
        assert_eq!(inner.stdout, "b");
    }

    #[test]
    fn test_guard_restores_after_panic() {
        let result = std::panic::catch_unwind(|| {
            let _guard = CaptureGuard::install();
            write_out("lost");
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(!is_capturing());
    }
}
