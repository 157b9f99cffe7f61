//! Collaborators the engine runs against: execution boundaries, output
//! capture, and class representation providers.

pub mod capture;
pub mod provider;
pub mod sandbox;

pub use capture::{CaptureGuard, CapturedOutput, OutputCapturer, ThreadCapturer};
pub use provider::{BytecodeProvider, ChainProvider, ClassNotFound, SpaceProvider};
pub use sandbox::{InlineSandbox, Sandbox, Task, ThreadSandbox};
