//! diffgrade - differential testing of submissions against a reference.
//!
//! A reference class declares which of its operations form the graded
//! contract. A submission is checked for structural compatibility, then both
//! sides are driven with the same scheduled inputs and every pair of
//! outcomes is judged for equivalence.
//!
//! # Architecture
//!
//! - [`model`] - class spaces, runtime values, and the object capability trait
//! - [`env`] - sandboxes, output capture, and class shape providers
//! - [`design`] - structural compatibility checker
//! - [`generators`] - input generation strategies and case enumeration
//! - [`schedule`] - test scheduling state machine and run arguments
//! - [`mirror`] - substitutes that let objects cross between class spaces
//! - [`question`] - declaration tables, contract derivation, and binding
//! - [`runner`] - the differential test runner and its result schema
//! - [`catalog`] - named demo questions and submissions
//! - [`error`] - error taxonomy
//!
//! # Determinism
//!
//! Every random choice in a run is drawn from one `ChaCha8Rng` seeded by the
//! caller, so a seed reproduces a run step for step.

// Grading code runs untrusted submissions; library code must not panic.
// Tests are checked separately with `cargo test`.
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(missing_docs)]

pub mod catalog;
pub mod design;
pub mod env;
pub mod error;
pub mod generators;
pub mod mirror;
pub mod model;
pub mod question;
pub mod runner;
pub mod schedule;

// Re-export commonly used types
pub use catalog::{Catalog, CatalogEntry};
pub use design::{AnalysisType, CdaOptions, CdaResult};
pub use error::{GradeError, GradeResult, MissingMember};
pub use model::{ClassDef, ClassSpace, ConstructorDef, FieldDef, MethodDef, Signature, Thrown, TypeRef, Value};
pub use question::{Question, QuestionConfig, SolutionDecl};
pub use runner::{run, RunOptions, RunResult, TestStep};
pub use schedule::{RunnerArgs, Scheduler, TestKind};

#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
