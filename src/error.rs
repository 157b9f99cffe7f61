//! Error handling for grading runs.
//!
//! Test-level mismatches and timeouts are results, not errors; they are
//! recorded on the [`crate::runner::RunResult`]. Everything here stops a
//! question from loading or a run from starting (or, for [`GradeError::Fatal`],
//! from continuing).

use crate::design::CdaResult;
use std::fmt;
use thiserror::Error;

/// A member the submission failed to provide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingMember {
    /// The submission space has no class with this name.
    Class(String),
    /// A required method is absent.
    Method {
        /// Submission class name.
        class: String,
        /// Rendered signature.
        signature: String,
    },
    /// A required constructor is absent.
    Constructor {
        /// Submission class name.
        class: String,
        /// Rendered signature.
        signature: String,
    },
    /// A required public field is absent.
    Field {
        /// Submission class name.
        class: String,
        /// Field name.
        name: String,
    },
}

impl fmt::Display for MissingMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class(name) => write!(f, "Submission class {} was not found", name),
            Self::Method { class, signature } => {
                write!(f, "Submission class {} didn't provide method {}", class, signature)
            }
            Self::Constructor { class, signature } => {
                write!(f, "Submission class {} didn't provide constructor {}", class, signature)
            }
            Self::Field { class, name } => {
                write!(f, "Submission class {} didn't provide field {}", class, name)
            }
        }
    }
}

/// Everything that can stop a question from loading or a run from proceeding.
#[derive(Debug, Error)]
pub enum GradeError {
    /// The reference declaration is malformed.
    #[error("configuration error in {question}: {message}")]
    Configuration {
        /// Reference class and solution being loaded.
        question: String,
        /// What is wrong.
        message: String,
    },

    /// The reference failed its own self-check, or a generator broke access rules.
    #[error("verification error in {question}: {message}")]
    Verification {
        /// Reference class and solution being loaded.
        question: String,
        /// What is wrong.
        message: String,
    },

    /// The submission is missing a required member.
    #[error("class design error: {0}")]
    ClassDesign(MissingMember),

    /// The structural checker found mismatches.
    #[error("submission class {class} does not match the reference design:\n{}", .report.describe_mismatches())]
    StructuralMismatch {
        /// Submission class name.
        class: String,
        /// Full checker findings.
        report: Box<CdaResult>,
    },

    /// A broken invariant between components.
    #[error("internal error: {0}")]
    Fatal(String),
}

impl GradeError {
    /// Configuration error for `question`.
    pub fn configuration(question: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            question: question.into(),
            message: message.into(),
        }
    }

    /// Verification error for `question`.
    pub fn verification(question: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Verification {
            question: question.into(),
            message: message.into(),
        }
    }

    /// Numeric code, stable across releases.
    pub fn code(&self) -> u32 {
        match self {
            GradeError::Configuration { .. } => 1,
            GradeError::Verification { .. } => 2,
            GradeError::ClassDesign(_) => 3,
            GradeError::StructuralMismatch { .. } => 4,
            GradeError::Fatal(_) => 5,
        }
    }

    /// Variant name.
    pub fn name(&self) -> &'static str {
        match self {
            GradeError::Configuration { .. } => "Configuration",
            GradeError::Verification { .. } => "Verification",
            GradeError::ClassDesign(_) => "ClassDesign",
            GradeError::StructuralMismatch { .. } => "StructuralMismatch",
            GradeError::Fatal(_) => "Fatal",
        }
    }

    /// Whether the fault lies with the reference author rather than the submission.
    pub fn is_reference_fault(&self) -> bool {
        matches!(
            self,
            GradeError::Configuration { .. } | GradeError::Verification { .. }
        )
    }
}

/// Result type for grading operations.
pub type GradeResult<T> = Result<T, GradeError>;
