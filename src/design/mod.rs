//! Structural compatibility checking.
//!
//! Compares the public contract of a reference class against a submission
//! class, category by category. Comparison is pure and never fails; the
//! caller decides whether a mismatch is fatal.

pub mod analyze;
pub mod messages;

pub use analyze::compare;

use crate::model::{ClassKind, Signature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One comparison category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisType {
    /// Simple class name.
    Name,
    /// Class, interface, or enum.
    Kind,
    /// Class modifiers.
    Modifiers,
    /// Class type parameters, order-sensitive.
    TypeParams,
    /// Superclass.
    Superclass,
    /// Interface set.
    Interfaces,
    /// Public fields.
    Fields,
    /// Public methods and constructors.
    Methods,
    /// Public inner classes.
    InnerClasses,
}

impl AnalysisType {
    /// Every category, in reporting order.
    pub const ALL: [AnalysisType; 9] = [
        AnalysisType::Name,
        AnalysisType::Kind,
        AnalysisType::Modifiers,
        AnalysisType::TypeParams,
        AnalysisType::Superclass,
        AnalysisType::Interfaces,
        AnalysisType::Fields,
        AnalysisType::Methods,
        AnalysisType::InnerClasses,
    ];

    /// Human label.
    pub const fn label(self) -> &'static str {
        match self {
            AnalysisType::Name => "Name",
            AnalysisType::Kind => "Kind",
            AnalysisType::Modifiers => "Modifiers",
            AnalysisType::TypeParams => "Type parameters",
            AnalysisType::Superclass => "Superclass",
            AnalysisType::Interfaces => "Interfaces",
            AnalysisType::Fields => "Fields",
            AnalysisType::Methods => "Methods",
            AnalysisType::InnerClasses => "Inner classes",
        }
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which categories to check, and which reference members are not part of
/// the public contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdaOptions {
    /// Enabled categories.
    pub categories: BTreeSet<AnalysisType>,
    /// Reference fields excluded from comparison.
    pub excluded_fields: BTreeSet<String>,
    /// Reference methods and constructors excluded from comparison.
    pub excluded_members: BTreeSet<Signature>,
}

impl CdaOptions {
    /// Disable a category.
    #[must_use]
    pub fn without(mut self, category: AnalysisType) -> Self {
        self.categories.remove(&category);
        self
    }

    /// Exclude a reference field.
    #[must_use]
    pub fn exclude_field(mut self, name: impl Into<String>) -> Self {
        self.excluded_fields.insert(name.into());
        self
    }

    /// Exclude a reference method or constructor.
    #[must_use]
    pub fn exclude_member(mut self, signature: Signature) -> Self {
        self.excluded_members.insert(signature);
        self
    }
}

impl Default for CdaOptions {
    fn default() -> Self {
        Self {
            categories: AnalysisType::ALL.into_iter().collect(),
            excluded_fields: BTreeSet::new(),
            excluded_members: BTreeSet::new(),
        }
    }
}

/// Verdict for one category. Values are already rendered for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdaMatcher {
    /// Category.
    #[serde(rename = "type")]
    pub category: AnalysisType,
    /// Reference side.
    pub reference: Vec<String>,
    /// Submission side.
    pub submission: Vec<String>,
    /// Whether both sides agree.
    #[serde(rename = "match")]
    pub matched: bool,
}

impl CdaMatcher {
    pub(crate) fn new(category: AnalysisType, reference: Vec<String>, submission: Vec<String>) -> Self {
        let matched = reference == submission;
        Self {
            category,
            reference,
            submission,
            matched,
        }
    }
}

/// All findings of one comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CdaResult {
    /// Reference class name.
    pub reference: String,
    /// Submission class name.
    pub submission: String,
    /// Reference class kind; controls interface wording.
    pub reference_kind: ClassKind,
    /// Per-category verdicts, in reporting order.
    pub findings: Vec<CdaMatcher>,
}

impl CdaResult {
    /// Whether every enabled category matched.
    pub fn all_match(&self) -> bool {
        self.findings.iter().all(|f| f.matched)
    }

    /// Verdict for a category, if it was checked.
    pub fn finding(&self, category: AnalysisType) -> Option<&CdaMatcher> {
        self.findings.iter().find(|f| f.category == category)
    }

    /// Mismatched categories.
    pub fn mismatches(&self) -> impl Iterator<Item = &CdaMatcher> {
        self.findings.iter().filter(|f| !f.matched)
    }

    /// Messages for every mismatch, separated by blank lines.
    pub fn describe_mismatches(&self) -> String {
        self.mismatches()
            .map(|f| messages::message(f, self.reference_kind))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}
